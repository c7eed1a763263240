// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for keel-manager integration tests.
//!
//! [`TestContext`] dispatches straight into the gateway; [`TestServer`]
//! runs a full manager on a localhost QUIC port.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use keel_manager::admission::MockSupervisorClient;
use keel_manager::auth::{StaticAuthenticator, UserRecord};
use keel_manager::context::{ContextConfig, ControlPlaneContext};
use keel_manager::gateway;
use keel_manager::runtime::ManagerRuntime;
use async_trait::async_trait;
use keel_manager::store::{MemoryStore, Mutation, RegistryStore, StoreError};
use serde_json::Value;
use keel_protocol::KeelClient;
use keel_protocol::manager_proto::{
    AuthArg, RpcError, RpcRequest, RpcResponse, TaskIdRequest, rpc_request::Request,
    rpc_response::Response,
};

pub const REGION: &str = "us-west";

pub fn root() -> Option<AuthArg> {
    Some(AuthArg::new("root", "root-secret"))
}

pub fn ann() -> Option<AuthArg> {
    Some(AuthArg::new("ann", "ann-secret"))
}

pub fn bob() -> Option<AuthArg> {
    Some(AuthArg::new("bob", "bob-secret"))
}

pub fn users() -> StaticAuthenticator {
    StaticAuthenticator::new(vec![
        UserRecord::with_secret("root", "root-secret", "root@example.com", true),
        UserRecord::with_secret("ann", "ann-secret", "ann@example.com", false),
        UserRecord::with_secret("bob", "bob-secret", "bob@example.com", false),
    ])
    .expect("distinct users")
}

/// Memory store whose plain reads take `delay`, so concurrent executors
/// interleave between reading an entry and writing it back.
pub struct SlowReadStore {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl RegistryStore for SlowReadStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.inner.put(key, value).await
    }

    async fn update(&self, key: &str, apply: Mutation<'_>) -> Result<Value, StoreError> {
        self.inner.update(key, apply).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        self.inner.list_prefix(prefix).await
    }

    fn backend(&self) -> &'static str {
        "slow-memory"
    }
}

/// In-process manager state, driven through the gateway.
pub struct TestContext {
    pub ctx: Arc<ControlPlaneContext>,
    pub store: MemoryStore,
    pub supervisors: MockSupervisorClient,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_result_duration(Duration::from_secs(60))
    }

    pub fn with_result_duration(result_duration: Duration) -> Self {
        Self::build(MockSupervisorClient::new(REGION), result_duration)
    }

    pub fn with_supervisors(supervisors: MockSupervisorClient) -> Self {
        Self::build(supervisors, Duration::from_secs(60))
    }

    /// Every plain store read waits `delay` first.
    pub fn with_slow_reads(delay: Duration) -> Self {
        let store = MemoryStore::new();
        let slow = SlowReadStore {
            inner: store.clone(),
            delay,
        };
        Self::assemble(
            store,
            Arc::new(slow),
            MockSupervisorClient::new(REGION),
            Duration::from_secs(60),
        )
    }

    fn build(supervisors: MockSupervisorClient, result_duration: Duration) -> Self {
        let store = MemoryStore::new();
        Self::assemble(
            store.clone(),
            Arc::new(store),
            supervisors,
            result_duration,
        )
    }

    fn assemble(
        store: MemoryStore,
        backend: Arc<dyn RegistryStore>,
        supervisors: MockSupervisorClient,
        result_duration: Duration,
    ) -> Self {
        let ctx = Arc::new(ControlPlaneContext::new(
            ContextConfig {
                region: REGION.to_string(),
                host: "m1".to_string(),
                port: 7100,
                supervisor_port: 7101,
                domain: "keel.local".to_string(),
                result_duration,
            },
            backend,
            Arc::new(users()),
            Arc::new(supervisors.clone()),
        ));
        Self {
            ctx,
            store,
            supervisors,
        }
    }

    pub async fn call(&self, request: Request) -> Response {
        gateway::dispatch(
            &self.ctx,
            RpcRequest {
                request: Some(request),
            },
        )
        .await
        .response
        .expect("response present")
    }

    /// Submit an async method and return its task id.
    pub async fn submit(&self, request: Request) -> String {
        match self.call(request).await {
            Response::Async(reply) => reply.id,
            other => panic!("expected task id, got {:?}", other),
        }
    }

    /// Poll a `*Result` method until the task is no longer pending.
    pub async fn wait(&self, result: fn(TaskIdRequest) -> Request, id: &str) -> Response {
        for _ in 0..200 {
            let response = self
                .call(result(TaskIdRequest { id: id.to_string() }))
                .await;
            match &response {
                Response::Error(e) if e.code == "TASK_PENDING" => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                _ => return response,
            }
        }
        panic!("task {} never finished", id);
    }
}

pub fn expect_error(response: Response) -> RpcError {
    match response {
        Response::Error(e) => e,
        other => panic!("expected error, got {:?}", other),
    }
}

/// A manager serving on a localhost QUIC port.
pub struct TestServer {
    pub runtime: ManagerRuntime,
    pub client: KeelClient,
    pub supervisors: MockSupervisorClient,
}

impl TestServer {
    pub async fn start() -> Self {
        let supervisors = MockSupervisorClient::new(REGION);
        let runtime = ManagerRuntime::builder()
            .region(REGION)
            .host("m1")
            .store(Arc::new(MemoryStore::new()))
            .authenticator(Arc::new(users()))
            .supervisors(Arc::new(supervisors.clone()))
            .bind_addr("127.0.0.1:0".parse().expect("valid addr"))
            .build()
            .expect("runtime config")
            .start()
            .await
            .expect("runtime start");
        let client = KeelClient::localhost(runtime.local_addr()).expect("client");
        Self {
            runtime,
            client,
            supervisors,
        }
    }

    pub async fn call(&self, request: Request) -> Response {
        let response: RpcResponse = self
            .client
            .request(&RpcRequest {
                request: Some(request),
            })
            .await
            .expect("call succeeds");
        response.response.expect("response present")
    }

    pub async fn stop(self) {
        self.client.close().await;
        self.runtime.shutdown().await.expect("clean shutdown");
    }
}
