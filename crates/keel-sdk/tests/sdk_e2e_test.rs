// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK tests against an in-process manager on a localhost QUIC port.

use std::sync::Arc;
use std::time::Duration;

use keel_manager::admission::MockSupervisorClient;
use keel_manager::auth::{StaticAuthenticator, UserRecord};
use keel_manager::runtime::ManagerRuntime;
use keel_manager::store::MemoryStore;
use keel_sdk::{
    EnvData, KeelSdk, RegisterAppOptions, RegisterManagerOptions, RegisterRouterOptions, RoleRef,
    SdkConfig, SdkError, TaskState,
};

const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    runtime: ManagerRuntime,
    supervisors: MockSupervisorClient,
}

impl Harness {
    async fn start() -> Self {
        let supervisors = MockSupervisorClient::new("us-west");
        let users = StaticAuthenticator::new(vec![
            UserRecord::with_secret("root", "root-secret", "root@example.com", true),
            UserRecord::with_secret("ann", "ann-secret", "ann@example.com", false),
        ])
        .unwrap();
        let runtime = ManagerRuntime::builder()
            .region("us-west")
            .host("m1")
            .store(Arc::new(MemoryStore::new()))
            .authenticator(Arc::new(users))
            .supervisors(Arc::new(supervisors.clone()))
            .bind_addr("127.0.0.1:0".parse().unwrap())
            .build()
            .unwrap()
            .start()
            .await
            .unwrap();
        Self {
            runtime,
            supervisors,
        }
    }

    fn sdk(&self, user: &str, secret: &str) -> KeelSdk {
        KeelSdk::new(
            SdkConfig::localhost(self.runtime.local_addr())
                .with_credentials(user, secret)
                .with_poll_interval(Duration::from_millis(10)),
        )
        .unwrap()
    }

    async fn stop(self) {
        self.runtime.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn test_health_and_idle() {
    let harness = Harness::start().await;
    let sdk = harness.sdk("ann", "ann-secret");

    let health = sdk.health_check().await.unwrap();
    assert_eq!(health.status, "OK");
    assert_eq!(health.region, "us-west");
    assert!(sdk.idle().await.unwrap());

    sdk.close().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_router_via_sdk() {
    let harness = Harness::start().await;
    let sdk = harness.sdk("root", "root-secret");

    let id = sdk
        .register_router(RegisterRouterOptions::new("z1", "10.0.0.5"))
        .await
        .unwrap();
    let info = sdk.wait_for_task(&id, WAIT).await.unwrap();
    assert_eq!(info.state, TaskState::Done);
    assert_eq!(info.name, "RegisterRouter");

    let router = sdk.register_router_result(&id).await.unwrap();
    assert_eq!(router.cname, "10-0-0-5.z1.routers.keel.local");

    let routers = sdk.list_routers(false).await.unwrap();
    assert_eq!(routers["z1"], vec!["10.0.0.5".to_string()]);

    let id = sdk.unregister_router("z1", "10.0.0.5", false).await.unwrap();
    sdk.wait_for_task(&id, WAIT).await.unwrap();
    sdk.unregister_router_result(&id).await.unwrap();
    assert!(sdk.list_routers(false).await.unwrap().is_empty());

    let err = sdk.get_router("z1", "10.0.0.5", false).await.unwrap_err();
    assert!(err.is_not_found());

    sdk.close().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_supervisor_region_mismatch_via_sdk() {
    let harness = Harness::start().await;
    harness.supervisors.set_region("s1", "us-east").await;
    let sdk = harness.sdk("root", "root-secret");

    let id = sdk.register_supervisor("s1").await.unwrap();
    let info = sdk.wait_for_task(&id, WAIT).await.unwrap();
    assert_eq!(info.state, TaskState::Error);
    assert!(info.error.is_some());

    match sdk.register_supervisor_result(&id).await {
        Err(SdkError::Server { code, status, .. }) => {
            assert_eq!(code, "REGION_MISMATCH");
            assert_eq!(status, "Region Mismatch");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(sdk.list_supervisors().await.unwrap().is_empty());

    sdk.close().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_apps_via_sdk() {
    let harness = Harness::start().await;
    let ann = harness.sdk("ann", "ann-secret");

    let app = ann
        .register_app(
            RegisterAppOptions::new("web", "git@example.com:acme/web.git", "/")
                .with_email("ann@example.com"),
        )
        .await
        .unwrap();
    assert_eq!(app.email, "ann@example.com");

    let app = ann
        .add_depender_env_data("web", EnvData::new("prod").with_ports("10.0.0.0/8", vec![443]))
        .await
        .unwrap();
    assert!(app.depender_env_data.contains_key("prod"));

    let app = ann
        .add_depender_app_data("web", "api", EnvData::new("prod").with_value("URL", "https://api"))
        .await
        .unwrap();
    assert!(app.depender_app_data["api"].envs.contains_key("prod"));

    assert_eq!(
        ann.list_authorized_registered_apps().await.unwrap(),
        vec!["web".to_string()]
    );

    let app = ann
        .update_app(RegisterAppOptions::new("web", "git@example.com:acme/web2.git", "/"))
        .await
        .unwrap();
    assert_eq!(app.email, "ann@example.com");
    assert!(app.depender_env_data.contains_key("prod"));

    ann.remove_depender_app_data("web", "api", "prod").await.unwrap();
    let app = ann.remove_depender_env_data("web", "prod").await.unwrap();
    assert!(app.depender_env_data.is_empty());
    assert!(app.depender_app_data.is_empty());

    ann.unregister_app("web").await.unwrap();
    assert!(ann.get_app("web").await.unwrap_err().is_not_found());

    ann.close().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_managers_and_roles_via_sdk() {
    let harness = Harness::start().await;
    let root = harness.sdk("root", "root-secret");
    let ann = harness.sdk("ann", "ann-secret");

    let id = root
        .register_manager(RegisterManagerOptions::new("us-west", "m1"))
        .await
        .unwrap();
    root.wait_for_task(&id, WAIT).await.unwrap();
    let manager = root.register_manager_result(&id).await.unwrap();
    assert_eq!(manager.registry_cname, "registry.us-west.keel.local");

    let me = ann.get_self().await.unwrap();
    assert_eq!(me.host, "m1");

    let role = RoleRef::new("us-west", "m1", "registry", "primary");
    let err = ann.add_role(role.clone()).await.unwrap_err();
    assert!(err.is_unauthorized());

    root.add_role(role.clone()).await.unwrap();
    assert!(ann.has_role(role.clone()).await.unwrap());
    root.remove_role(role.clone()).await.unwrap();
    assert!(!ann.has_role(role).await.unwrap());

    assert_eq!(
        ann.list_managers().await.unwrap()["us-west"],
        vec!["m1".to_string()]
    );

    let id = root.unregister_manager("us-west", "m1", None).await.unwrap();
    root.wait_for_task(&id, WAIT).await.unwrap();
    root.unregister_manager_result(&id).await.unwrap();
    assert!(root.list_managers().await.unwrap().is_empty());

    root.close().await;
    ann.close().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_wait_for_unknown_task() {
    let harness = Harness::start().await;
    let sdk = harness.sdk("root", "root-secret");

    let err = sdk.wait_for_task("no-such-task", WAIT).await.unwrap_err();
    assert!(err.is_task_not_found());

    sdk.close().await;
    harness.stop().await;
}
