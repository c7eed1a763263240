// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task execution and result tracking.
//!
//! Every operation runs as an [`Executor`]. The [`TaskTracker`] assigns it an
//! id, runs the authorize/execute protocol exactly once on a spawned tokio
//! task, stores the final response under the id and evicts it after the
//! configured retention.
//!
//! Reply status rules:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | `authorize` fails | `UNAUTHORIZED`, `execute` never runs |
//! | `execute` succeeds | `OK` unless the executor set one |
//! | `execute` fails | `ERROR` unless the executor set a non-`OK` one |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keel_protocol::manager_proto::{
    AppReply, HasRoleReply, ListAppsReply, ListManagersReply, ListRoutersReply,
    ListSupervisorsReply, ManagerReply, RouterReply, STATUS_ERROR, STATUS_OK,
    STATUS_UNAUTHORIZED, SupervisorReply, TaskState, TaskStatusReply, rpc_response::Response,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::ControlPlaneContext;
use crate::error::{ManagerError, Result};

/// A reply message that carries a status string.
pub trait Reply: Default + Clone + Send + Sync + 'static {
    fn status(&self) -> &str;

    fn set_status(&mut self, status: &str);

    /// Wrap into the response envelope variant for this reply.
    fn into_response(self) -> Response;
}

macro_rules! impl_reply {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Reply for $ty {
                fn status(&self) -> &str {
                    &self.status
                }

                fn set_status(&mut self, status: &str) {
                    self.status = status.to_string();
                }

                fn into_response(self) -> Response {
                    Response::$variant(self)
                }
            }
        )*
    };
}

impl_reply!(
    RouterReply => Router,
    ListRoutersReply => ListRouters,
    AppReply => App,
    ListAppsReply => ListApps,
    SupervisorReply => Supervisor,
    ListSupervisorsReply => ListSupervisors,
    ManagerReply => Manager,
    ListManagersReply => ListManagers,
    HasRoleReply => HasRole,
);

/// One operation, owning its request and producing one reply.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    type Reply: Reply;

    /// RPC method name; tasks are stored under it.
    fn name(&self) -> &'static str;

    fn description(&self) -> String;

    /// Synchronous request checks. A failure here never creates a task.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn authorize(&self, ctx: &ControlPlaneContext) -> Result<()>;

    async fn execute(&self, ctx: &ControlPlaneContext, reply: &mut Self::Reply) -> Result<()>;
}

/// Run the authorize/execute protocol once and turn the outcome into a response.
async fn execute_task<E: Executor>(
    ctx: &ControlPlaneContext,
    executor: &E,
) -> (Response, Option<String>) {
    let mut reply = E::Reply::default();

    let outcome = match executor.authorize(ctx).await {
        Err(e) => {
            reply.set_status(STATUS_UNAUTHORIZED);
            Err(e)
        }
        Ok(()) => match executor.execute(ctx, &mut reply).await {
            Ok(()) => {
                if reply.status().is_empty() {
                    reply.set_status(STATUS_OK);
                }
                Ok(())
            }
            Err(e) => {
                if reply.status().is_empty() || reply.status() == STATUS_OK {
                    reply.set_status(STATUS_ERROR);
                }
                Err(e)
            }
        },
    };

    match outcome {
        Ok(()) => (reply.into_response(), None),
        Err(e) => {
            let rpc = e.to_rpc_error(reply.status());
            (Response::Error(rpc), Some(e.to_string()))
        }
    }
}

/// What a poll found under a task id.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPoll {
    /// The task exists and has not finished.
    Pending { name: &'static str },
    /// The task finished; the response is the same on every poll.
    Done {
        name: &'static str,
        response: Response,
    },
    /// Never existed or already evicted.
    NotFound,
}

#[derive(Debug)]
struct TaskRecord {
    name: &'static str,
    description: String,
    state: TaskState,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    response: Option<Response>,
    error: Option<String>,
}

/// Owns every task record of this process.
#[derive(Clone)]
pub struct TaskTracker {
    tasks: Arc<Mutex<HashMap<String, TaskRecord>>>,
    result_duration: Duration,
}

impl TaskTracker {
    pub fn new(result_duration: Duration) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            result_duration,
        }
    }

    pub fn result_duration(&self) -> Duration {
        self.result_duration
    }

    /// Validate and start the executor, returning its task id immediately.
    pub async fn submit<E: Executor>(
        &self,
        ctx: Arc<ControlPlaneContext>,
        executor: E,
    ) -> Result<String> {
        executor.validate()?;
        let (id, _handle) = self.spawn(ctx, executor).await;
        Ok(id)
    }

    /// Validate and start the executor, then wait for its response.
    ///
    /// The task runs on its own tokio task, so it completes and is recorded
    /// even if the caller stops waiting.
    pub async fn run<E: Executor>(
        &self,
        ctx: Arc<ControlPlaneContext>,
        executor: E,
    ) -> Result<Response> {
        executor.validate()?;
        let (id, handle) = self.spawn(ctx, executor).await;
        handle
            .await
            .map_err(|e| ManagerError::Internal(format!("task {} aborted: {}", id, e)))
    }

    /// Run an executor without recording a task.
    pub async fn run_inline<E: Executor>(
        &self,
        ctx: &ControlPlaneContext,
        executor: E,
    ) -> Result<Response> {
        executor.validate()?;
        let (response, _) = execute_task(ctx, &executor).await;
        Ok(response)
    }

    async fn spawn<E: Executor>(
        &self,
        ctx: Arc<ControlPlaneContext>,
        executor: E,
    ) -> (String, tokio::task::JoinHandle<Response>) {
        let id = Uuid::new_v4().to_string();
        let name = executor.name();
        let description = executor.description();

        self.tasks.lock().await.insert(
            id.clone(),
            TaskRecord {
                name,
                description: description.clone(),
                state: TaskState::Pending,
                created_at: Utc::now(),
                finished_at: None,
                response: None,
                error: None,
            },
        );
        info!(task_id = %id, task = name, description = %description, "task submitted");

        let tracker = self.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            tracker.set_state(&task_id, TaskState::Running).await;
            let (response, error) = execute_task(&ctx, &executor).await;
            tracker.finish(&task_id, response.clone(), error).await;
            response
        });

        (id, handle)
    }

    async fn set_state(&self, id: &str, state: TaskState) {
        if let Some(record) = self.tasks.lock().await.get_mut(id) {
            record.state = state;
        }
    }

    async fn finish(&self, id: &str, response: Response, error: Option<String>) {
        {
            let mut tasks = self.tasks.lock().await;
            if let Some(record) = tasks.get_mut(id) {
                let elapsed = Utc::now() - record.created_at;
                match &error {
                    Some(message) => {
                        warn!(task_id = %id, task = record.name, error = %message, "task failed");
                        record.state = TaskState::Error;
                    }
                    None => {
                        info!(
                            task_id = %id,
                            task = record.name,
                            elapsed_ms = elapsed.num_milliseconds(),
                            "task finished"
                        );
                        record.state = TaskState::Done;
                    }
                }
                record.finished_at = Some(Utc::now());
                record.response = Some(response);
                record.error = error;
            }
        }

        let tasks = self.tasks.clone();
        let retention = self.result_duration;
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            if tasks.lock().await.remove(&id).is_some() {
                debug!(task_id = %id, "task result evicted");
            }
        });
    }

    pub async fn poll(&self, id: &str) -> TaskPoll {
        match self.tasks.lock().await.get(id) {
            None => TaskPoll::NotFound,
            Some(record) => match &record.response {
                Some(response) => TaskPoll::Done {
                    name: record.name,
                    response: response.clone(),
                },
                None => TaskPoll::Pending { name: record.name },
            },
        }
    }

    /// Snapshot of one task, or `None` if unknown.
    pub async fn status(&self, id: &str) -> Option<TaskStatusReply> {
        self.tasks.lock().await.get(id).map(|record| TaskStatusReply {
            id: id.to_string(),
            name: record.name.to_string(),
            description: record.description.clone(),
            state: record.state as i32,
            error: record.error.clone().unwrap_or_default(),
        })
    }

    /// When the task finished, if it has.
    pub async fn finished_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.tasks
            .lock()
            .await
            .get(id)
            .and_then(|record| record.finished_at)
    }

    /// Number of tasks not yet finished.
    pub async fn in_flight(&self) -> usize {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|r| matches!(r.state, TaskState::Pending | TaskState::Running))
            .count()
    }

    /// Number of records currently held, finished or not.
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }
}
