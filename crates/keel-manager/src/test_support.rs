// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fixtures for unit tests.

use std::sync::Arc;
use std::time::Duration;

use crate::admission::MockSupervisorClient;
use crate::auth::{StaticAuthenticator, UserRecord};
use crate::context::{ContextConfig, ControlPlaneContext};
use crate::store::MemoryStore;

/// Context in region `us-west` with an in-memory store, a mock supervisor
/// client and two users: `root` (super-user) and `ann`.
pub fn test_context() -> Arc<ControlPlaneContext> {
    let auth = StaticAuthenticator::new(vec![
        UserRecord::with_secret("root", "root-secret", "root@example.com", true),
        UserRecord::with_secret("ann", "ann-secret", "ann@example.com", false),
    ])
    .expect("static users are distinct");

    Arc::new(ControlPlaneContext::new(
        ContextConfig {
            region: "us-west".to_string(),
            host: "m1".to_string(),
            port: 7100,
            supervisor_port: 7101,
            domain: "keel.local".to_string(),
            result_duration: Duration::from_secs(60),
        },
        Arc::new(MemoryStore::new()),
        Arc::new(auth),
        Arc::new(MockSupervisorClient::new("us-west")),
    ))
}
