// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error type tests for keel-sdk.

use keel_protocol::ClientError;
use keel_protocol::manager_proto::RpcError;
use keel_sdk::SdkError;

#[test]
fn test_server_error_display() {
    let err = SdkError::Server {
        code: "NOT_FOUND".to_string(),
        message: "App web does not exist".to_string(),
        status: "ERROR".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "server error [NOT_FOUND]: App web does not exist"
    );
    assert!(err.is_not_found());
    assert!(!err.is_task_pending());
}

#[test]
fn test_from_rpc_error_keeps_status() {
    let err: SdkError = RpcError {
        code: "REGION_MISMATCH".to_string(),
        message: "supervisor s1 is in us-east".to_string(),
        status: "Region Mismatch".to_string(),
    }
    .into();
    match err {
        SdkError::Server { code, status, .. } => {
            assert_eq!(code, "REGION_MISMATCH");
            assert_eq!(status, "Region Mismatch");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_task_code_helpers() {
    let pending: SdkError = RpcError::new("TASK_PENDING", "t1").into();
    assert!(pending.is_task_pending());
    assert_eq!(pending.code(), Some("TASK_PENDING"));

    let missing: SdkError = RpcError::new("TASK_NOT_FOUND", "t1").into();
    assert!(missing.is_task_not_found());

    let unauthorized: SdkError = RpcError::new("NOT_AUTHORIZED", "nope").into();
    assert!(unauthorized.is_unauthorized());

    assert_eq!(SdkError::Timeout(10).code(), None);
}

#[test]
fn test_from_client_error() {
    assert!(matches!(
        SdkError::from(ClientError::Timeout(500)),
        SdkError::Timeout(500)
    ));
    assert!(matches!(
        SdkError::from(ClientError::NotConnected),
        SdkError::Connection(_)
    ));
    match SdkError::from(ClientError::Rejected {
        code: "INVALID_REQUEST".to_string(),
        message: "bad frame".to_string(),
    }) {
        SdkError::Server { code, .. } => assert_eq!(code, "INVALID_REQUEST"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_error_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SdkError>();
}
