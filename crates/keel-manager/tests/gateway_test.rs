// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway tests: every method family driven through `gateway::dispatch`.

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use common::{TestContext, ann, bob, expect_error, root};
use keel_manager::admission::MockSupervisorClient;
use keel_manager::registry::Registry;
use keel_protocol::manager_proto::{
    AddDependerAppDataRequest, AddDependerEnvDataRequest, AuthArg, DependerEnvData, GetAppRequest,
    GetManagerRequest, GetRouterRequest, GetSelfRequest, IdleRequest, ListAppsRequest,
    ListManagersRequest, ListRoutersRequest, ListSupervisorsRequest, PortList,
    RegisterAppRequest, RegisterManagerRequest, RegisterRouterRequest,
    RegisterSupervisorRequest, RemoveDependerAppDataRequest, RemoveDependerEnvDataRequest,
    RoleRequest, STATUS_FULL, STATUS_OK, STATUS_REGION_MISMATCH, STATUS_UNAUTHORIZED, TaskState,
    TaskIdRequest, UnregisterAppRequest, UnregisterRouterRequest, rpc_request::Request,
    rpc_response::Response,
};

fn register_router(ip: &str, zone: &str) -> Request {
    Request::RegisterRouter(RegisterRouterRequest {
        auth: root(),
        zone: zone.to_string(),
        host: String::new(),
        ip: ip.to_string(),
        internal: false,
    })
}

fn register_app(auth: Option<AuthArg>, name: &str, email: &str) -> Request {
    Request::RegisterApp(RegisterAppRequest {
        auth,
        name: name.to_string(),
        repo: "git@example.com:acme/web.git".to_string(),
        root: "/".to_string(),
        email: email.to_string(),
        internal: false,
        non_atlantis: false,
    })
}

fn env_data(name: &str) -> DependerEnvData {
    let mut security_group = BTreeMap::new();
    security_group.insert("10.1.0.0/16".to_string(), PortList { ports: vec![5432] });
    let mut data_map = BTreeMap::new();
    data_map.insert("DB_HOST".to_string(), "db.internal".to_string());
    DependerEnvData {
        name: name.to_string(),
        security_group,
        encrypted_data: "c2VjcmV0".to_string(),
        data_map,
    }
}

fn register_supervisor(host: &str) -> Request {
    Request::RegisterSupervisor(RegisterSupervisorRequest {
        auth: root(),
        host: host.to_string(),
    })
}

fn register_manager(region: &str, ip: &str) -> Request {
    Request::RegisterManager(RegisterManagerRequest {
        auth: root(),
        region: region.to_string(),
        host: String::new(),
        ip: ip.to_string(),
        manager_cname: String::new(),
        registry_cname: String::new(),
    })
}

fn role(auth: Option<AuthArg>, host: &str) -> RoleRequest {
    RoleRequest {
        auth,
        region: "us-west".to_string(),
        host: host.to_string(),
        role: "registry".to_string(),
        type_name: "primary".to_string(),
    }
}

// ============================================================================
// Routers
// ============================================================================

#[tokio::test]
async fn test_router_lifecycle() {
    let t = TestContext::new();

    let id = t.submit(register_router("10.0.0.5", "z1")).await;
    let router = match t.wait(Request::RegisterRouterResult, &id).await {
        Response::Router(reply) => {
            assert_eq!(reply.status, STATUS_OK);
            reply.router.expect("router in reply")
        }
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(router.host, "10.0.0.5");
    assert_eq!(router.cname, "10-0-0-5.z1.routers.keel.local");

    match t
        .call(Request::ListRouters(ListRoutersRequest {
            auth: ann(),
            internal: false,
        }))
        .await
    {
        Response::ListRouters(reply) => {
            assert_eq!(reply.routers["z1"].hosts, vec!["10.0.0.5".to_string()]);
        }
        other => panic!("unexpected {:?}", other),
    }

    match t
        .call(Request::GetRouter(GetRouterRequest {
            auth: ann(),
            zone: "z1".to_string(),
            host: "10.0.0.5".to_string(),
            internal: false,
        }))
        .await
    {
        Response::Router(reply) => assert_eq!(reply.router.unwrap().ip, "10.0.0.5"),
        other => panic!("unexpected {:?}", other),
    }

    let id = t
        .submit(Request::UnregisterRouter(UnregisterRouterRequest {
            auth: root(),
            zone: "z1".to_string(),
            host: "10.0.0.5".to_string(),
            internal: false,
        }))
        .await;
    match t.wait(Request::UnregisterRouterResult, &id).await {
        Response::Router(reply) => assert_eq!(reply.status, STATUS_OK),
        other => panic!("unexpected {:?}", other),
    }

    match t
        .call(Request::ListRouters(ListRoutersRequest {
            auth: ann(),
            internal: false,
        }))
        .await
    {
        Response::ListRouters(reply) => assert!(reply.routers.is_empty()),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_internal_and_external_routers_are_separate() {
    let t = TestContext::new();

    let id = t
        .submit(Request::RegisterRouter(RegisterRouterRequest {
            auth: root(),
            zone: "z1".to_string(),
            host: "r1".to_string(),
            ip: "10.0.0.1".to_string(),
            internal: true,
        }))
        .await;
    match t.wait(Request::RegisterRouterResult, &id).await {
        Response::Router(reply) => {
            assert_eq!(reply.router.unwrap().cname, "r1.z1.internal-routers.keel.local")
        }
        other => panic!("unexpected {:?}", other),
    }

    let registry = Registry::new(std::sync::Arc::new(t.store.clone()));
    assert_eq!(registry.list_routers(true).await.unwrap().len(), 1);
    assert!(registry.list_routers(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_router_validation_creates_no_task() {
    let t = TestContext::new();

    let err = expect_error(t.call(register_router("", "z1")).await);
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert_eq!(err.message, "Please specify an IP to register");
    assert_eq!(t.ctx.tracker().len().await, 0);
}

#[tokio::test]
async fn test_non_super_user_cannot_register_router() {
    let t = TestContext::new();

    let id = t
        .submit(Request::RegisterRouter(RegisterRouterRequest {
            auth: ann(),
            zone: "z1".to_string(),
            host: String::new(),
            ip: "10.0.0.5".to_string(),
            internal: false,
        }))
        .await;
    let err = expect_error(t.wait(Request::RegisterRouterResult, &id).await);
    assert_eq!(err.code, "NOT_AUTHORIZED");
    assert_eq!(err.status, STATUS_UNAUTHORIZED);
    assert!(t.store.is_empty().await);
}

#[tokio::test]
async fn test_concurrent_router_registrations_converge() {
    let t = TestContext::new();

    let ids =
        futures::future::join_all((0..8).map(|_| t.submit(register_router("10.0.0.9", "z2"))))
            .await;
    for id in &ids {
        match t.wait(Request::RegisterRouterResult, id).await {
            Response::Router(reply) => assert_eq!(reply.status, STATUS_OK),
            other => panic!("unexpected {:?}", other),
        }
    }

    match t
        .call(Request::ListRouters(ListRoutersRequest {
            auth: root(),
            internal: false,
        }))
        .await
    {
        Response::ListRouters(reply) => {
            assert_eq!(reply.routers.len(), 1);
            assert_eq!(reply.routers["z2"].hosts.len(), 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

// ============================================================================
// Task results
// ============================================================================

#[tokio::test]
async fn test_result_is_idempotent() {
    let t = TestContext::new();

    let id = t.submit(register_router("10.0.0.5", "z1")).await;
    let first = t.wait(Request::RegisterRouterResult, &id).await;
    let second = t
        .call(Request::RegisterRouterResult(TaskIdRequest { id: id.clone() }))
        .await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_result_of_unknown_task() {
    let t = TestContext::new();

    let err = expect_error(
        t.call(Request::RegisterRouterResult(TaskIdRequest {
            id: "does-not-exist".to_string(),
        }))
        .await,
    );
    assert_eq!(err.code, "TASK_NOT_FOUND");
}

#[tokio::test]
async fn test_result_pending_while_probe_runs() {
    let mut slow = MockSupervisorClient::new(common::REGION);
    slow.probe_delay = Duration::from_millis(200);
    let t = TestContext::with_supervisors(slow);

    let id = t.submit(register_supervisor("s1")).await;
    let err = expect_error(
        t.call(Request::RegisterSupervisorResult(TaskIdRequest { id: id.clone() }))
            .await,
    );
    assert_eq!(err.code, "TASK_PENDING");

    match t.call(Request::Idle(IdleRequest {})).await {
        Response::Idle(reply) => assert!(!reply.idle),
        other => panic!("unexpected {:?}", other),
    }

    match t.wait(Request::RegisterSupervisorResult, &id).await {
        Response::Supervisor(reply) => assert_eq!(reply.status, STATUS_OK),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_result_with_wrong_method_is_rejected() {
    let t = TestContext::new();

    let id = t.submit(register_router("10.0.0.5", "z1")).await;
    t.wait(Request::RegisterRouterResult, &id).await;

    let err = expect_error(
        t.call(Request::RegisterManagerResult(TaskIdRequest { id }))
            .await,
    );
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_task_status_reports_finished_task() {
    let t = TestContext::new();

    let id = t.submit(register_router("10.0.0.5", "z1")).await;
    t.wait(Request::RegisterRouterResult, &id).await;

    match t.call(Request::TaskStatus(TaskIdRequest { id: id.clone() })).await {
        Response::TaskStatus(status) => {
            assert_eq!(status.id, id);
            assert_eq!(status.name, "RegisterRouter");
            assert_eq!(status.description, "10.0.0.5 in z1");
            assert_eq!(status.state, TaskState::Done as i32);
            assert!(status.error.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_results_expire_after_retention() {
    let t = TestContext::with_result_duration(Duration::from_millis(50));

    let id = t.submit(register_router("10.0.0.5", "z1")).await;
    t.wait(Request::RegisterRouterResult, &id).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = expect_error(t.call(Request::RegisterRouterResult(TaskIdRequest { id })).await);
    assert_eq!(err.code, "TASK_NOT_FOUND");
}

// ============================================================================
// Apps
// ============================================================================

#[tokio::test]
async fn test_app_owner_lifecycle() {
    let t = TestContext::new();

    match t.call(register_app(ann(), "web", "ann@example.com")).await {
        Response::App(reply) => {
            assert_eq!(reply.status, STATUS_OK);
            assert_eq!(reply.app.unwrap().email, "ann@example.com");
        }
        other => panic!("unexpected {:?}", other),
    }

    // Another user cannot take the app over.
    let err = expect_error(t.call(register_app(bob(), "web", "bob@example.com")).await);
    assert_eq!(err.code, "NOT_AUTHORIZED");
    assert_eq!(err.status, STATUS_UNAUTHORIZED);

    match t
        .call(Request::ListAuthorizedRegisteredApps(ListAppsRequest { auth: bob() }))
        .await
    {
        Response::ListApps(reply) => assert!(reply.apps.is_empty()),
        other => panic!("unexpected {:?}", other),
    }
    match t
        .call(Request::ListAuthorizedRegisteredApps(ListAppsRequest { auth: ann() }))
        .await
    {
        Response::ListApps(reply) => assert_eq!(reply.apps, vec!["web".to_string()]),
        other => panic!("unexpected {:?}", other),
    }
    match t
        .call(Request::ListRegisteredApps(ListAppsRequest { auth: bob() }))
        .await
    {
        Response::ListApps(reply) => assert_eq!(reply.apps, vec!["web".to_string()]),
        other => panic!("unexpected {:?}", other),
    }

    match t
        .call(Request::UnregisterApp(UnregisterAppRequest {
            auth: ann(),
            name: "web".to_string(),
        }))
        .await
    {
        Response::App(reply) => assert_eq!(reply.status, STATUS_OK),
        other => panic!("unexpected {:?}", other),
    }
    assert!(t.store.is_empty().await);
}

#[tokio::test]
async fn test_register_app_validation() {
    let t = TestContext::new();

    let err = expect_error(
        t.call(Request::RegisterApp(RegisterAppRequest {
            auth: root(),
            name: "web".to_string(),
            repo: String::new(),
            root: "/".to_string(),
            email: "ann@example.com".to_string(),
            internal: false,
            non_atlantis: false,
        }))
        .await,
    );
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert_eq!(err.message, "Please specify a repo");
    assert_eq!(t.ctx.tracker().len().await, 0);
    assert!(t.store.is_empty().await);
}

#[tokio::test]
async fn test_unregister_missing_app() {
    let t = TestContext::new();

    let err = expect_error(
        t.call(Request::UnregisterApp(UnregisterAppRequest {
            auth: root(),
            name: "ghost".to_string(),
        }))
        .await,
    );
    assert_eq!(err.code, "NOT_FOUND");
    assert!(err.message.contains("does not exist"), "{}", err.message);
    assert_eq!(err.status, "ERROR");
}

#[tokio::test]
async fn test_update_app_keeps_owner_and_dependers() {
    let t = TestContext::new();
    t.call(register_app(ann(), "web", "ann@example.com")).await;
    t.call(Request::AddDependerEnvData(AddDependerEnvDataRequest {
        auth: ann(),
        app: "web".to_string(),
        data: Some(env_data("prod")),
    }))
    .await;

    match t
        .call(Request::UpdateApp(RegisterAppRequest {
            auth: ann(),
            name: "web".to_string(),
            repo: "git@example.com:acme/web2.git".to_string(),
            root: "/svc".to_string(),
            email: String::new(),
            internal: true,
            non_atlantis: false,
        }))
        .await
    {
        Response::App(reply) => {
            let app = reply.app.unwrap();
            assert_eq!(app.repo, "git@example.com:acme/web2.git");
            assert_eq!(app.email, "ann@example.com");
            assert!(app.internal);
            assert!(app.depender_env_data.contains_key("prod"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_depender_data() {
    let t = TestContext::new();
    t.call(register_app(ann(), "db", "ann@example.com")).await;

    match t
        .call(Request::AddDependerEnvData(AddDependerEnvDataRequest {
            auth: ann(),
            app: "db".to_string(),
            data: Some(env_data("prod")),
        }))
        .await
    {
        Response::App(reply) => assert_eq!(reply.status, STATUS_OK),
        other => panic!("unexpected {:?}", other),
    }
    match t
        .call(Request::AddDependerAppData(AddDependerAppDataRequest {
            auth: ann(),
            app: "db".to_string(),
            depender: "web".to_string(),
            data: Some(env_data("prod")),
        }))
        .await
    {
        Response::App(reply) => assert_eq!(reply.status, STATUS_OK),
        other => panic!("unexpected {:?}", other),
    }

    match t
        .call(Request::GetApp(GetAppRequest {
            auth: ann(),
            name: "db".to_string(),
        }))
        .await
    {
        Response::App(reply) => {
            let app = reply.app.unwrap();
            let env = &app.depender_env_data["prod"];
            assert_eq!(env.security_group["10.1.0.0/16"].ports, vec![5432]);
            assert_eq!(env.data_map["DB_HOST"], "db.internal");
            assert!(app.depender_app_data["web"].envs.contains_key("prod"));
        }
        other => panic!("unexpected {:?}", other),
    }

    // Removing the only env of a depender drops the depender.
    t.call(Request::RemoveDependerAppData(RemoveDependerAppDataRequest {
        auth: ann(),
        app: "db".to_string(),
        depender: "web".to_string(),
        env: "prod".to_string(),
    }))
    .await;
    t.call(Request::RemoveDependerEnvData(RemoveDependerEnvDataRequest {
        auth: ann(),
        app: "db".to_string(),
        env: "prod".to_string(),
    }))
    .await;

    match t
        .call(Request::GetApp(GetAppRequest {
            auth: ann(),
            name: "db".to_string(),
        }))
        .await
    {
        Response::App(reply) => {
            let app = reply.app.unwrap();
            assert!(app.depender_env_data.is_empty());
            assert!(app.depender_app_data.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }

    let err = expect_error(
        t.call(Request::RemoveDependerEnvData(RemoveDependerEnvDataRequest {
            auth: ann(),
            app: "db".to_string(),
            env: "prod".to_string(),
        }))
        .await,
    );
    assert_eq!(err.code, "NOT_FOUND");
}

#[tokio::test]
async fn test_depender_data_requires_owner() {
    let t = TestContext::new();
    t.call(register_app(ann(), "db", "ann@example.com")).await;

    let err = expect_error(
        t.call(Request::AddDependerEnvData(AddDependerEnvDataRequest {
            auth: bob(),
            app: "db".to_string(),
            data: Some(env_data("prod")),
        }))
        .await,
    );
    assert_eq!(err.code, "NOT_AUTHORIZED");

    let err = expect_error(
        t.call(Request::GetApp(GetAppRequest {
            auth: bob(),
            name: "db".to_string(),
        }))
        .await,
    );
    assert_eq!(err.code, "NOT_AUTHORIZED");
}

// ============================================================================
// Concurrent updates
// ============================================================================

fn add_env(app: &str, env: &str) -> Request {
    Request::AddDependerEnvData(AddDependerEnvDataRequest {
        auth: ann(),
        app: app.to_string(),
        data: Some(env_data(env)),
    })
}

#[tokio::test]
async fn test_concurrent_depender_updates_all_land() {
    let t = TestContext::with_slow_reads(Duration::from_millis(20));
    t.call(register_app(ann(), "db", "ann@example.com")).await;

    let (prod, staging) = tokio::join!(t.call(add_env("db", "prod")), t.call(add_env("db", "staging")));
    for response in [prod, staging] {
        match response {
            Response::App(reply) => assert_eq!(reply.status, STATUS_OK),
            other => panic!("unexpected {:?}", other),
        }
    }

    match t
        .call(Request::GetApp(GetAppRequest {
            auth: ann(),
            name: "db".to_string(),
        }))
        .await
    {
        Response::App(reply) => {
            let envs: Vec<String> = reply.app.unwrap().depender_env_data.into_keys().collect();
            assert_eq!(envs, vec!["prod".to_string(), "staging".to_string()]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_role_grants_all_land() {
    let t = TestContext::with_slow_reads(Duration::from_millis(20));
    let id = t.submit(register_manager("us-west", "10.2.0.1")).await;
    t.wait(Request::RegisterManagerResult, &id).await;

    let types = ["primary", "mirror", "cache", "audit"];
    let grants = types.iter().map(|type_name| {
        let mut request = role(root(), "10.2.0.1");
        request.type_name = type_name.to_string();
        t.call(Request::AddRole(request))
    });
    for response in futures::future::join_all(grants).await {
        match response {
            Response::Manager(reply) => assert_eq!(reply.status, STATUS_OK),
            other => panic!("unexpected {:?}", other),
        }
    }

    for type_name in types {
        let mut request = role(ann(), "10.2.0.1");
        request.type_name = type_name.to_string();
        match t.call(Request::HasRole(request)).await {
            Response::HasRole(reply) => assert!(reply.has_role, "{} was lost", type_name),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_racing_registrations_keep_one_owner() {
    let t = TestContext::with_slow_reads(Duration::from_millis(20));

    let (by_ann, by_bob) = tokio::join!(
        t.call(register_app(ann(), "shared", "ann@example.com")),
        t.call(register_app(bob(), "shared", "bob@example.com")),
    );

    let mut owners = Vec::new();
    let mut rejected = 0;
    for response in [by_ann, by_bob] {
        match response {
            Response::App(reply) => {
                assert_eq!(reply.status, STATUS_OK);
                owners.push(reply.app.unwrap().email);
            }
            Response::Error(e) => {
                assert_eq!(e.code, "NOT_AUTHORIZED");
                rejected += 1;
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(owners.len(), 1);
    assert_eq!(rejected, 1);

    let stored = Registry::new(std::sync::Arc::new(t.store.clone()))
        .get_app("shared")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.email, owners[0]);
}

// ============================================================================
// Supervisors
// ============================================================================

#[tokio::test]
async fn test_supervisor_admission() {
    let t = TestContext::new();

    let id = t.submit(register_supervisor("s1")).await;
    match t.wait(Request::RegisterSupervisorResult, &id).await {
        Response::Supervisor(reply) => assert_eq!(reply.status, STATUS_OK),
        other => panic!("unexpected {:?}", other),
    }

    t.supervisors.set_status("s2", STATUS_FULL).await;
    let id = t.submit(register_supervisor("s2")).await;
    match t.wait(Request::RegisterSupervisorResult, &id).await {
        Response::Supervisor(reply) => assert_eq!(reply.status, STATUS_FULL),
        other => panic!("unexpected {:?}", other),
    }

    match t
        .call(Request::ListSupervisors(ListSupervisorsRequest { auth: ann() }))
        .await
    {
        Response::ListSupervisors(reply) => {
            assert_eq!(reply.supervisors, vec!["s1".to_string(), "s2".to_string()])
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_supervisor_region_mismatch() {
    let t = TestContext::new();
    t.supervisors.set_region("s1", "us-east").await;

    let id = t.submit(register_supervisor("s1")).await;
    let err = expect_error(t.wait(Request::RegisterSupervisorResult, &id).await);
    assert_eq!(err.code, "REGION_MISMATCH");
    assert_eq!(err.status, STATUS_REGION_MISMATCH);
    assert!(t.store.is_empty().await);
}

#[tokio::test]
async fn test_supervisor_bad_status_and_unreachable() {
    let t = TestContext::new();
    t.supervisors.set_status("s1", "DRAINING").await;
    t.supervisors.set_unreachable("s2").await;

    let id = t.submit(register_supervisor("s1")).await;
    let err = expect_error(t.wait(Request::RegisterSupervisorResult, &id).await);
    assert_eq!(err.code, "SUPERVISOR_STATUS");
    assert_eq!(err.status, "DRAINING");

    let id = t.submit(register_supervisor("s2")).await;
    let err = expect_error(t.wait(Request::RegisterSupervisorResult, &id).await);
    assert_eq!(err.code, "PROBE_ERROR");
    assert_eq!(err.status, "ERROR");

    assert!(t.store.is_empty().await);
}

#[tokio::test]
async fn test_unregister_supervisor() {
    let t = TestContext::new();

    // Unknown hosts unregister cleanly.
    let id = t
        .submit(Request::UnregisterSupervisor(RegisterSupervisorRequest {
            auth: root(),
            host: "ghost".to_string(),
        }))
        .await;
    match t.wait(Request::UnregisterSupervisorResult, &id).await {
        Response::Supervisor(reply) => assert_eq!(reply.status, STATUS_OK),
        other => panic!("unexpected {:?}", other),
    }

    let id = t.submit(register_supervisor("s1")).await;
    t.wait(Request::RegisterSupervisorResult, &id).await;

    let id = t
        .submit(Request::UnregisterSupervisor(RegisterSupervisorRequest {
            auth: root(),
            host: "s1".to_string(),
        }))
        .await;
    match t.wait(Request::UnregisterSupervisorResult, &id).await {
        Response::Supervisor(reply) => assert_eq!(reply.status, STATUS_OK),
        other => panic!("unexpected {:?}", other),
    }
    assert!(t.supervisors.teardowns().await.contains(&"s1".to_string()));
    assert!(t.store.is_empty().await);
}

// ============================================================================
// Managers and roles
// ============================================================================

#[tokio::test]
async fn test_manager_registration_and_roles() {
    let t = TestContext::new();

    let id = t.submit(register_manager("us-west", "10.2.0.1")).await;
    match t.wait(Request::RegisterManagerResult, &id).await {
        Response::Manager(reply) => {
            let manager = reply.manager.unwrap();
            assert_eq!(manager.manager_cname, "10-2-0-1.us-west.managers.keel.local");
            assert_eq!(manager.registry_cname, "registry.us-west.keel.local");
        }
        other => panic!("unexpected {:?}", other),
    }

    match t.call(Request::AddRole(role(root(), "10.2.0.1"))).await {
        Response::Manager(reply) => {
            assert!(reply.manager.unwrap().roles["registry"].types["primary"]);
        }
        other => panic!("unexpected {:?}", other),
    }

    match t.call(Request::HasRole(role(ann(), "10.2.0.1"))).await {
        Response::HasRole(reply) => assert!(reply.has_role),
        other => panic!("unexpected {:?}", other),
    }

    // Re-registering keeps granted roles.
    let id = t.submit(register_manager("us-west", "10.2.0.1")).await;
    t.wait(Request::RegisterManagerResult, &id).await;
    match t
        .call(Request::GetManager(GetManagerRequest {
            auth: ann(),
            region: "us-west".to_string(),
            host: "10.2.0.1".to_string(),
        }))
        .await
    {
        Response::Manager(reply) => assert!(reply.manager.unwrap().roles.contains_key("registry")),
        other => panic!("unexpected {:?}", other),
    }

    let err = expect_error(t.call(Request::AddRole(role(ann(), "10.2.0.1"))).await);
    assert_eq!(err.code, "NOT_AUTHORIZED");

    match t.call(Request::RemoveRole(role(root(), "10.2.0.1"))).await {
        Response::Manager(reply) => assert!(reply.manager.unwrap().roles.is_empty()),
        other => panic!("unexpected {:?}", other),
    }
    match t.call(Request::HasRole(role(ann(), "10.2.0.1"))).await {
        Response::HasRole(reply) => assert!(!reply.has_role),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_list_managers_and_get_self() {
    let t = TestContext::new();

    for (region, ip) in [("us-west", "m1"), ("us-west", "10.2.0.2"), ("eu-central", "10.3.0.1")] {
        let id = t.submit(register_manager(region, ip)).await;
        t.wait(Request::RegisterManagerResult, &id).await;
    }

    match t
        .call(Request::ListManagers(ListManagersRequest { auth: ann() }))
        .await
    {
        Response::ListManagers(reply) => {
            assert_eq!(reply.managers["us-west"].hosts.len(), 2);
            assert_eq!(reply.managers["eu-central"].hosts, vec!["10.3.0.1".to_string()]);
        }
        other => panic!("unexpected {:?}", other),
    }

    match t.call(Request::GetSelf(GetSelfRequest { auth: ann() })).await {
        Response::Manager(reply) => {
            let manager = reply.manager.unwrap();
            assert_eq!(manager.region, "us-west");
            assert_eq!(manager.host, "m1");
        }
        other => panic!("unexpected {:?}", other),
    }
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_bad_credentials_have_no_side_effect() {
    let t = TestContext::new();
    let wrong = Some(AuthArg::new("root", "wrong"));

    let id = t
        .submit(Request::RegisterRouter(RegisterRouterRequest {
            auth: wrong.clone(),
            zone: "z1".to_string(),
            host: String::new(),
            ip: "10.0.0.5".to_string(),
            internal: false,
        }))
        .await;
    let err = expect_error(t.wait(Request::RegisterRouterResult, &id).await);
    assert_eq!(err.status, STATUS_UNAUTHORIZED);

    let err = expect_error(t.call(register_app(wrong.clone(), "web", "root@example.com")).await);
    assert_eq!(err.code, "NOT_AUTHORIZED");

    let err = expect_error(
        t.call(Request::ListSupervisors(ListSupervisorsRequest { auth: None }))
            .await,
    );
    assert_eq!(err.code, "NOT_AUTHORIZED");

    assert!(t.store.is_empty().await);
    assert_eq!(t.supervisors.probe_count().await, 0);
}
