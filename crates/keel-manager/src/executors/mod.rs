// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! One [`Executor`](crate::task::Executor) per RPC method.
//!
//! | Module | Methods |
//! |--------|---------|
//! | [`router`] | RegisterRouter, UnregisterRouter, GetRouter, ListRouters |
//! | [`app`] | RegisterApp, UpdateApp, UnregisterApp, GetApp, ListRegisteredApps, ListAuthorizedRegisteredApps, depender data |
//! | [`supervisor`] | RegisterSupervisor, UnregisterSupervisor, ListSupervisors |
//! | [`manager`] | RegisterManager, UnregisterManager, ListManagers, GetManager, GetSelf, roles |

use std::collections::BTreeMap;

use keel_protocol::manager_proto::{AuthArg, HostList};

use crate::auth::{self, Caller};
use crate::context::ControlPlaneContext;
use crate::error::{ManagerError, Result};

pub mod app;
pub mod manager;
pub mod router;
pub mod supervisor;

pub use app::{
    AddDependerAppData, AddDependerEnvData, GetApp, ListAuthorizedRegisteredApps,
    ListRegisteredApps, RegisterApp, RemoveDependerAppData, RemoveDependerEnvData, UnregisterApp,
};
pub use manager::{
    AddRole, GetManager, GetSelf, HasRole, ListManagers, RegisterManager, RemoveRole,
    UnregisterManager,
};
pub use router::{GetRouter, ListRouters, RegisterRouter, UnregisterRouter};
pub use supervisor::{ListSupervisors, RegisterSupervisor, UnregisterSupervisor};

/// Fail validation with `message` when `value` is empty.
pub(crate) fn require(value: &str, message: &str) -> Result<()> {
    if value.is_empty() {
        Err(ManagerError::validation(message))
    } else {
        Ok(())
    }
}

/// `host`, or `ip` when no host name was given.
pub(crate) fn host_or_ip<'a>(host: &'a str, ip: &'a str) -> &'a str {
    if host.is_empty() { ip } else { host }
}

/// DNS label for a host name or address.
pub(crate) fn dns_label(host: &str) -> String {
    host.replace(['.', ':'], "-")
}

pub(crate) async fn authorize_super_user(
    ctx: &ControlPlaneContext,
    auth: Option<&AuthArg>,
) -> Result<Caller> {
    let caller = ctx.authenticate(auth).await?;
    auth::authorize_super_user(&caller)?;
    Ok(caller)
}

pub(crate) async fn simple_authorize(
    ctx: &ControlPlaneContext,
    auth: Option<&AuthArg>,
) -> Result<Caller> {
    let caller = ctx.authenticate(auth).await?;
    auth::simple_authorize(&caller)?;
    Ok(caller)
}

/// Authorize against the recorded owner of `app`. An unregistered app has
/// no owner; `fallback_owner` then stands in when given.
pub(crate) async fn authorize_app(
    ctx: &ControlPlaneContext,
    auth: Option<&AuthArg>,
    app: &str,
    fallback_owner: Option<&str>,
) -> Result<Caller> {
    let caller = ctx.authenticate(auth).await?;
    let existing = ctx.registry().get_app(app).await?;
    let owner = existing.as_ref().map(|a| a.email.as_str()).or(fallback_owner);
    auth::authorize_app(&caller, owner)?;
    Ok(caller)
}

pub(crate) fn host_lists(groups: BTreeMap<String, Vec<String>>) -> BTreeMap<String, HostList> {
    groups
        .into_iter()
        .map(|(group, hosts)| (group, HostList { hosts }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_label() {
        assert_eq!(dns_label("10.0.1.7"), "10-0-1-7");
        assert_eq!(dns_label("router-a"), "router-a");
    }

    #[test]
    fn test_host_or_ip() {
        assert_eq!(host_or_ip("", "10.0.0.1"), "10.0.0.1");
        assert_eq!(host_or_ip("r1", "10.0.0.1"), "r1");
    }
}
