// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster membership registry.
//!
//! Typed access to routers, apps, supervisors and managers on top of a
//! [`RegistryStore`]. Nothing is cached: every call goes to the store, and
//! every mutation is exactly one store call. Apps and managers are changed
//! in place through [`Registry::update_app`] and [`Registry::update_manager`]
//! so concurrent changes to one entry never overwrite each other.
//!
//! Key layout:
//!
//! | Entity | Key |
//! |--------|-----|
//! | Manager | `/managers/{region}/{host}` |
//! | Supervisor | `/supervisors/{host}` |
//! | Router | `/routers/{internal\|external}/{zone}/{host}` |
//! | App | `/apps/{name}` |

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{ManagerError, Result};
use crate::store::{Mutation, RegistryStore, StoreError};

pub mod model;

pub use model::{
    AppEntry, DependerAppData, DependerEnvData, ManagerEntry, RoleGrants, RouterEntry,
    SupervisorEntry,
};

fn key_part<'a>(kind: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(ManagerError::validation(format!("{} must not be empty", kind)));
    }
    if value.contains('/') {
        return Err(ManagerError::validation(format!(
            "{} must not contain '/': {}",
            kind, value
        )));
    }
    Ok(value)
}

fn router_scope(internal: bool) -> &'static str {
    if internal { "internal" } else { "external" }
}

fn router_key(internal: bool, zone: &str, host: &str) -> Result<String> {
    Ok(format!(
        "/routers/{}/{}/{}",
        router_scope(internal),
        key_part("zone", zone)?,
        key_part("host", host)?
    ))
}

fn app_key(name: &str) -> Result<String> {
    Ok(format!("/apps/{}", key_part("app name", name)?))
}

fn supervisor_key(host: &str) -> Result<String> {
    Ok(format!("/supervisors/{}", key_part("host", host)?))
}

fn manager_key(region: &str, host: &str) -> Result<String> {
    Ok(format!(
        "/managers/{}/{}",
        key_part("region", region)?,
        key_part("host", host)?
    ))
}

/// Typed registry over the store.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn RegistryStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn RegistryStore {
        self.store.as_ref()
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| corrupt(key, source)),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, entry: &T) -> Result<()> {
        let value = serde_json::to_value(entry).map_err(StoreError::from)?;
        self.store.put(key, value).await?;
        debug!(key = %key, backend = self.store.backend(), "registry entry written");
        Ok(())
    }

    /// Atomically replace the entry at `key` with `apply(current)`.
    async fn modify<T, F>(&self, key: &str, apply: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce(Option<T>) -> Result<T> + Send,
    {
        let mut rejection: Option<ManagerError> = None;
        let mut updated: Option<T> = None;
        let mutation: Mutation<'_> = Box::new(|current: Option<Value>| {
            let current = current
                .map(serde_json::from_value)
                .transpose()
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                })?;
            match apply(current) {
                Ok(entry) => {
                    let value = serde_json::to_value(&entry).map_err(StoreError::from)?;
                    updated = Some(entry);
                    Ok(value)
                }
                Err(e) => {
                    rejection = Some(e);
                    Err(StoreError::Aborted(key.to_string()))
                }
            }
        });
        let outcome = self.store.update(key, mutation).await;

        if let Some(e) = rejection {
            return Err(e);
        }
        outcome?;
        debug!(key = %key, backend = self.store.backend(), "registry entry updated");
        updated.ok_or_else(|| ManagerError::Internal(format!("update of {} produced no entry", key)))
    }

    async fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        self.store
            .list_prefix(prefix)
            .await?
            .into_iter()
            .map(|(key, value)| serde_json::from_value(value).map_err(|source| corrupt(&key, source)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Routers
    // ------------------------------------------------------------------

    pub async fn get_router(
        &self,
        internal: bool,
        zone: &str,
        host: &str,
    ) -> Result<Option<RouterEntry>> {
        self.read(&router_key(internal, zone, host)?).await
    }

    pub async fn put_router(&self, router: &RouterEntry) -> Result<()> {
        let key = router_key(router.internal, &router.zone, &router.host)?;
        self.write(&key, router).await
    }

    pub async fn delete_router(&self, internal: bool, zone: &str, host: &str) -> Result<bool> {
        Ok(self.store.delete(&router_key(internal, zone, host)?).await?)
    }

    /// Router hosts grouped by zone.
    pub async fn list_routers(&self, internal: bool) -> Result<BTreeMap<String, Vec<String>>> {
        let prefix = format!("/routers/{}/", router_scope(internal));
        let mut zones: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for router in self.scan::<RouterEntry>(&prefix).await? {
            zones.entry(router.zone).or_default().push(router.host);
        }
        Ok(zones)
    }

    // ------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------

    pub async fn get_app(&self, name: &str) -> Result<Option<AppEntry>> {
        self.read(&app_key(name)?).await
    }

    pub async fn put_app(&self, app: &AppEntry) -> Result<()> {
        self.write(&app_key(&app.name)?, app).await
    }

    /// Create or change an app from its current entry, if any.
    pub async fn update_app<F>(&self, name: &str, apply: F) -> Result<AppEntry>
    where
        F: FnOnce(Option<AppEntry>) -> Result<AppEntry> + Send,
    {
        self.modify(&app_key(name)?, apply).await
    }

    /// Change a registered app. Fails with not-found when it is absent.
    pub async fn modify_app<F>(&self, name: &str, apply: F) -> Result<AppEntry>
    where
        F: FnOnce(&mut AppEntry) -> Result<()> + Send,
    {
        self.update_app(name, |current| {
            let mut app = current.ok_or_else(|| app_missing(name))?;
            apply(&mut app)?;
            Ok(app)
        })
        .await
    }

    /// Remove an app. Removing an app that is not registered is an error.
    pub async fn delete_app(&self, name: &str) -> Result<()> {
        if self.store.delete(&app_key(name)?).await? {
            Ok(())
        } else {
            Err(app_missing(name))
        }
    }

    pub async fn list_apps(&self) -> Result<Vec<AppEntry>> {
        self.scan("/apps/").await
    }

    // ------------------------------------------------------------------
    // Supervisors
    // ------------------------------------------------------------------

    pub async fn get_supervisor(&self, host: &str) -> Result<Option<SupervisorEntry>> {
        self.read(&supervisor_key(host)?).await
    }

    /// Create or refresh a supervisor entry with the current time.
    pub async fn touch_supervisor(&self, host: &str) -> Result<SupervisorEntry> {
        let entry = SupervisorEntry {
            host: host.to_string(),
            last_touch: Utc::now(),
        };
        self.write(&supervisor_key(host)?, &entry).await?;
        Ok(entry)
    }

    /// Remove a supervisor. Returns whether it was registered.
    pub async fn delete_supervisor(&self, host: &str) -> Result<bool> {
        Ok(self.store.delete(&supervisor_key(host)?).await?)
    }

    pub async fn list_supervisors(&self) -> Result<Vec<String>> {
        Ok(self
            .scan::<SupervisorEntry>("/supervisors/")
            .await?
            .into_iter()
            .map(|s| s.host)
            .collect())
    }

    // ------------------------------------------------------------------
    // Managers
    // ------------------------------------------------------------------

    pub async fn get_manager(&self, region: &str, host: &str) -> Result<Option<ManagerEntry>> {
        self.read(&manager_key(region, host)?).await
    }

    pub async fn put_manager(&self, manager: &ManagerEntry) -> Result<()> {
        let key = manager_key(&manager.region, &manager.host)?;
        self.write(&key, manager).await
    }

    /// Create or change a manager from its current entry, if any.
    pub async fn update_manager<F>(&self, region: &str, host: &str, apply: F) -> Result<ManagerEntry>
    where
        F: FnOnce(Option<ManagerEntry>) -> Result<ManagerEntry> + Send,
    {
        self.modify(&manager_key(region, host)?, apply).await
    }

    pub async fn delete_manager(&self, region: &str, host: &str) -> Result<bool> {
        Ok(self.store.delete(&manager_key(region, host)?).await?)
    }

    /// Manager hosts grouped by region.
    pub async fn list_managers(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut regions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for manager in self.scan::<ManagerEntry>("/managers/").await? {
            regions.entry(manager.region).or_default().push(manager.host);
        }
        Ok(regions)
    }
}

/// The error for an operation on an app that is not registered.
pub fn app_missing(name: &str) -> ManagerError {
    ManagerError::NotFound(format!("App {} does not exist", name))
}

fn corrupt(key: &str, source: serde_json::Error) -> ManagerError {
    StoreError::Corrupt {
        key: key.to_string(),
        source,
    }
    .into()
}
