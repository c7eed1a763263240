// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Caller authentication and the three authorization scopes.
//!
//! Authentication turns an [`AuthArg`] into a [`Caller`]; the scope checks
//! ([`simple_authorize`], [`authorize_app`], [`authorize_super_user`]) are
//! pure functions of that caller.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use keel_protocol::manager_proto::AuthArg;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::error::{ManagerError, Result};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user: String,
    pub email: String,
    pub super_user: bool,
}

/// Verifies presented credentials.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, user: &str, secret: &str) -> Result<Caller>;
}

/// Authenticate the credentials embedded in a request.
pub async fn authenticate(
    authenticator: &dyn Authenticator,
    auth: Option<&AuthArg>,
) -> Result<Caller> {
    match auth {
        Some(auth) if !auth.user.is_empty() => {
            authenticator.authenticate(&auth.user, &auth.secret).await
        }
        _ => Err(ManagerError::NotAuthorized("missing credentials".to_string())),
    }
}

/// Passes for any authenticated caller.
pub fn simple_authorize(_caller: &Caller) -> Result<()> {
    Ok(())
}

/// Passes for super-users and for the owner of the app.
///
/// `owner_email` is `None` when the app has no recorded owner, in which case
/// only super-users pass.
pub fn authorize_app(caller: &Caller, owner_email: Option<&str>) -> Result<()> {
    if caller.super_user {
        return Ok(());
    }
    match owner_email {
        Some(owner) if !owner.is_empty() && owner == caller.email => Ok(()),
        _ => Err(ManagerError::NotAuthorized(format!(
            "{} does not own this app",
            caller.user
        ))),
    }
}

/// Passes only for super-users.
pub fn authorize_super_user(caller: &Caller) -> Result<()> {
    if caller.super_user {
        Ok(())
    } else {
        Err(ManagerError::NotAuthorized(format!(
            "{} is not a super user",
            caller.user
        )))
    }
}

/// Lowercase hex SHA-256 of `secret`.
pub fn hash_secret(secret: &str) -> String {
    Sha256::digest(secret.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// One entry of the credentials file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user: String,
    /// Hex SHA-256 of the secret
    pub secret_sha256: String,
    pub email: String,
    #[serde(default)]
    pub super_user: bool,
}

impl UserRecord {
    /// Build a record from a plaintext secret.
    pub fn with_secret(
        user: impl Into<String>,
        secret: &str,
        email: impl Into<String>,
        super_user: bool,
    ) -> Self {
        Self {
            user: user.into(),
            secret_sha256: hash_secret(secret),
            email: email.into(),
            super_user,
        }
    }
}

/// Errors loading a credentials file.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read credentials file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse credentials file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate user in credentials file: {0}")]
    DuplicateUser(String),
}

/// Authenticator over a fixed set of users.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, UserRecord>,
}

impl StaticAuthenticator {
    pub fn new(records: Vec<UserRecord>) -> std::result::Result<Self, CredentialsError> {
        let mut users = HashMap::with_capacity(records.len());
        for record in records {
            if users.contains_key(&record.user) {
                return Err(CredentialsError::DuplicateUser(record.user));
            }
            users.insert(record.user.clone(), record);
        }
        Ok(Self { users })
    }

    /// Load a JSON array of [`UserRecord`]s.
    pub fn from_file(path: &Path) -> std::result::Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path)?;
        Self::new(serde_json::from_str(&raw)?)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, user: &str, secret: &str) -> Result<Caller> {
        let presented = hash_secret(secret);
        match self.users.get(user) {
            Some(record)
                if bool::from(record.secret_sha256.as_bytes().ct_eq(presented.as_bytes())) =>
            {
                Ok(Caller {
                    user: record.user.clone(),
                    email: record.email.clone(),
                    super_user: record.super_user,
                })
            }
            _ => Err(ManagerError::NotAuthorized("invalid credentials".to_string())),
        }
    }
}
