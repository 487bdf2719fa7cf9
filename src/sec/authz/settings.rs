use std::sync::{Mutex, MutexGuard, PoisonError};

use acct_api::sec::settings::{AdminSettings, Matrix, PutSettings};
use acct_lib::sec::authz::permission::{self, key_valid};
use acct_lib::sec::authz::role::Role;
use http::Method;
use tokio_util::sync::CancellationToken;

use crate::error::{self, Detail, SecKind};
use crate::state::Shared;

use super::rbac::require_admin_permission;

#[derive(Debug)]
pub enum PutError {
    /// the caller read an older version. carries what is stored now
    Conflict {
        current: AdminSettings,
    },
    InvalidKey {
        key: String,
    },
}

/// the singleton settings document. writes are compare and swap on the
/// version
#[derive(Debug, Default)]
pub struct SettingsStore {
    doc: Mutex<AdminSettings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        SettingsStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, AdminSettings> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> AdminSettings {
        self.lock().clone()
    }

    /// replaces the whole matrix if `expected` is the stored version
    pub fn put(&self, expected: u64, matrix: Matrix) -> Result<AdminSettings, PutError> {
        let matrix = normalize_matrix(matrix)?;
        let mut doc = self.lock();

        if doc.version != expected {
            return Err(PutError::Conflict {
                current: doc.clone()
            });
        }

        doc.version += 1;
        doc.matrix = matrix;

        Ok(doc.clone())
    }

    /// the matrix entry for an operator, if there is one
    pub fn role_entry(&self, permission: &str, role: &Role) -> Option<bool> {
        self.lock()
            .matrix
            .get(permission)
            .and_then(|roles| roles.get(permission::role_key(role)))
            .copied()
    }
}

fn normalize_matrix(matrix: Matrix) -> Result<Matrix, PutError> {
    let mut rtn = Matrix::new();

    for (permission, roles) in matrix {
        let permission = permission.trim();

        if permission.is_empty() {
            continue;
        }

        if !key_valid(permission) {
            return Err(PutError::InvalidKey {
                key: permission.to_owned()
            });
        }

        let entry = rtn.entry(permission.to_owned()).or_default();

        for (role, allowed) in roles {
            let role = role.trim().to_lowercase();

            if role.is_empty() {
                continue;
            }

            if !key_valid(&role) {
                return Err(PutError::InvalidKey {
                    key: role
                });
            }

            entry.insert(role, allowed);
        }
    }

    Ok(rtn)
}

pub async fn get_settings(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
) -> error::ApiResult<AdminSettings> {
    require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::SETTINGS_READ),
        &Method::GET
    ).await?;

    Ok(state.sec().settings().get())
}

pub async fn put_settings(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
    request: PutSettings,
) -> error::ApiResult<AdminSettings> {
    let actor = require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::SETTINGS_WRITE),
        &Method::PUT
    ).await?;

    match state.sec().settings().put(request.version, request.matrix) {
        Ok(doc) => {
            tracing::info!(
                actor = %actor.id,
                version = doc.version,
                "admin settings updated"
            );

            Ok(doc)
        },
        Err(PutError::Conflict { current }) => Err(error::Error::api(SecKind::VersionConflict)
            .message("settings were changed since they were read")
            .detail(Detail::Settings(current))),
        Err(PutError::InvalidKey { key }) => Err(error::Error::api(SecKind::InvalidPermissionKey)
            .detail(Detail::with_key(key))),
    }
}
