use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::quiz::store::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Administrative,
    Employee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub email: String,
    /// Bearer token accepted for this account.
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role: Role,
}

/// On-disk shape of the directory file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryData {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
}

/// Accounts, profiles and roles of portal users.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn account_for_token(&self, token: &str) -> anyhow::Result<Option<Account>>;
    async fn role_of(&self, user_id: &str) -> anyhow::Result<Option<Role>>;
    /// user id -> email, for every account.
    async fn emails(&self) -> anyhow::Result<BTreeMap<String, String>>;
    async fn delete_profile(&self, user_id: &str) -> anyhow::Result<()>;
    async fn delete_role(&self, user_id: &str) -> anyhow::Result<()>;
    /// Returns whether an account was removed.
    async fn delete_account(&self, user_id: &str) -> anyhow::Result<bool>;
}

/// A JSON file, re-read on every call and replaced atomically on writes.
#[derive(Debug)]
pub struct LocalFsDirectory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalFsDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> anyhow::Result<DirectoryData> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DirectoryData::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read: {}", self.path.display()));
            }
        };
        serde_json::from_slice(&bytes).with_context(|| format!("parse: {}", self.path.display()))
    }

    async fn update<F>(&self, change: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut DirectoryData) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        change(&mut data);
        let bytes = serde_json::to_vec_pretty(&data).context("serialize directory")?;
        write_atomic(&self.path, &bytes).await
    }
}

#[async_trait]
impl Directory for LocalFsDirectory {
    async fn account_for_token(&self, token: &str) -> anyhow::Result<Option<Account>> {
        Ok(self
            .load()
            .await?
            .accounts
            .into_iter()
            .find(|account| account.token == token))
    }

    async fn role_of(&self, user_id: &str) -> anyhow::Result<Option<Role>> {
        Ok(self
            .load()
            .await?
            .roles
            .into_iter()
            .find(|assignment| assignment.user_id == user_id)
            .map(|assignment| assignment.role))
    }

    async fn emails(&self) -> anyhow::Result<BTreeMap<String, String>> {
        Ok(self
            .load()
            .await?
            .accounts
            .into_iter()
            .map(|account| (account.id, account.email))
            .collect())
    }

    async fn delete_profile(&self, user_id: &str) -> anyhow::Result<()> {
        self.update(|data| data.profiles.retain(|p| p.user_id != user_id))
            .await
    }

    async fn delete_role(&self, user_id: &str) -> anyhow::Result<()> {
        self.update(|data| data.roles.retain(|r| r.user_id != user_id))
            .await
    }

    async fn delete_account(&self, user_id: &str) -> anyhow::Result<bool> {
        let mut removed = false;
        self.update(|data| {
            let before = data.accounts.len();
            data.accounts.retain(|a| a.id != user_id);
            removed = data.accounts.len() != before;
        })
        .await?;
        Ok(removed)
    }
}
