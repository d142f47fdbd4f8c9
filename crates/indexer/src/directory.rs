//! Account directory: address to display-name resolution.
//!
//! The directory is a collaborator of the pipeline, used only to populate
//! human-facing history records. Resolution failures or absent names must
//! never block a graph mutation; callers fall back to the raw address.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::Row;

use creditnet_core::types::Address;

use crate::storage::{AccountRecord, Storage};

/// Display-name lookup used when writing history records.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Resolve an address to its display name, if the account is known.
    async fn resolve_display_name(&self, address: &Address) -> Result<Option<String>>;
}

/// Directory backed by the indexer's `accounts` table.
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    storage: Storage,
}

impl SqliteDirectory {
    /// Wrap a storage handle.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Register (or rename) an account.
    pub async fn create_account(&self, address: &Address, username: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (address, username, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (address) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(address.as_str())
        .bind(username)
        .bind(chrono::Utc::now().timestamp())
        .execute(self.storage.pool())
        .await?;

        Ok(())
    }

    /// List all registered accounts.
    pub async fn list_accounts(&self) -> Result<Vec<AccountRecord>> {
        let rows = sqlx::query("SELECT address, username FROM accounts ORDER BY username")
            .fetch_all(self.storage.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| AccountRecord {
                address: Address::from(row.get::<String, _>("address")),
                username: row.get("username"),
            })
            .collect())
    }
}

#[async_trait]
impl AccountDirectory for SqliteDirectory {
    async fn resolve_display_name(&self, address: &Address) -> Result<Option<String>> {
        let username: Option<String> =
            sqlx::query_scalar("SELECT username FROM accounts WHERE address = ?")
                .bind(address.as_str())
                .fetch_optional(self.storage.pool())
                .await?;

        Ok(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::setup_storage;

    #[tokio::test]
    async fn resolves_registered_accounts() {
        let (storage, _temp_db) = setup_storage().await;
        let directory = SqliteDirectory::new(storage);

        let addr = Address::from("rAlice");
        directory.create_account(&addr, "alice").await.unwrap();

        assert_eq!(
            directory.resolve_display_name(&addr).await.unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(
            directory
                .resolve_display_name(&Address::from("rUnknown"))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn create_account_renames_on_conflict() {
        let (storage, _temp_db) = setup_storage().await;
        let directory = SqliteDirectory::new(storage);

        let addr = Address::from("rAlice");
        directory.create_account(&addr, "alice").await.unwrap();
        directory.create_account(&addr, "alice2").await.unwrap();

        assert_eq!(
            directory.resolve_display_name(&addr).await.unwrap(),
            Some("alice2".to_string())
        );
        assert_eq!(directory.list_accounts().await.unwrap().len(), 1);
    }
}
