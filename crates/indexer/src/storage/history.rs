//! Per-account transaction history.
//!
//! Records are append-only: there is no update or delete operation, and a
//! redelivered ledger event is deduplicated on `(account, txn_hash,
//! direction)` instead of appending twice.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::Row;
use std::str::FromStr;

use creditnet_core::types::{Address, TransactionRecord};

use super::{HistoryDirection, HistoryEntry, Storage};

impl Storage {
    /// Append the outgoing and incoming records for one mutation.
    ///
    /// Both rows are written in one SQL transaction: either both parties see
    /// the mutation in their history, or neither does. Duplicate deliveries
    /// hit the unique `(account, txn_hash, direction)` index and are ignored.
    pub async fn append_both(
        &self,
        outgoing: &HistoryEntry,
        incoming: &HistoryEntry,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin history append transaction")?;

        for entry in [outgoing, incoming] {
            let record = &entry.record;
            let ledger_index = i64::try_from(record.ledger_index)
                .with_context(|| format!("Ledger index out of range: {}", record.ledger_index))?;
            sqlx::query(
                r#"
                INSERT INTO account_transactions (
                    account_address, direction,
                    counterparty_username, message, limit_change,
                    ledger_index, ledger_hash, txn_hash, txn_date,
                    appended_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (account_address, txn_hash, direction) DO NOTHING
                "#,
            )
            .bind(entry.account.as_str())
            .bind(entry.direction.as_str())
            .bind(&record.counterparty_username)
            .bind(record.message.as_deref())
            .bind(record.limit_change.to_string())
            .bind(ledger_index)
            .bind(&record.ledger_hash)
            .bind(&record.txn_hash)
            .bind(record.txn_date)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .context("Failed to append history record")?;
        }

        tx.commit()
            .await
            .context("Failed to commit history append transaction")?;

        Ok(())
    }

    /// List an account's history entries, newest ledger first.
    pub async fn list_history(&self, account: &Address) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT account_address, direction,
                   counterparty_username, message, limit_change,
                   ledger_index, ledger_hash, txn_hash, txn_date
            FROM account_transactions
            WHERE account_address = ?
            ORDER BY ledger_index DESC, id DESC
            "#,
        )
        .bind(account.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_history_entry).collect()
    }
}

fn row_to_history_entry(row: sqlx::sqlite::SqliteRow) -> Result<HistoryEntry> {
    let account: String = row.get("account_address");
    let direction: String = row.get("direction");
    let limit_change: String = row.get("limit_change");
    let ledger_index: i64 = row.get("ledger_index");

    let direction = direction
        .parse::<HistoryDirection>()
        .map_err(|e| anyhow::anyhow!("Invalid direction in database: {}", e))?;
    let limit_change = Decimal::from_str(&limit_change)
        .with_context(|| format!("Invalid stored limit change: {limit_change:?}"))?;

    Ok(HistoryEntry {
        account: Address::from(account),
        direction,
        record: TransactionRecord {
            counterparty_username: row.get("counterparty_username"),
            message: row.try_get("message").unwrap_or(None),
            limit_change,
            ledger_index: ledger_index as u64,
            ledger_hash: row.get("ledger_hash"),
            txn_hash: row.get("txn_hash"),
            txn_date: row.get("txn_date"),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_storage;
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(
        account: &str,
        direction: HistoryDirection,
        counterparty: &str,
        change: Decimal,
        txn_hash: &str,
    ) -> HistoryEntry {
        HistoryEntry {
            account: Address::from(account),
            direction,
            record: TransactionRecord {
                counterparty_username: counterparty.to_string(),
                message: Some("harvest credit".to_string()),
                limit_change: change,
                ledger_index: 42,
                ledger_hash: "LH42".to_string(),
                txn_hash: txn_hash.to_string(),
                txn_date: 1_700_000_000,
            },
        }
    }

    #[tokio::test]
    async fn append_both_writes_both_sides() {
        let (storage, _temp_db) = setup_storage().await;

        let outgoing = entry("rA", HistoryDirection::Outgoing, "bob", dec!(100), "T1");
        let incoming = entry("rB", HistoryDirection::Incoming, "alice", dec!(100), "T1");
        storage.append_both(&outgoing, &incoming).await.unwrap();

        let a_list = storage.list_history(&Address::from("rA")).await.unwrap();
        let b_list = storage.list_history(&Address::from("rB")).await.unwrap();
        assert_eq!(a_list.len(), 1);
        assert_eq!(b_list.len(), 1);
        assert_eq!(a_list[0].direction, HistoryDirection::Outgoing);
        assert_eq!(b_list[0].direction, HistoryDirection::Incoming);
        // Symmetric bookkeeping: same delta on both sides.
        assert_eq!(
            a_list[0].record.limit_change,
            b_list[0].record.limit_change
        );
    }

    #[tokio::test]
    async fn redelivery_does_not_duplicate() {
        let (storage, _temp_db) = setup_storage().await;

        let outgoing = entry("rA", HistoryDirection::Outgoing, "bob", dec!(10), "T7");
        let incoming = entry("rB", HistoryDirection::Incoming, "alice", dec!(10), "T7");

        storage.append_both(&outgoing, &incoming).await.unwrap();
        storage.append_both(&outgoing, &incoming).await.unwrap();

        assert_eq!(
            storage
                .list_history(&Address::from("rA"))
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            storage
                .list_history(&Address::from("rB"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn history_is_ordered_newest_first() {
        let (storage, _temp_db) = setup_storage().await;

        for (idx, hash) in [(10_u64, "T10"), (12, "T12"), (11, "T11")] {
            let mut outgoing = entry("rA", HistoryDirection::Outgoing, "bob", dec!(1), hash);
            let mut incoming = entry("rB", HistoryDirection::Incoming, "alice", dec!(1), hash);
            outgoing.record.ledger_index = idx;
            incoming.record.ledger_index = idx;
            storage.append_both(&outgoing, &incoming).await.unwrap();
        }

        let list = storage.list_history(&Address::from("rA")).await.unwrap();
        let indexes: Vec<u64> = list.iter().map(|e| e.record.ledger_index).collect();
        assert_eq!(indexes, vec![12, 11, 10]);
    }

    #[tokio::test]
    async fn out_of_range_ledger_index_is_rejected() {
        let (storage, _temp_db) = setup_storage().await;

        let mut outgoing = entry("rA", HistoryDirection::Outgoing, "bob", dec!(1), "T8");
        let incoming = entry("rB", HistoryDirection::Incoming, "alice", dec!(1), "T8");
        outgoing.record.ledger_index = u64::MAX;

        let err = storage.append_both(&outgoing, &incoming).await.unwrap_err();
        assert!(err.to_string().contains("Ledger index out of range"));
        // The failed append must not leave a half-written pair behind.
        assert!(storage
            .list_history(&Address::from("rB"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn negative_limit_change_roundtrips() {
        let (storage, _temp_db) = setup_storage().await;

        let outgoing = entry("rA", HistoryDirection::Outgoing, "bob", dec!(-40), "T9");
        let incoming = entry("rB", HistoryDirection::Incoming, "alice", dec!(-40), "T9");
        storage.append_both(&outgoing, &incoming).await.unwrap();

        let list = storage.list_history(&Address::from("rA")).await.unwrap();
        assert_eq!(list[0].record.limit_change, dec!(-40));
    }
}
