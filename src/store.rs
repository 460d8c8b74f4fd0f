use crate::error::{ClaimError, Result};
use crate::types::{parse_address, parse_u256, ClaimStatus, WalletRecord};
use alloy_primitives::Address;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::debug;

/// Persisted per-wallet claim state, keyed by wallet address.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Insert a pending record unless the wallet is already known.
    /// Returns whether a row was created.
    async fn ensure_wallet(&self, wallet: Address, deposit: Address) -> Result<bool>;

    async fn upsert(&self, record: &WalletRecord) -> Result<()>;

    async fn get(&self, wallet: Address) -> Result<Option<WalletRecord>>;

    async fn by_status(&self, status: ClaimStatus) -> Result<Vec<WalletRecord>>;

    async fn all(&self) -> Result<Vec<WalletRecord>>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS claims (
                wallet_address TEXT PRIMARY KEY,
                deposit_address TEXT NOT NULL,
                allocation TEXT NOT NULL DEFAULT '0',
                claimed BOOLEAN NOT NULL DEFAULT 0,
                claim_status TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

fn key(address: Address) -> String {
    format!("{address:#x}")
}

fn decode_error(err: anyhow::Error) -> ClaimError {
    ClaimError::Store(sqlx::Error::Decode(err.into()))
}

fn record_from_row(row: &SqliteRow) -> Result<WalletRecord> {
    let wallet: String = row.try_get("wallet_address")?;
    let deposit: String = row.try_get("deposit_address")?;
    let allocation: String = row.try_get("allocation")?;
    let status: String = row.try_get("claim_status")?;
    Ok(WalletRecord {
        wallet_address: parse_address(&wallet).map_err(decode_error)?,
        deposit_address: parse_address(&deposit).map_err(decode_error)?,
        allocation_amount: parse_u256(&allocation).map_err(decode_error)?,
        claimed: row.try_get("claimed")?,
        claim_status: status.parse().map_err(decode_error)?,
    })
}

const SELECT_COLUMNS: &str =
    "SELECT wallet_address, deposit_address, allocation, claimed, claim_status FROM claims";

#[async_trait]
impl WalletStore for SqliteStore {
    async fn ensure_wallet(&self, wallet: Address, deposit: Address) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO claims (wallet_address, deposit_address, allocation, claimed, claim_status)
            VALUES (?, ?, '0', 0, ?)
            "#,
        )
        .bind(key(wallet))
        .bind(key(deposit))
        .bind(ClaimStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert(&self, record: &WalletRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO claims (wallet_address, deposit_address, allocation, claimed, claim_status)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(wallet_address) DO UPDATE SET
                deposit_address = excluded.deposit_address,
                allocation = excluded.allocation,
                claimed = excluded.claimed,
                claim_status = excluded.claim_status
            "#,
        )
        .bind(key(record.wallet_address))
        .bind(key(record.deposit_address))
        .bind(record.allocation_amount.to_string())
        .bind(record.claimed)
        .bind(record.claim_status.as_str())
        .execute(&self.pool)
        .await?;
        debug!(
            wallet = %record.wallet_address,
            status = %record.claim_status,
            "wallet record stored"
        );
        Ok(())
    }

    async fn get(&self, wallet: Address) -> Result<Option<WalletRecord>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE wallet_address = ?"))
            .bind(key(wallet))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn by_status(&self, status: ClaimStatus) -> Result<Vec<WalletRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE claim_status = ? ORDER BY rowid"))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn all(&self) -> Result<Vec<WalletRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    const WALLET: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
    const DEPOSIT: Address = address!("00000000000000000000000000000000000000de");

    #[tokio::test]
    async fn ensure_wallet_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.ensure_wallet(WALLET, DEPOSIT).await.unwrap());
        assert!(!store.ensure_wallet(WALLET, Address::ZERO).await.unwrap());

        let record = store.get(WALLET).await.unwrap().unwrap();
        assert_eq!(record, WalletRecord::pending(WALLET, DEPOSIT));
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_overwrites_terminal_state() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.ensure_wallet(WALLET, DEPOSIT).await.unwrap();

        let allocation = U256::from(10u64).pow(U256::from(20u64));
        let record = WalletRecord {
            allocation_amount: allocation,
            claimed: true,
            claim_status: ClaimStatus::Success,
            ..WalletRecord::pending(WALLET, DEPOSIT)
        };
        store.upsert(&record).await.unwrap();
        store.upsert(&record).await.unwrap();

        assert_eq!(store.get(WALLET).await.unwrap(), Some(record));
        assert!(store.by_status(ClaimStatus::Pending).await.unwrap().is_empty());
        let done = store.by_status(ClaimStatus::Success).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].allocation_amount, allocation);
    }

    #[tokio::test]
    async fn unknown_wallet_is_absent() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.get(WALLET).await.unwrap(), None);
    }
}
