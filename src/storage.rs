//! Transactional draw store backed by RocksDB
//!
//! Records are JSON documents under typed key prefixes. Every read-modify-write
//! goes through a `StoreTxn`: an optimistic transaction that tracks the keys it
//! read with `get_for_update` and fails at commit if any of them changed since.
//! That commit-time check is the only mutual exclusion the engine relies on.

use crate::bingo::types::{Card, Draw, Purchase, Tier, UserAccount, WinnerEvent};
use crate::config::StorageConfig;
use crate::errors::{BingoError, BingoResult};
use rocksdb::{Direction, IteratorMode, OptimisticTransactionDB, Options, Transaction};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;

const DRAW_PREFIX: &str = "draw:";
const CARD_PREFIX: &str = "card:";
const ACCOUNT_PREFIX: &str = "account:";
const PURCHASE_PREFIX: &str = "purchase:";
const PAYOUT_PREFIX: &str = "payout:";

fn draw_key(draw_id: &str) -> String {
    format!("{}{}", DRAW_PREFIX, draw_id)
}

fn card_prefix(draw_id: &str) -> String {
    format!("{}{}:", CARD_PREFIX, draw_id)
}

// Zero-padded serial keeps key order equal to sale order
fn card_key(draw_id: &str, serial: u64) -> String {
    format!("{}{:020}", card_prefix(draw_id), serial)
}

fn account_key(user_id: &str) -> String {
    format!("{}{}", ACCOUNT_PREFIX, user_id)
}

fn purchase_prefix(user_id: &str) -> String {
    format!("{}{}:", PURCHASE_PREFIX, user_id)
}

fn purchase_key(user_id: &str, purchase_id: &str) -> String {
    format!("{}{}", purchase_prefix(user_id), purchase_id)
}

fn payout_prefix(draw_id: &str) -> String {
    format!("{}{}:", PAYOUT_PREFIX, draw_id)
}

fn payout_key(draw_id: &str, tier: Tier) -> String {
    format!("{}{}", payout_prefix(draw_id), tier.as_str())
}

fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> BingoResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        BingoError::CorruptedData(format!(
            "Failed to decode {}: {}",
            String::from_utf8_lossy(key),
            e
        ))
    })
}

fn encode<T: Serialize>(value: &T) -> BingoResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| BingoError::Storage(format!("Failed to encode record: {}", e)))
}

#[derive(Clone)]
pub struct DrawStore {
    db: Arc<OptimisticTransactionDB>,
}

impl DrawStore {
    pub fn open(config: &StorageConfig) -> BingoResult<Self> {
        let path = Path::new(&config.data_directory);
        if config.clear_on_start && path.exists() {
            tracing::warn!(path = %config.data_directory, "Clearing draw store on start");
            std::fs::remove_dir_all(path)
                .map_err(|e| BingoError::Storage(format!("Failed to clear {}: {}", config.data_directory, e)))?;
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db: OptimisticTransactionDB = OptimisticTransactionDB::open(&opts, path)?;
        tracing::info!(path = %config.data_directory, "Draw store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Open with default tuning at `path`
    pub fn open_path<P: AsRef<Path>>(path: P) -> BingoResult<Self> {
        let config = StorageConfig {
            data_directory: path.as_ref().to_string_lossy().into_owned(),
            clear_on_start: false,
            ..Default::default()
        };
        Self::open(&config)
    }

    /// Start an optimistic transaction
    pub fn begin(&self) -> StoreTxn<'_> {
        StoreTxn {
            txn: self.db.transaction(),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> BingoResult<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(key.as_bytes(), &bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, prefix: &str) -> BingoResult<Vec<T>> {
        let mut records = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            records.push(decode(&key, &value)?);
        }

        Ok(records)
    }

    pub fn load_draw(&self, draw_id: &str) -> BingoResult<Draw> {
        self.get_json(&draw_key(draw_id))?
            .ok_or_else(|| BingoError::draw_not_found(draw_id))
    }

    pub fn list_draws(&self) -> BingoResult<Vec<Draw>> {
        self.scan_json(DRAW_PREFIX)
    }

    /// Cards of a draw in sale order
    pub fn load_cards(&self, draw_id: &str) -> BingoResult<Vec<Card>> {
        self.scan_json(&card_prefix(draw_id))
    }

    pub fn load_account(&self, user_id: &str) -> BingoResult<UserAccount> {
        self.get_json(&account_key(user_id))?
            .ok_or_else(|| BingoError::account_not_found(user_id))
    }

    pub fn load_purchases(&self, user_id: &str) -> BingoResult<Vec<Purchase>> {
        self.scan_json(&purchase_prefix(user_id))
    }

    /// Payout receipts of a draw, in tier order
    pub fn load_payouts(&self, draw_id: &str) -> BingoResult<Vec<WinnerEvent>> {
        let mut receipts: Vec<WinnerEvent> = self.scan_json(&payout_prefix(draw_id))?;
        receipts.sort_by_key(|receipt| receipt.tier);
        Ok(receipts)
    }
}

/// One optimistic transaction. Dropping it without `commit` discards every write.
pub struct StoreTxn<'a> {
    txn: Transaction<'a, OptimisticTransactionDB>,
}

impl StoreTxn<'_> {
    fn get_for_update<T: DeserializeOwned>(&self, key: &str) -> BingoResult<Option<T>> {
        match self.txn.get_for_update(key.as_bytes(), true)? {
            Some(bytes) => Ok(Some(decode(key.as_bytes(), &bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> BingoResult<()> {
        self.txn.put(key.as_bytes(), encode(value)?)?;
        Ok(())
    }

    /// Read a draw and track it for conflicts
    pub fn draw_for_update(&self, draw_id: &str) -> BingoResult<Draw> {
        self.get_for_update(&draw_key(draw_id))?
            .ok_or_else(|| BingoError::draw_not_found(draw_id))
    }

    pub fn draw_exists(&self, draw_id: &str) -> BingoResult<bool> {
        Ok(self.txn.get_for_update(draw_key(draw_id).as_bytes(), true)?.is_some())
    }

    pub fn account_for_update(&self, user_id: &str) -> BingoResult<UserAccount> {
        self.get_for_update(&account_key(user_id))?
            .ok_or_else(|| BingoError::account_not_found(user_id))
    }

    pub fn account_exists(&self, user_id: &str) -> BingoResult<bool> {
        Ok(self.txn.get_for_update(account_key(user_id).as_bytes(), true)?.is_some())
    }

    pub fn payout_for_update(&self, draw_id: &str, tier: Tier) -> BingoResult<Option<WinnerEvent>> {
        self.get_for_update(&payout_key(draw_id, tier))
    }

    pub fn put_draw(&self, draw: &Draw) -> BingoResult<()> {
        self.put_json(&draw_key(&draw.id), draw)
    }

    pub fn put_card(&self, card: &Card) -> BingoResult<()> {
        self.put_json(&card_key(&card.draw_id, card.serial), card)
    }

    pub fn put_account(&self, account: &UserAccount) -> BingoResult<()> {
        self.put_json(&account_key(&account.id), account)
    }

    pub fn put_purchase(&self, purchase: &Purchase) -> BingoResult<()> {
        self.put_json(&purchase_key(&purchase.user_id, &purchase.id), purchase)
    }

    pub fn put_payout(&self, receipt: &WinnerEvent) -> BingoResult<()> {
        self.put_json(&payout_key(&receipt.draw_id, receipt.tier), receipt)
    }

    /// Apply every write atomically, or fail with `TransactionConflict` if a
    /// tracked key changed underneath us.
    pub fn commit(self) -> BingoResult<()> {
        self.txn.commit()?;
        Ok(())
    }
}
