//! Durable order buffer backed by redb
//!
//! Every mutation is one write transaction, so a crash mid-operation can
//! never leave a half-applied record. Reads open their own snapshot and
//! never block writers.
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `pending_orders` | uid | `PendingOrder` JSON | buffered orders awaiting submission |
//! | `counters` | name | u64 | durable counters (`synced_total`) |
//!
//! Synced orders are removed outright; only the counter remembers them.
//! Listing and claiming return records oldest first (`created_at`, uid as
//! the tie break), which is the submission order the upstream expects.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::order::{PendingOrder, SyncState};
use shared::status::StateCounts;
use thiserror::Error;

/// Buffered orders, keyed by uid
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("pending_orders");

/// Durable counters, keyed by name
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Counter: orders accepted upstream over the buffer's lifetime
const SYNCED_TOTAL_KEY: &str = "synced_total";

/// Errors from the order buffer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to the durable buffer; cheap to clone
#[derive(Debug, Clone)]
pub struct OrderStore {
    db: Arc<Database>,
}

impl OrderStore {
    /// Open (or create) the buffer at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open a buffer backed by memory only; nothing survives drop.
    ///
    /// Meant for tests and ephemeral setups.
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(ORDERS_TABLE)?;
            write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    // ========== Intake ==========

    /// Buffer a finalized order; returns false when the uid is already
    /// buffered (the first write wins, duplicates are ignored)
    pub fn put(&self, uid: &str, payload: serde_json::Value) -> StoreResult<bool> {
        self.put_record(&PendingOrder::new(uid, payload))
    }

    /// Buffer a fully formed record, keeping its creation timestamp
    pub fn put_record(&self, order: &PendingOrder) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            if table.get(order.uid.as_str())?.is_some() {
                false
            } else {
                let value = serde_json::to_vec(order)?;
                table.insert(order.uid.as_str(), value.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    // ========== Reads ==========

    /// Fetch one buffered order
    pub fn get(&self, uid: &str) -> StoreResult<Option<PendingOrder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(uid)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// List buffered orders oldest first, optionally filtered by state
    pub fn list(&self, filter: Option<SyncState>) -> StoreResult<Vec<PendingOrder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        let mut orders = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let order: PendingOrder = serde_json::from_slice(value.value())?;
            if filter.is_none() || filter == Some(order.state) {
                orders.push(order);
            }
        }
        orders.sort_by(fifo_order);
        Ok(orders)
    }

    /// Count buffered records per state
    pub fn counts(&self) -> StoreResult<StateCounts> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        let mut counts = StateCounts::default();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let order: PendingOrder = serde_json::from_slice(value.value())?;
            match order.state {
                SyncState::Pending => counts.pending += 1,
                SyncState::InFlight => counts.in_flight += 1,
                SyncState::Failed => counts.failed += 1,
                // Synced records never persist
                SyncState::Synced => {}
            }
        }
        Ok(counts)
    }

    /// Orders accepted upstream over the buffer's lifetime
    pub fn synced_total(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COUNTERS_TABLE)?;
        let total = table.get(SYNCED_TOTAL_KEY)?.map(|v| v.value()).unwrap_or(0);
        Ok(total)
    }

    // ========== Sync Pass Transitions ==========

    /// Claim everything eligible for submission, oldest first.
    ///
    /// Eligible means pending, plus failed records that still have retries
    /// left (those only exist after a crash between transitions). All
    /// claimed records flip to in-flight in the same transaction.
    pub fn claim_pending(&self, retry_ceiling: u32) -> StoreResult<Vec<PendingOrder>> {
        let write_txn = self.db.begin_write()?;
        let claimed = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            let mut eligible = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let order: PendingOrder = serde_json::from_slice(value.value())?;
                let due = match order.state {
                    SyncState::Pending => true,
                    SyncState::Failed => order.retry_count < retry_ceiling,
                    _ => false,
                };
                if due {
                    eligible.push(order);
                }
            }
            eligible.sort_by(fifo_order);
            for order in &mut eligible {
                order.state = SyncState::InFlight;
                let value = serde_json::to_vec(order)?;
                table.insert(order.uid.as_str(), value.as_slice())?;
            }
            eligible
        };
        write_txn.commit()?;
        Ok(claimed)
    }

    /// Remove a synced order and bump the synced counter, atomically
    pub fn complete(&self, uid: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            let existed = table.remove(uid)?.is_some();
            if existed {
                let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
                let total = counters.get(SYNCED_TOTAL_KEY)?.map(|v| v.value()).unwrap_or(0);
                counters.insert(SYNCED_TOTAL_KEY, total + 1)?;
            }
            existed
        };
        write_txn.commit()?;
        if existed {
            Ok(())
        } else {
            Err(StoreError::OrderNotFound(uid.to_string()))
        }
    }

    /// Record a transient failure: back to pending with one more retry
    pub fn mark_retry(&self, uid: &str, error: &str) -> StoreResult<PendingOrder> {
        self.update_order(uid, |order| {
            order.state = SyncState::Pending;
            order.retry_count += 1;
            order.last_error = Some(error.to_string());
        })
    }

    /// Park an order whose retry ceiling was reached by one more transient
    /// failure; the failing attempt still counts
    pub fn mark_failed(&self, uid: &str, error: &str) -> StoreResult<PendingOrder> {
        self.update_order(uid, |order| {
            order.state = SyncState::Failed;
            order.retry_count += 1;
            order.last_error = Some(error.to_string());
        })
    }

    /// Park a permanently rejected order. The retry count saturates to the
    /// ceiling so the record is never picked up as claimable again.
    pub fn mark_rejected(
        &self,
        uid: &str,
        error: &str,
        retry_ceiling: u32,
    ) -> StoreResult<PendingOrder> {
        self.update_order(uid, |order| {
            order.state = SyncState::Failed;
            order.retry_count = order.retry_count.max(retry_ceiling);
            order.last_error = Some(error.to_string());
        })
    }

    /// Return claimed but unattempted records to pending, untouched.
    ///
    /// Used when a pass aborts with part of its claim outstanding. Records
    /// discarded mid-pass are skipped silently.
    pub fn release_claimed(&self, uids: &[String]) -> StoreResult<usize> {
        let write_txn = self.db.begin_write()?;
        let mut released = 0;
        {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            for uid in uids {
                let current = match table.get(uid.as_str())? {
                    Some(value) => Some(serde_json::from_slice::<PendingOrder>(value.value())?),
                    None => None,
                };
                if let Some(mut order) = current
                    && order.state == SyncState::InFlight
                {
                    order.state = SyncState::Pending;
                    let value = serde_json::to_vec(&order)?;
                    table.insert(uid.as_str(), value.as_slice())?;
                    released += 1;
                }
            }
        }
        write_txn.commit()?;
        Ok(released)
    }

    // ========== Maintenance ==========

    /// Remove a buffered order; returns false when nothing was there.
    ///
    /// Discarding is idempotent: removing an already-removed uid is a no-op.
    pub fn remove(&self, uid: &str) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            table.remove(uid)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Put records stranded in-flight by a crash back to pending.
    ///
    /// Runs once at startup, before the first pass. Returns how many
    /// records were reset.
    pub fn reset_in_flight(&self) -> StoreResult<usize> {
        self.reset_state(SyncState::InFlight, |order| {
            order.state = SyncState::Pending;
        })
    }

    /// Return parked failed orders to pending with a clean slate.
    ///
    /// Operator-initiated: retry counts and error messages are cleared so
    /// the records get a full set of attempts again.
    pub fn recover_failed(&self) -> StoreResult<usize> {
        self.reset_state(SyncState::Failed, |order| {
            order.state = SyncState::Pending;
            order.retry_count = 0;
            order.last_error = None;
        })
    }

    // ========== Internals ==========

    /// Read-modify-write one record in a single transaction
    fn update_order<F>(&self, uid: &str, apply: F) -> StoreResult<PendingOrder>
    where
        F: FnOnce(&mut PendingOrder),
    {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            // Read into an owned value first; the access guard must be gone
            // before the table can be written again
            let current = match table.get(uid)? {
                Some(value) => Some(serde_json::from_slice::<PendingOrder>(value.value())?),
                None => None,
            };
            match current {
                Some(mut order) => {
                    apply(&mut order);
                    let value = serde_json::to_vec(&order)?;
                    table.insert(uid, value.as_slice())?;
                    Some(order)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        updated.ok_or_else(|| StoreError::OrderNotFound(uid.to_string()))
    }

    /// Rewrite every record in `from` state with `apply`, one transaction
    fn reset_state<F>(&self, from: SyncState, apply: F) -> StoreResult<usize>
    where
        F: Fn(&mut PendingOrder),
    {
        let write_txn = self.db.begin_write()?;
        let count = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            let mut matched = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let order: PendingOrder = serde_json::from_slice(value.value())?;
                if order.state == from {
                    matched.push(order);
                }
            }
            for order in &mut matched {
                apply(order);
                let value = serde_json::to_vec(order)?;
                table.insert(order.uid.as_str(), value.as_slice())?;
            }
            matched.len()
        };
        write_txn.commit()?;
        Ok(count)
    }
}

fn fifo_order(a: &PendingOrder, b: &PendingOrder) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.uid.cmp(&b.uid))
}
