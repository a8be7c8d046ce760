//! Sequence Allocator: durable monotonic per-day counters for plan IDs.
//!
//! Two implementations behind one trait: an in-memory
//! `parking_lot::Mutex<HashMap<...>>` allocator for tests, and a
//! SQLite-backed allocator keyed by (`order_type`, `plan_date`) with
//! `INSERT ... ON CONFLICT` row-level serialization for durability
//! across process restarts.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};

use crate::aps::model::OrderType;

/// Durable monotonic counter keyed by (order_type, plan_date).
pub trait SequenceAllocator: Send + Sync {
    fn next_sequence(&self, order_type: OrderType, plan_date: NaiveDate) -> Result<u64>;
}

/// In-memory allocator: deterministic, process-local, used by tests and
/// by library consumers who supply their own persistence elsewhere.
#[derive(Debug, Default)]
pub struct InMemorySequenceAllocator {
    counters: Mutex<HashMap<(OrderType, NaiveDate), u64>>,
}

impl InMemorySequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceAllocator for InMemorySequenceAllocator {
    fn next_sequence(&self, order_type: OrderType, plan_date: NaiveDate) -> Result<u64> {
        let mut counters = self.counters.lock();
        let counter = counters.entry((order_type, plan_date)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

/// SQLite-backed allocator, durable across process restarts. Table is
/// keyed by (order_type, plan_date), columns `current_sequence`,
/// `last_plan_id`, `updated_time`.
pub struct SqliteSequenceAllocator {
    conn: Mutex<Connection>,
}

impl SqliteSequenceAllocator {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .context("opening sequence allocator database")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite db")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS sequence_allocations (
                order_type TEXT NOT NULL,
                plan_date TEXT NOT NULL,
                current_sequence INTEGER NOT NULL DEFAULT 0,
                last_plan_id TEXT,
                updated_time INTEGER NOT NULL,
                PRIMARY KEY (order_type, plan_date)
            );
            "#,
        )?;
        Ok(())
    }
}

impl SequenceAllocator for SqliteSequenceAllocator {
    fn next_sequence(&self, order_type: OrderType, plan_date: NaiveDate) -> Result<u64> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();
        let type_key = order_type.prefix();
        let date_key = plan_date.format("%Y-%m-%d").to_string();

        conn.execute(
            "INSERT INTO sequence_allocations (order_type, plan_date, current_sequence, updated_time)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(order_type, plan_date)
             DO UPDATE SET current_sequence = current_sequence + 1, updated_time = ?3",
            params![type_key, date_key, now],
        )
        .context("allocating sequence number")?;

        let seq: i64 = conn
            .query_row(
                "SELECT current_sequence FROM sequence_allocations WHERE order_type = ?1 AND plan_date = ?2",
                params![type_key, date_key],
                |row| row.get(0),
            )
            .context("reading back allocated sequence")?;

        let plan_id = format!("{}{:09}", type_key, seq);
        conn.execute(
            "UPDATE sequence_allocations SET last_plan_id = ?1 WHERE order_type = ?2 AND plan_date = ?3",
            params![plan_id, type_key, date_key],
        )?;

        Ok(seq as u64)
    }
}
