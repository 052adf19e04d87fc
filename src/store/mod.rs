//! Persistence layer.
//!
//! Rows are written through the [`Store`] trait so the jobs do not care which
//! engine sits underneath: [`PgStore`] is the production backend and
//! [`MemoryStore`] backs dry runs and tests. Both honour the same contract:
//!
//! - the destination table is created if missing and never altered;
//! - every `write` call is a single transaction;
//! - [`WriteMode::Insert`] fails with [`StoreError::Conflict`] on a duplicate
//!   key and commits nothing;
//! - [`WriteMode::Upsert`] overwrites rows sharing the primary key;
//! - [`WriteMode::Replace`] drops and recreates the table from the given rows.

mod memory;
mod postgres;
pub mod schema;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::StoredTrack;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key while inserting into {0}")]
    Conflict(String),

    #[error("schema mismatch on {table}: {reason}")]
    Schema { table: String, reason: String },

    /// A writer panicked while holding the in-memory tables
    #[error("in-memory store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

/// How a batch lands in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WriteMode {
    /// Plain insert; a key already present aborts the batch
    Insert,
    /// Insert or update by primary key
    #[default]
    Upsert,
    /// Drop and recreate the table from this batch
    #[value(skip)]
    Replace,
}

// ---------------------------------------------------------------------------
// Table description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar,
    Text,
    Int,
    BigInt,
    Boolean,
    TextArray,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Varchar => "VARCHAR(255)",
            Self::Text => "TEXT",
            Self::Int => "INT",
            Self::BigInt => "BIGINT",
            Self::Boolean => "BOOLEAN",
            Self::TextArray => "TEXT[]",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    pub const fn optional(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub primary_key: Option<&'static str>,
}

impl TableSpec {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn check_row(&self, row: &[SqlValue]) -> Result<(), StoreError> {
        if row.len() != self.columns.len() {
            return Err(self.mismatch(format!(
                "row has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(row) {
            if !column.nullable && value.is_null() {
                return Err(self.mismatch(format!("{} must not be null", column.name)));
            }
        }
        Ok(())
    }

    fn require_key(&self) -> Result<&'static str, StoreError> {
        self.primary_key
            .ok_or_else(|| self.mismatch("upsert needs a primary key".to_string()))
    }

    fn mismatch(&self, reason: String) -> StoreError {
        StoreError::Schema {
            table: self.name.to_string(),
            reason,
        }
    }
}

/// A single cell, typed so it can be bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Int(Option<i32>),
    BigInt(Option<i64>),
    Bool(Option<bool>),
    TextArray(Vec<String>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Text(v) => v.is_none(),
            Self::Int(v) => v.is_none(),
            Self::BigInt(v) => v.is_none(),
            Self::Bool(v) => v.is_none(),
            Self::TextArray(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => v.as_deref(),
            _ => None,
        }
    }
}

pub type Row = Vec<SqlValue>;

/// A record that knows its destination table.
pub trait Tabular {
    fn table() -> &'static TableSpec;
    fn to_row(&self) -> Row;
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Store: Send + Sync {
    /// Write `rows` into `table` as one transaction, returning rows affected.
    async fn write(
        &self,
        table: &'static TableSpec,
        rows: &[Row],
        mode: WriteMode,
    ) -> Result<u64, StoreError>;

    /// Every stored track, or nothing if the table does not exist yet.
    async fn read_tracks(&self) -> Result<Vec<StoredTrack>, StoreError>;

    /// Take the run-level lock. `false` means another run holds it.
    async fn try_lock_run(&self) -> Result<bool, StoreError>;

    async fn unlock_run(&self) -> Result<(), StoreError>;

    async fn close(&self) {}
}

pub async fn write_records<S, R>(store: &S, records: &[R], mode: WriteMode) -> Result<u64, StoreError>
where
    S: Store + ?Sized,
    R: Tabular,
{
    let rows: Vec<Row> = records.iter().map(Tabular::to_row).collect();
    store.write(R::table(), &rows, mode).await
}
