//! Storage backend contract
//!
//! Generated programs reach storage only through the [`Backend`] trait: a
//! transactional, ordered key-value store with point inserts and range
//! cursors. [`MemoryBackend`] is the in-process implementation.

pub mod memory;
pub mod transaction;

use std::fmt;

use crate::error::Result;

pub use memory::{MemoryBackend, MemoryCursor};
pub use transaction::{Transaction, TransactionState};

/// Isolation level requested by a `transaction` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Isolation {
    #[default]
    Serializable,
    Snapshot,
}

impl Isolation {
    /// Parse an isolation level name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "SERIALIZABLE" => Some(Isolation::Serializable),
            "SNAPSHOT" => Some(Isolation::Snapshot),
            _ => None,
        }
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Isolation::Serializable => write!(f, "SERIALIZABLE"),
            Isolation::Snapshot => write!(f, "SNAPSHOT"),
        }
    }
}

/// A transactional ordered key-value store
pub trait Backend {
    /// Opaque handle of an open range cursor
    type Cursor;

    fn begin_transaction(&mut self, isolation: Isolation) -> Result<()>;

    fn precommit_transaction(&mut self) -> Result<()>;

    /// Discard the open transaction after a failure; a no-op by default
    fn abort_transaction(&mut self) -> Result<()> {
        Ok(())
    }

    /// Insert a new pair; fails if the key already exists
    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Open a cursor over keys in `[from, to)`
    fn open_cursor(&mut self, from: &[u8], to: &[u8]) -> Result<Self::Cursor>;

    fn cursor_is_valid(&self, cursor: &Self::Cursor) -> bool;

    fn cursor_advance(&mut self, cursor: &mut Self::Cursor) -> Result<()>;

    /// Copy the current key into `out`, returning its length
    fn cursor_copy_key(&self, cursor: &Self::Cursor, out: &mut [u8]) -> Result<usize>;

    /// Copy the current value into `out`, returning its length
    fn cursor_copy_value(&self, cursor: &Self::Cursor, out: &mut [u8]) -> Result<usize>;

    fn cursor_destroy(&mut self, cursor: Self::Cursor);
}
