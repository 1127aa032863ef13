//! Transactions of the in-memory backend
//!
//! A transaction buffers its writes until precommit; an aborted transaction
//! simply drops them.

use bytes::Bytes;
use std::collections::BTreeMap;

use super::Isolation;

/// Transaction State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// Transaction Context
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: u64,
    pub isolation: Isolation,
    pub state: TransactionState,
    /// Buffered inserts, applied at precommit
    writes: BTreeMap<Bytes, Bytes>,
}

impl Transaction {
    pub fn new(id: u64, isolation: Isolation) -> Self {
        Self {
            id,
            isolation,
            state: TransactionState::Active,
            writes: BTreeMap::new(),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.writes.contains_key(key)
    }

    pub fn write(&mut self, key: Bytes, value: Bytes) {
        self.writes.insert(key, value);
    }

    /// Buffered pairs with keys in `[from, to)`
    pub fn writes_in<'a>(
        &'a self,
        from: &'a [u8],
        to: &'a [u8],
    ) -> impl Iterator<Item = (&'a Bytes, &'a Bytes)> + 'a {
        self.writes
            .iter()
            .filter(move |(k, _)| k.as_ref() >= from && k.as_ref() < to)
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Mark committed and hand over the write set
    pub fn commit(&mut self) -> BTreeMap<Bytes, Bytes> {
        self.state = TransactionState::Committed;
        std::mem::take(&mut self.writes)
    }

    /// Mark aborted and drop the write set
    pub fn abort(&mut self) {
        self.state = TransactionState::Aborted;
        self.writes.clear();
    }
}
