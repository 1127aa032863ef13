//! In-memory backend
//!
//! An ordered map of committed pairs plus at most one open transaction.
//! Inserts outside a transaction commit immediately. Cursors see committed
//! pairs and the open transaction's own writes, as of the moment they were
//! opened.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;

use tracing::{debug, info, trace, warn};

use super::transaction::Transaction;
use super::{Backend, Isolation};
use crate::error::{Error, Result};

/// Cursor over a materialized key range
#[derive(Debug)]
pub struct MemoryCursor {
    entries: Vec<(Bytes, Bytes)>,
    position: usize,
}

impl MemoryCursor {
    fn current(&self) -> Result<&(Bytes, Bytes)> {
        self.entries
            .get(self.position)
            .ok_or_else(|| Error::Backend("cursor is past the end of its range".to_string()))
    }
}

/// In-memory transactional key-value store
#[derive(Debug, Default)]
pub struct MemoryBackend {
    committed: BTreeMap<Bytes, Bytes>,
    active: Option<Transaction>,
    last: Option<Transaction>,
    next_txn_id: u64,
    open_cursors: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            next_txn_id: 1,
            ..Self::default()
        }
    }

    /// Committed value of a key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.committed.get(key).map(|v| v.as_ref())
    }

    /// Committed pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.committed.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    /// Number of committed pairs
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// The open transaction, if any
    pub fn active_transaction(&self) -> Option<&Transaction> {
        self.active.as_ref()
    }

    /// The most recently finished transaction
    pub fn last_transaction(&self) -> Option<&Transaction> {
        self.last.as_ref()
    }

    /// Cursors opened and not yet destroyed
    pub fn open_cursors(&self) -> usize {
        self.open_cursors
    }

    fn exists(&self, key: &[u8]) -> bool {
        self.committed.contains_key(key) || self.active.as_ref().is_some_and(|t| t.contains(key))
    }
}

impl Backend for MemoryBackend {
    type Cursor = MemoryCursor;

    fn begin_transaction(&mut self, isolation: Isolation) -> Result<()> {
        if let Some(txn) = &self.active {
            return Err(Error::TransactionAlreadyActive(txn.id));
        }

        let id = self.next_txn_id.max(1);
        self.next_txn_id = id + 1;
        debug!(id, %isolation, "transaction started");
        self.active = Some(Transaction::new(id, isolation));
        Ok(())
    }

    fn precommit_transaction(&mut self) -> Result<()> {
        let mut txn = self.active.take().ok_or(Error::NoActiveTransaction)?;
        let writes = txn.commit();
        info!(id = txn.id, writes = writes.len(), "transaction committed");
        self.committed.extend(writes);
        self.last = Some(txn);
        Ok(())
    }

    fn abort_transaction(&mut self) -> Result<()> {
        let mut txn = self.active.take().ok_or(Error::NoActiveTransaction)?;
        warn!(id = txn.id, writes = txn.write_count(), "transaction aborted");
        txn.abort();
        self.last = Some(txn);
        Ok(())
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.exists(key) {
            return Err(Error::DuplicateKey(String::from_utf8_lossy(key).into_owned()));
        }

        let key = Bytes::copy_from_slice(key);
        let value = Bytes::copy_from_slice(value);
        trace!(key_len = key.len(), value_len = value.len(), "insert");

        match self.active.as_mut() {
            Some(txn) => txn.write(key, value),
            None => {
                self.committed.insert(key, value);
            }
        }
        Ok(())
    }

    fn open_cursor(&mut self, from: &[u8], to: &[u8]) -> Result<MemoryCursor> {
        let mut view: BTreeMap<Bytes, Bytes> = if from < to {
            self.committed
                .range::<[u8], _>((Bound::Included(from), Bound::Excluded(to)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        } else {
            BTreeMap::new()
        };

        if let Some(txn) = &self.active {
            view.extend(txn.writes_in(from, to).map(|(k, v)| (k.clone(), v.clone())));
        }

        trace!(rows = view.len(), "cursor opened");
        self.open_cursors += 1;
        Ok(MemoryCursor {
            entries: view.into_iter().collect(),
            position: 0,
        })
    }

    fn cursor_is_valid(&self, cursor: &MemoryCursor) -> bool {
        cursor.position < cursor.entries.len()
    }

    fn cursor_advance(&mut self, cursor: &mut MemoryCursor) -> Result<()> {
        if cursor.position < cursor.entries.len() {
            cursor.position += 1;
        }
        Ok(())
    }

    fn cursor_copy_key(&self, cursor: &MemoryCursor, out: &mut [u8]) -> Result<usize> {
        copy_into(&cursor.current()?.0, out)
    }

    fn cursor_copy_value(&self, cursor: &MemoryCursor, out: &mut [u8]) -> Result<usize> {
        copy_into(&cursor.current()?.1, out)
    }

    fn cursor_destroy(&mut self, cursor: MemoryCursor) {
        self.open_cursors = self.open_cursors.saturating_sub(1);
        drop(cursor);
    }
}

fn copy_into(src: &[u8], out: &mut [u8]) -> Result<usize> {
    let available = out.len();
    let dst = out.get_mut(..src.len()).ok_or(Error::BufferTooShort {
        needed: src.len(),
        available,
    })?;
    dst.copy_from_slice(src);
    Ok(src.len())
}
