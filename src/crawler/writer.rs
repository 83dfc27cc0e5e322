//! Entry writer
//!
//! Persists item metadata either one record at a time or in buffered batches.
//! Batches are split into chunks the store accepts in one call.

use crate::storage::{lock, EntryRecord, EntryStore, SharedStorage, MAX_BATCH_WRITE};
use crate::Result;

pub struct EntryWriter {
    storage: SharedStorage,
    batch_size: usize,
    buffer: Vec<EntryRecord>,
}

impl EntryWriter {
    /// Creates a writer; a batch size of 1 writes every record immediately
    pub fn new(storage: SharedStorage, batch_size: usize) -> Self {
        Self {
            storage,
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
        }
    }

    pub fn write(&mut self, record: EntryRecord) -> Result<()> {
        if self.batch_size == 1 {
            lock(&self.storage)?.put_entry(&record)?;
            return Ok(());
        }

        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes every buffered record
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut storage = lock(&self.storage)?;
        for chunk in self.buffer.chunks(MAX_BATCH_WRITE) {
            tracing::debug!("Writing batch of {} entries", chunk.len());
            storage.batch_put_entries(chunk)?;
        }
        self.buffer.clear();
        Ok(())
    }
}
