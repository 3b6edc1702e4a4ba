//! Coarse-locked reader for drivers that poll progress from another thread.

use anyhow::{anyhow, Result};
use std::sync::{Mutex, MutexGuard};

use super::RecordReader;

/// One mutex around the whole reader; every public call takes it.
/// `close()` waits for an in-flight `produce_next` to return.
pub struct SharedReader {
    inner: Mutex<RecordReader>,
}

impl SharedReader {
    pub fn new(reader: RecordReader) -> Self {
        Self {
            inner: Mutex::new(reader),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RecordReader>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("record reader lock poisoned"))
    }

    pub fn produce_next(&self, key: &mut Vec<u8>, value: &mut Vec<u8>) -> Result<bool> {
        self.lock()?.produce_next(key, value)
    }

    pub fn position(&self) -> Result<u64> {
        Ok(self.lock()?.position())
    }

    pub fn progress(&self) -> Result<f32> {
        Ok(self.lock()?.progress())
    }

    pub fn read_bytes(&self) -> Result<u64> {
        Ok(self.lock()?.read_bytes())
    }

    pub fn close(&self) -> Result<()> {
        self.lock()?.close();
        Ok(())
    }

    pub fn into_inner(self) -> Result<RecordReader> {
        self.inner
            .into_inner()
            .map_err(|_| anyhow!("record reader lock poisoned"))
    }
}
