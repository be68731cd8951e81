//! In-memory settings store.
//!
//! Implements [`StoragePort`] over a `HashMap`, keyed by `namespace/key`.
//! Stands in for the board's non-volatile store on the host; writes are
//! trivially atomic.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::app::ports::{StorageError, StoragePort};

/// Largest value accepted by [`MemStorage::write`].
pub const MAX_VALUE_LEN: usize = 256;

#[derive(Debug, Default)]
pub struct MemStorage {
    store: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}/{key}")
    }
}

impl StoragePort for MemStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let composite = Self::composite_key(namespace, key);
        match self.store.borrow().get(&composite) {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_VALUE_LEN {
            return Err(StorageError::Full);
        }
        let composite = Self::composite_key(namespace, key);
        self.store.borrow_mut().insert(composite, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let composite = Self::composite_key(namespace, key);
        self.store.borrow_mut().remove(&composite);
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        let composite = Self::composite_key(namespace, key);
        self.store.borrow().contains_key(&composite)
    }
}
