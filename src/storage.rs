//! Local persistence: an opaque string key/value store and the anchor record kept in it.

use std::collections::HashMap;

use data_encoding::HEXLOWER;
use parking_lot::RwLock;

use crate::errors::StorageError;
use crate::keys::{KeyPair, KEY_BYTES};
use crate::types::Anchor;

/// Key the anchor number is persisted under.
pub const ANCHOR_KEY: &str = "userNumber";

const DEVICE_KEY_PREFIX: &str = "deviceKey/";

pub trait KeyValueStore: Send + Sync {
    /// # Errors
    /// Backend failures.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    /// Backend failures.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    /// Backend failures.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// The anchor this device uses plus locally held device keys.
#[derive(Debug)]
pub struct AnchorStore<S> {
    store: S,
}

impl<S: KeyValueStore> AnchorStore<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn inner(&self) -> &S {
        &self.store
    }

    /// # Errors
    ///
    /// `StorageError::Corrupt` if the stored value is not a decimal anchor number.
    pub fn anchor(&self) -> Result<Option<Anchor>, StorageError> {
        self.store
            .get(ANCHOR_KEY)?
            .map(|v| {
                v.parse::<u64>().map(Anchor).map_err(|_| StorageError::Corrupt {
                    key: ANCHOR_KEY.to_owned(),
                    value: v,
                })
            })
            .transpose()
    }

    /// # Errors
    /// Backend failures.
    pub fn set_anchor(&self, anchor: Anchor) -> Result<(), StorageError> {
        self.store.set(ANCHOR_KEY, &anchor.to_string())
    }

    /// # Errors
    /// Backend failures.
    pub fn clear_anchor(&self) -> Result<(), StorageError> {
        self.store.remove(ANCHOR_KEY)
    }

    fn device_key_name(anchor: Anchor) -> String {
        format!("{DEVICE_KEY_PREFIX}{anchor}")
    }

    /// # Errors
    /// Backend failures.
    pub fn set_device_key(&self, anchor: Anchor, key: &KeyPair) -> Result<(), StorageError> {
        self.store.set(
            &Self::device_key_name(anchor),
            &HEXLOWER.encode(&key.secret_bytes()),
        )
    }

    /// # Errors
    ///
    /// `StorageError::Corrupt` if the stored value is not a 32-byte hex seed.
    pub fn device_key(&self, anchor: Anchor) -> Result<Option<KeyPair>, StorageError> {
        let name = Self::device_key_name(anchor);
        let Some(value) = self.store.get(&name)? else {
            return Ok(None);
        };
        let seed: [u8; KEY_BYTES] = HEXLOWER
            .decode(value.as_bytes())
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| StorageError::Corrupt {
                key: name,
                value: "<device key>".to_owned(),
            })?;
        Ok(Some(KeyPair::from_seed(&seed)))
    }

    /// # Errors
    /// Backend failures.
    pub fn clear_device_key(&self, anchor: Anchor) -> Result<(), StorageError> {
        self.store.remove(&Self::device_key_name(anchor))
    }
}
