//! # Keyed Extension Store
//!
//! [`KeyedStore`] is the type-erased key-value store backing a vault's
//! extension slot. Extensions (defined in downstream crates) need to park
//! their own record types inside a vault the substrate knows nothing
//! about, so values are stored as `Box<dyn Any>` under caller-chosen byte
//! keys and recovered by type at the access site.
//!
//! The store enforces a strict presence discipline: inserting over an
//! existing key fails, removing an absent key fails. That discipline is
//! what downstream state machines lean on for their one-state-per-asset
//! invariants.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

fn hex_key(key: &[u8]) -> String {
    key.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from keyed-store access.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Inserted a key that is already present.
    #[error("store key {key} is already occupied")]
    DuplicateKey {
        /// Hex-encoded key bytes.
        key: String,
    },

    /// Looked up a key that is not present.
    #[error("store key {key} not found")]
    NotFound {
        /// Hex-encoded key bytes.
        key: String,
    },

    /// The value under the key is not of the requested type.
    #[error("store key {key} holds a value of a different type")]
    TypeMismatch {
        /// Hex-encoded key bytes.
        key: String,
    },
}

/// Failed insertion: the key was occupied. Carries the rejected value
/// back to the caller so nothing is dropped on the failure path.
pub struct OccupiedKey<V> {
    key: Vec<u8>,
    /// The value that was not inserted.
    pub value: V,
}

impl<V> OccupiedKey<V> {
    /// The key that was already occupied.
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl<V> fmt::Debug for OccupiedKey<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OccupiedKey")
            .field("key", &hex_key(&self.key))
            .finish_non_exhaustive()
    }
}

impl<V> From<OccupiedKey<V>> for StoreError {
    fn from(occupied: OccupiedKey<V>) -> Self {
        StoreError::DuplicateKey {
            key: hex_key(&occupied.key),
        }
    }
}

// ---------------------------------------------------------------------------
// KeyedStore
// ---------------------------------------------------------------------------

/// A byte-keyed store of arbitrarily typed values.
#[derive(Debug, Default)]
pub struct KeyedStore {
    entries: HashMap<Vec<u8>, Box<dyn Any + Send>>,
}

impl KeyedStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`OccupiedKey`] carrying the rejected value if the key is
    /// already present.
    pub fn insert<V: Any + Send>(&mut self, key: Vec<u8>, value: V) -> Result<(), OccupiedKey<V>> {
        if self.entries.contains_key(&key) {
            return Err(OccupiedKey { key, value });
        }
        self.entries.insert(key, Box::new(value));
        Ok(())
    }

    /// Borrows the value under `key` as a `V`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the key is absent, or
    /// [`StoreError::TypeMismatch`] if the stored value is not a `V`.
    pub fn get<V: Any>(&self, key: &[u8]) -> Result<&V, StoreError> {
        let boxed = self.entries.get(key).ok_or_else(|| StoreError::NotFound {
            key: hex_key(key),
        })?;
        boxed
            .downcast_ref::<V>()
            .ok_or_else(|| StoreError::TypeMismatch { key: hex_key(key) })
    }

    /// Removes and returns the value under `key` as a `V`.
    ///
    /// On a type mismatch the entry is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the key is absent, or
    /// [`StoreError::TypeMismatch`] if the stored value is not a `V`.
    pub fn remove<V: Any>(&mut self, key: &[u8]) -> Result<V, StoreError> {
        let boxed = self
            .entries
            .remove(key)
            .ok_or_else(|| StoreError::NotFound {
                key: hex_key(key),
            })?;
        match boxed.downcast::<V>() {
            Ok(value) => Ok(*value),
            Err(original) => {
                // Wrong type requested: restore the entry untouched.
                self.entries.insert(key.to_vec(), original);
                Err(StoreError::TypeMismatch { key: hex_key(key) })
            }
        }
    }
}
