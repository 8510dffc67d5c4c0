//! Durable storage for location assignments
//!
//! Bridges [`AssignmentState`] to a string-keyed storage device under a
//! fixed key (LocalStorage in the browser). The whole snapshot is written
//! on every change; expected data volumes are a handful of user-curated
//! locations, so there is no diffing or batching.
//!
//! Tabs sharing the same storage key race last-writer-wins; no
//! cross-context locking is provided.

use thiserror::Error;

use crate::assignments::AssignmentState;

/// LocalStorage key for the persisted snapshot.
pub const STORAGE_KEY: &str = "rm-location-assignments";

/// Failures from [`PersistenceBinding::save`].
///
/// Neither variant is fatal: the in-memory store stays authoritative for
/// the session even when durability failed.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode assignments: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage rejected write: {0}")]
    Write(String),
}

/// An opaque string-keyed storage device.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove(&mut self, key: &str);
}

impl KeyValueStore for Box<dyn KeyValueStore> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) {
        (**self).remove(key)
    }
}

/// In-memory device for the native target and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Browser LocalStorage device (WASM only).
#[cfg(target_arch = "wasm32")]
pub struct LocalStorage {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    /// Returns `None` when the browser exposes no LocalStorage
    /// (disabled storage, sandboxed context).
    pub fn new() -> Option<Self> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()?;
        Some(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        // set_item fails on quota exceeded or disabled storage
        self.storage
            .set_item(key, value)
            .map_err(|err| PersistError::Write(format!("{err:?}")))
    }

    fn remove(&mut self, key: &str) {
        let _ = self.storage.remove_item(key);
    }
}

/// Loads the snapshot at startup and writes it back after every mutation.
pub struct PersistenceBinding<S: KeyValueStore> {
    device: S,
    key: String,
}

impl<S: KeyValueStore> PersistenceBinding<S> {
    pub fn new(device: S) -> Self {
        Self::with_key(device, STORAGE_KEY)
    }

    pub fn with_key(device: S, key: impl Into<String>) -> Self {
        Self {
            device,
            key: key.into(),
        }
    }

    /// Read the stored snapshot.
    ///
    /// Absent, undecodable, or inconsistent data falls back to the empty
    /// state with a logged warning; startup never fails on bad storage.
    pub fn load(&self) -> AssignmentState {
        let Some(raw) = self.device.get(&self.key) else {
            log::info!("No saved assignments, starting empty");
            return AssignmentState::default();
        };

        match serde_json::from_str::<AssignmentState>(&raw) {
            Ok(state) if state.is_consistent() => {
                log::info!(
                    "Loaded {} locations ({} residents)",
                    state.locations.len(),
                    state.resident_count()
                );
                state
            }
            Ok(_) => {
                log::warn!("Stored assignments are inconsistent, starting empty");
                AssignmentState::default()
            }
            Err(err) => {
                log::warn!("Failed to decode stored assignments: {err}");
                AssignmentState::default()
            }
        }
    }

    /// Write the full snapshot under the fixed key.
    pub fn save(&mut self, state: &AssignmentState) -> Result<(), PersistError> {
        let json = serde_json::to_string(state)?;
        self.device.set(&self.key, &json)
    }
}
