//! Run-scoped typed session store.
//!
//! A [`Key<T>`] binds a string name to a value type at compile time, so
//! `get`/`set` calls can't be mismatched between a `String` key and a
//! `u64` value. The underlying map is a plain
//! `HashMap<&str, serde_json::Value>` guarded by the
//! single-threaded-per-run execution model of the graph runtime: at most
//! one node body runs at a time within one run, so the map itself needs
//! no locking.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EngineError;

/// A phantom-typed key: `name` identifies the slot, `T` is the value type
/// that `get`/`set` will (de)serialize through.
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Key { name, _marker: PhantomData }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

// Manual impls: `#[derive(Clone, Copy)]` would require `T: Clone`/`Copy`,
// but the phantom marker never actually holds a `T`.
impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Key<T> {}

/// A per-run typed key→value map. Created when a run starts, dropped when
/// it completes; never shared across runs.
#[derive(Default)]
pub struct SessionStore {
    values: HashMap<&'static str, serde_json::Value>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a value. A missing key yields `Ok(None)` ("absent"), never an
    /// error; a present key whose stored JSON does not match `T` yields
    /// `SessionTypeMismatch`.
    pub fn get<T: DeserializeOwned>(&self, key: Key<T>) -> Result<Option<T>, EngineError> {
        match self.values.get(key.name()) {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|_| EngineError::SessionTypeMismatch(key.name().to_string())),
        }
    }

    /// Like [`get`](Self::get) but returns `MissingSessionKey` instead of
    /// `None` when absent; for required values where absence is a
    /// programmer error (engine-invariant violation per the error taxonomy).
    pub fn require<T: DeserializeOwned>(&self, key: Key<T>) -> Result<T, EngineError> {
        self.get(key)?
            .ok_or_else(|| EngineError::MissingSessionKey(key.name().to_string()))
    }

    pub fn set<T: Serialize>(&mut self, key: Key<T>, value: &T) {
        let raw = serde_json::to_value(value).expect("session values must be JSON-serializable");
        self.values.insert(key.name(), raw);
    }

    pub fn has<T>(&self, key: Key<T>) -> bool {
        self.values.contains_key(key.name())
    }
}

/// A cloneable handle to one run's [`SessionStore`], so node bodies built
/// as closures can each capture the store of the run they belong to (the
/// "node bodies are closures over the session store" re-architecture
/// note). The inner mutex is uncontended under the single-threaded-per-run
/// execution model; it exists only to satisfy `Send + Sync` for the node
/// trait objects, and no lock is ever held across an await point.
#[derive(Clone, Default)]
pub struct SharedSession {
    inner: std::sync::Arc<std::sync::Mutex<SessionStore>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: Key<T>) -> Result<Option<T>, EngineError> {
        self.inner.lock().expect("session mutex poisoned").get(key)
    }

    pub fn require<T: DeserializeOwned>(&self, key: Key<T>) -> Result<T, EngineError> {
        self.inner.lock().expect("session mutex poisoned").require(key)
    }

    pub fn set<T: Serialize>(&self, key: Key<T>, value: &T) {
        self.inner.lock().expect("session mutex poisoned").set(key, value);
    }

    pub fn has<T>(&self, key: Key<T>) -> bool {
        self.inner.lock().expect("session mutex poisoned").has(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT: Key<u64> = Key::new("count");
    const NAME: Key<String> = Key::new("name");

    #[test]
    fn missing_key_is_absent_not_error() {
        let store = SessionStore::new();
        assert_eq!(store.get(COUNT).unwrap(), None);
        assert!(!store.has(COUNT));
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut store = SessionStore::new();
        store.set(COUNT, &7u64);
        assert_eq!(store.get(COUNT).unwrap(), Some(7));
        assert!(store.has(COUNT));
    }

    #[test]
    fn require_errors_on_missing_key() {
        let store = SessionStore::new();
        let err = store.require(NAME).unwrap_err();
        assert!(matches!(err, EngineError::MissingSessionKey(_)));
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let mut store = SessionStore::new();
        store.set(COUNT, &1u64);
        store.set(NAME, &"alice".to_string());
        assert_eq!(store.get(COUNT).unwrap(), Some(1));
        assert_eq!(store.get(NAME).unwrap(), Some("alice".to_string()));
    }

    #[test]
    fn shared_session_clones_see_the_same_values() {
        let session = SharedSession::new();
        let other = session.clone();
        session.set(COUNT, &3u64);
        assert_eq!(other.get(COUNT).unwrap(), Some(3));
        assert!(other.has(COUNT));
    }
}
