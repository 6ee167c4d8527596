//! Write journals, used to roll back failed transactions
//!
//! While a transaction is open every write records the value it replaced.
//! Rolling back replays those records newest first; committing drops them.
//! A transaction therefore costs what it writes, not what the ledger holds.

use std::collections::HashMap;
use std::hash::Hash;

/// Contract state the ledger can roll back
pub trait Revertible: Send + Sync {
    /// Start recording writes
    fn begin(&self);

    /// Keep every write made since `begin`
    fn commit(&self);

    /// Undo every write made since `begin`
    fn rollback(&self);
}

/// A map that can undo the writes made since [`JournaledMap::begin`]
#[derive(Debug, Clone)]
pub struct JournaledMap<K, V> {
    entries: HashMap<K, V>,
    undo: Option<Vec<(K, Option<V>)>>,
}

impl<K, V> Default for JournaledMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            undo: None,
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> JournaledMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert `value`, remembering the replaced value while recording
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.entries.insert(key.clone(), value);
        if let Some(undo) = self.undo.as_mut() {
            undo.push((key, previous.clone()));
        }
        previous
    }

    /// Update the value at `key` in place
    pub fn update<F>(&mut self, key: &K, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        let Some(current) = self.entries.get(key) else {
            return false;
        };
        let mut next = current.clone();
        f(&mut next);
        self.insert(key.clone(), next);
        true
    }

    /// Number of writes recorded in the open transaction
    pub fn pending(&self) -> usize {
        self.undo.as_ref().map_or(0, Vec::len)
    }

    pub fn begin(&mut self) {
        self.undo = Some(Vec::new());
    }

    pub fn commit(&mut self) {
        self.undo = None;
    }

    pub fn rollback(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        for (key, previous) in undo.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

/// A single value that can undo the writes made since [`Journaled::begin`]
#[derive(Debug, Clone, Default)]
pub struct Journaled<T> {
    value: T,
    recording: bool,
    saved: Option<T>,
}

impl<T: Clone> Journaled<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            recording: false,
            saved: None,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replace the value; the first write of a transaction saves the old one
    pub fn set(&mut self, value: T) {
        if self.recording && self.saved.is_none() {
            self.saved = Some(self.value.clone());
        }
        self.value = value;
    }

    pub fn begin(&mut self) {
        self.recording = true;
        self.saved = None;
    }

    pub fn commit(&mut self) {
        self.recording = false;
        self.saved = None;
    }

    pub fn rollback(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.value = saved;
        }
        self.recording = false;
    }
}
