//! Process-local match store.
//!
//! Concurrently readable; writes to a given match are serialized by that
//! match's scheduler task, which is the sole writer.

use dashmap::DashMap;
use std::fmt;

use crate::game::types::{MatchId, MatchState};

#[derive(Debug, PartialEq, Eq)]
pub enum StoreError {
    AlreadyExists,
    NotFound,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AlreadyExists => f.write_str("match already exists"),
            StoreError::NotFound => f.write_str("match not found"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Default)]
pub struct MatchStore {
    matches: DashMap<MatchId, MatchState>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, state: MatchState) -> Result<(), StoreError> {
        use dashmap::mapref::entry::Entry;
        match self.matches.entry(state.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(state);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &MatchId) -> Result<MatchState, StoreError> {
        self.matches
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    pub fn update(&self, state: MatchState) -> Result<(), StoreError> {
        match self.matches.get_mut(&state.id) {
            Some(mut entry) => {
                *entry.value_mut() = state;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    pub fn delete(&self, id: &MatchId) -> Result<(), StoreError> {
        self.matches
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    pub fn list(&self) -> Vec<MatchId> {
        self.matches.iter().map(|e| e.key().clone()).collect()
    }

    pub fn contains(&self, id: &MatchId) -> bool {
        self.matches.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
