//! State change overlay.
//!
//! Holds at most one pending operation per state name for the current turn.
//! Staging a new operation for a name already present replaces the old one
//! in place, so iteration order is the order names were first touched. That
//! order is the order of the committed batch.

use std::collections::HashMap;

use actorstate_core::{is_expired, PendingOperation, Timestamp};

/// Ordered map from state name to its pending operation.
#[derive(Debug, Default, Clone)]
pub struct StateChangeTracker {
    slots: Vec<PendingOperation>,
    index: HashMap<String, usize>,
}

impl StateChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PendingOperation> {
        self.index.get(name).and_then(|&slot| self.slots.get(slot))
    }

    /// What the overlay alone says about `name`.
    ///
    /// `Some(true)` for a live pending Add/Update, `Some(false)` for a pending
    /// Remove or a staged value whose expiry has passed, `None` when the
    /// overlay has nothing to say and the cache must be asked.
    pub fn presence(&self, name: &str, now: Timestamp) -> Option<bool> {
        self.get(name).map(|op| match op.staged() {
            Some(staged) => !is_expired(staged.expires_at, now),
            None => false,
        })
    }

    /// Stage `operation`, replacing any pending operation for the same name.
    /// Returns the replaced operation.
    pub fn stage(&mut self, operation: PendingOperation) -> Option<PendingOperation> {
        match self.index.get(&operation.name) {
            Some(&slot) => Some(std::mem::replace(&mut self.slots[slot], operation)),
            None => {
                self.index.insert(operation.name.clone(), self.slots.len());
                self.slots.push(operation);
                None
            }
        }
    }

    /// Pending operations in first-touched order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.slots.iter()
    }

    /// Names with a pending Add or Update, in first-touched order.
    pub fn staged_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|op| !op.is_remove())
            .map(|op| op.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }
}
