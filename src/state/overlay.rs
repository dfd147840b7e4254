//! Ordered stack of optimistic overrides.

use crate::types::RecordMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pure transformation from a mirror snapshot to an overlaid snapshot.
pub type Override = Arc<dyn Fn(&RecordMap) -> RecordMap + Send + Sync>;

/// Identity of one pushed override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlayToken(pub u64);

/// Overrides in push order.
///
/// Entries are removed by token, never by position: concurrent updates
/// settle in any order and shift each other's indices.
#[derive(Clone)]
pub struct OverlayStack {
    entries: Vec<(OverlayToken, Override)>,
    next_token: u64,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_token: 1,
        }
    }

    /// Push an override on top and return its token.
    pub fn push(&mut self, apply: Override) -> OverlayToken {
        let token = OverlayToken(self.next_token);
        self.next_token += 1;
        self.entries.push((token, apply));
        token
    }

    /// Remove the override with `token`. Returns false if it was not present.
    pub fn remove(&mut self, token: OverlayToken) -> bool {
        match self.entries.iter().position(|(t, _)| *t == token) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tokens in push order.
    pub fn tokens(&self) -> Vec<OverlayToken> {
        self.entries.iter().map(|(t, _)| *t).collect()
    }

    /// Fold `mirror` through every override in push order.
    pub fn compose(&self, mirror: &RecordMap) -> RecordMap {
        self.entries
            .iter()
            .fold(mirror.clone(), |records, (_, apply)| apply(&records))
    }
}

impl Default for OverlayStack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OverlayStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayStack")
            .field("tokens", &self.tokens())
            .finish()
    }
}
