//! Bidirectional label ↔ identity mapping.
//!
//! Classifiers speak in dense integer labels; everything else speaks in
//! identity names. A `LabelMap` is rebuilt fresh on every training run and
//! travels with the model it was built for.

use muster_store::Identity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Explicit two-way map between dense labels (0..K-1) and identities.
///
/// Labels are assigned in first-seen order. The serialized form is the
/// label-ordered identity list; both directions are rebuilt on load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Identity>", into = "Vec<Identity>")]
pub struct LabelMap {
    by_label: Vec<Identity>,
    by_identity: HashMap<Identity, u32>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label for `identity`, assigning the next dense label on first sight.
    pub fn assign(&mut self, identity: &Identity) -> u32 {
        if let Some(&label) = self.by_identity.get(identity) {
            return label;
        }
        let label = self.by_label.len() as u32;
        self.by_label.push(identity.clone());
        self.by_identity.insert(identity.clone(), label);
        label
    }

    pub fn label_of(&self, identity: &Identity) -> Option<u32> {
        self.by_identity.get(identity).copied()
    }

    pub fn identity_of(&self, label: u32) -> Option<&Identity> {
        self.by_label.get(label as usize)
    }

    /// Number of mapped identities.
    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// (label, identity) pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Identity)> {
        self.by_label
            .iter()
            .enumerate()
            .map(|(label, identity)| (label as u32, identity))
    }
}

impl From<Vec<Identity>> for LabelMap {
    fn from(by_label: Vec<Identity>) -> Self {
        let by_identity = by_label
            .iter()
            .enumerate()
            .map(|(label, identity)| (identity.clone(), label as u32))
            .collect();
        Self {
            by_label,
            by_identity,
        }
    }
}

impl From<LabelMap> for Vec<Identity> {
    fn from(map: LabelMap) -> Self {
        map.by_label
    }
}
