//! Species/location identity.
//!
//! All per-entity state (baselines, windows) is partitioned by a
//! `(species, location)` pair. Equality and hashing are on the pair; the
//! `species_location` rendering is for display and logging only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite key: one baseline and one window series per value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesKey {
    /// Common species name (e.g. "Mourning Dove").
    pub species: String,
    /// Location, typically a county.
    pub location: String,
}

impl SpeciesKey {
    /// Create a key from its parts.
    pub fn new(species: impl Into<String>, location: impl Into<String>) -> Self {
        SpeciesKey {
            species: species.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for SpeciesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.species, self.location)
    }
}
