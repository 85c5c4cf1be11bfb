//! Testing utilities for the character engine.
//!
//! Provides deterministic sample characters and a `RecordingStore` that
//! captures every persisted snapshot, so tests can assert both what changed
//! and that it was saved.

use std::sync::Mutex;

use crate::character::Character;
use crate::persist::CharacterStore;

/// A bare character with the default attribute spread, no items, and no
/// unlocked skills.
pub fn sample_character(name: &str) -> Character {
    Character::builder(name).build()
}

/// A character ready for weapon tests: sword and dagger proficiencies,
/// dual wield, and a small starting kit.
pub fn sample_adventurer(name: &str) -> Character {
    Character::builder(name)
        .weapon_skill("sword", "sword_beginner")
        .weapon_skill("dagger", "dagger_beginner")
        .weapon_skill("dagger", "dual_wield")
        .item("iron_sword", 1)
        .item("steel_dagger", 1)
        .item("healing_herb", 2)
        .build()
}

/// A store that records every snapshot it is handed.
#[derive(Default)]
pub struct RecordingStore {
    snapshots: Mutex<Vec<Character>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persists seen so far.
    pub fn count(&self) -> usize {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The most recently persisted snapshot.
    pub fn last(&self) -> Option<Character> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl CharacterStore for RecordingStore {
    fn persist(&self, character: &Character) {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(character.clone());
    }
}
