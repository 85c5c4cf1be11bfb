//! Character engine for the Emberfall RPG.
//!
//! This crate provides:
//! - Inventory and equipment handling with fixed slots and enchantments
//! - A status-effect system with stacking, immunity, and counter rules
//! - Elemental affinities and player elemental choices
//! - Effective-stat resolution from base attributes, gear, effects, and
//!   skills
//! - Pluggable persistence via `CharacterStore`
//!
//! # Quick Start
//!
//! ```ignore
//! use emberfall_core::{Character, CharacterEngine, MemoryStore};
//!
//! let store = Box::new(MemoryStore::new());
//! let engine = CharacterEngine::builtin(store);
//!
//! let mut hero = Character::builder("Maren")
//!     .weapon_skill("sword", "sword_beginner")
//!     .item("iron_sword", 1)
//!     .build();
//!
//! engine.equip_item(&mut hero, "iron_sword", None)?;
//! let stats = engine.get_effective_stats(&hero);
//! ```

pub mod catalog;
pub mod character;
pub mod elements;
pub mod engine;
pub mod items;
pub mod persist;
pub mod skills;
pub mod stats;
pub mod status;
pub mod testing;

// Primary public API
pub use catalog::ContentCatalog;
pub use character::{Character, CharacterBuilder, CharacterId, EquipSlot, Inventory, Stat, Stats};
pub use elements::{Element, ElementalChoice};
pub use engine::{CharacterEngine, EngineError, EngineResult, ErrorKind};
pub use items::{ConsumableEffectKind, ItemDefinition, ItemEffect, ItemType};
pub use persist::{CharacterStore, MemoryStore, NullStore, PersistError, SavedCharacter};
pub use skills::{CatalogSkillBonuses, NoSkillBonuses, SkillBonusProvider, SkillDefinition};
pub use status::{
    ApplicationVerdict, StatusEffectInstance, StatusEffectKind, StatusEffectManager,
    StatusEffectTemplate, PERMANENT_DURATION,
};
