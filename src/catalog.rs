//! Read-only content lookups for items, status effects, and skills.
//!
//! The engine never reaches into the static tables directly; it holds a
//! `ContentCatalog` handed to it at construction, so tests and embedders
//! can substitute their own content.

use std::collections::HashMap;

use crate::items::{self, ItemDefinition};
use crate::skills::{self, SkillDefinition};
use crate::status::{self, StatusEffectTemplate};

/// Immutable content tables, keyed by id.
pub struct ContentCatalog {
    items: HashMap<String, ItemDefinition>,
    status_effects: HashMap<String, StatusEffectTemplate>,
    skills: HashMap<String, SkillDefinition>,
}

impl ContentCatalog {
    pub fn new(
        items: Vec<ItemDefinition>,
        status_effects: Vec<StatusEffectTemplate>,
        skills: Vec<SkillDefinition>,
    ) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
            status_effects: status_effects
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect(),
            skills: skills.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    /// Catalog seeded from the built-in content tables.
    pub fn builtin() -> Self {
        Self {
            items: items::ITEMS
                .iter()
                .map(|i| (i.id.clone(), i.clone()))
                .collect(),
            status_effects: status::STATUS_EFFECTS.clone(),
            skills: skills::SKILLS
                .iter()
                .map(|s| (s.id.clone(), s.clone()))
                .collect(),
        }
    }

    pub fn find_item_by_id(&self, id: &str) -> Option<&ItemDefinition> {
        self.items.get(id)
    }

    pub fn find_status_effect_by_id(&self, id: &str) -> Option<&StatusEffectTemplate> {
        self.status_effects.get(id)
    }

    pub fn find_skill_by_id(&self, id: &str) -> Option<&SkillDefinition> {
        self.skills.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_lookups() {
        let catalog = ContentCatalog::builtin();
        assert!(catalog.find_item_by_id("iron_sword").is_some());
        assert!(catalog.find_status_effect_by_id("burn").is_some());
        assert!(catalog.find_skill_by_id("sword_beginner").is_some());

        assert!(catalog.find_item_by_id("nope").is_none());
        assert!(catalog.find_status_effect_by_id("nope").is_none());
        assert!(catalog.find_skill_by_id("nope").is_none());
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = ContentCatalog::new(
            vec![crate::items::ItemDefinition::new(
                "test_rock",
                "Test Rock",
                crate::items::ItemType::Material,
            )],
            vec![],
            vec![],
        );
        assert!(catalog.find_item_by_id("test_rock").is_some());
        assert!(catalog.find_item_by_id("iron_sword").is_none());
    }
}
