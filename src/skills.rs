//! Skill definitions, weapon proficiencies, and skill-derived stat bonuses.
//!
//! Numeric bonuses live in the structured `stat_modifiers` field of each
//! skill definition — the description string is display text only and is
//! never parsed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::ContentCatalog;
use crate::character::{Character, Stat, Stats};

/// The dagger-tree skill that unlocks the secondary weapon slot.
pub const DUAL_WIELD_SKILL: &str = "dual_wield";
/// The tree that `dual_wield` lives in.
pub const DUAL_WIELD_TREE: &str = "dagger";

/// An immutable skill definition from the content tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDefinition {
    pub id: String,
    pub name: String,
    /// Skill-tree category key, e.g. `sword`, `dagger`, `ranged`.
    pub category: String,
    pub tier: u8,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stat_modifiers: BTreeMap<Stat, i32>,
    #[serde(default)]
    pub description: String,
}

impl SkillDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        tier: u8,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            tier,
            stat_modifiers: BTreeMap::new(),
            description: String::new(),
        }
    }

    pub fn with_stat_modifier(mut self, stat: Stat, delta: i32) -> Self {
        self.stat_modifiers.insert(stat, delta);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The skills a character has unlocked, grouped by skill tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnlockedSkills {
    /// Weapon trees: category key → unlocked skill ids.
    pub weapons: BTreeMap<String, Vec<String>>,
}

impl UnlockedSkills {
    pub fn unlock_weapon_skill(&mut self, tree: &str, skill_id: &str) {
        let skills = self.weapons.entry(tree.to_string()).or_default();
        if !skills.iter().any(|s| s == skill_id) {
            skills.push(skill_id.to_string());
        }
    }

    pub fn has_weapon_skill(&self, tree: &str, skill_id: &str) -> bool {
        self.weapons
            .get(tree)
            .map(|skills| skills.iter().any(|s| s == skill_id))
            .unwrap_or(false)
    }

    /// Dual wielding is unlocked through the dagger tree.
    pub fn has_dual_wield(&self) -> bool {
        self.has_weapon_skill(DUAL_WIELD_TREE, DUAL_WIELD_SKILL)
    }

    pub fn all_skill_ids(&self) -> impl Iterator<Item = &String> {
        self.weapons.values().flatten()
    }
}

/// A weapon subcategory's equip requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponProficiency {
    pub subcategory: &'static str,
    pub required_skill: &'static str,
    /// Skill-tree category key the requirement is checked against.
    pub tree: &'static str,
}

/// Tier-0 proficiency requirements per weapon subcategory. Subcategories
/// not listed here have no requirement.
pub const WEAPON_PROFICIENCIES: &[WeaponProficiency] = &[
    WeaponProficiency { subcategory: "swords", required_skill: "sword_beginner", tree: "sword" },
    WeaponProficiency { subcategory: "bows", required_skill: "bow_beginner", tree: "ranged" },
    WeaponProficiency { subcategory: "axes", required_skill: "axe_beginner", tree: "axe" },
    WeaponProficiency { subcategory: "staves", required_skill: "staff_beginner", tree: "staff" },
    WeaponProficiency { subcategory: "daggers", required_skill: "dagger_beginner", tree: "dagger" },
    WeaponProficiency { subcategory: "polearms", required_skill: "polearm_beginner", tree: "polearm" },
    WeaponProficiency { subcategory: "hammers", required_skill: "hammer_beginner", tree: "hammer" },
];

/// The proficiency requirement for a weapon subcategory, if one exists.
pub fn proficiency_for(subcategory: &str) -> Option<&'static WeaponProficiency> {
    WEAPON_PROFICIENCIES
        .iter()
        .find(|p| p.subcategory == subcategory)
}

/// Supplies skill-derived stat bonuses for a character. Injected into the
/// engine; the max-HP/Stamina recompute and the effective-stat resolution
/// both fold its output in.
pub trait SkillBonusProvider: Send + Sync {
    fn stat_bonuses(&self, character: &Character) -> Stats;
}

/// Provider that grants nothing. Useful when no skill system is wired up.
pub struct NoSkillBonuses;

impl SkillBonusProvider for NoSkillBonuses {
    fn stat_bonuses(&self, _character: &Character) -> Stats {
        Stats::zero()
    }
}

/// Sums the structured `stat_modifiers` of every unlocked skill found in
/// the catalog. Unknown skill ids contribute nothing.
pub struct CatalogSkillBonuses {
    catalog: Arc<ContentCatalog>,
}

impl CatalogSkillBonuses {
    pub fn new(catalog: Arc<ContentCatalog>) -> Self {
        Self { catalog }
    }
}

impl SkillBonusProvider for CatalogSkillBonuses {
    fn stat_bonuses(&self, character: &Character) -> Stats {
        let mut bonuses = Stats::zero();
        for skill_id in character.unlocked_skills.all_skill_ids() {
            if let Some(skill) = self.catalog.find_skill_by_id(skill_id) {
                for (&stat, &delta) in &skill.stat_modifiers {
                    bonuses.add(stat, delta);
                }
            }
        }
        bonuses
    }
}

// ============================================================================
// Built-in skill database
// ============================================================================

lazy_static::lazy_static! {
    /// The built-in skill content table.
    pub static ref SKILLS: Vec<SkillDefinition> = builtin_skills();
}

/// Look up a built-in skill definition by id.
pub fn get_skill(id: &str) -> Option<SkillDefinition> {
    SKILLS.iter().find(|skill| skill.id == id).cloned()
}

fn builtin_skills() -> Vec<SkillDefinition> {
    vec![
        SkillDefinition::new("sword_beginner", "Sword Basics", "sword", 0)
            .with_description("Handle one-handed swords."),
        SkillDefinition::new("bow_beginner", "Bow Basics", "ranged", 0)
            .with_description("Handle bows."),
        SkillDefinition::new("axe_beginner", "Axe Basics", "axe", 0)
            .with_description("Handle axes."),
        SkillDefinition::new("staff_beginner", "Staff Basics", "staff", 0)
            .with_description("Handle staves."),
        SkillDefinition::new("dagger_beginner", "Dagger Basics", "dagger", 0)
            .with_description("Handle daggers."),
        SkillDefinition::new("polearm_beginner", "Polearm Basics", "polearm", 0)
            .with_description("Handle polearms."),
        SkillDefinition::new("hammer_beginner", "Hammer Basics", "hammer", 0)
            .with_description("Handle hammers."),
        SkillDefinition::new("dual_wield", "Dual Wield", "dagger", 1)
            .with_description("Fight with a weapon in each hand."),
        SkillDefinition::new("vital_training", "Vital Training", "sword", 1)
            .with_stat_modifier(Stat::Hp, 10)
            .with_description("Conditioning that toughens the body."),
        SkillDefinition::new("deep_lungs", "Deep Lungs", "ranged", 1)
            .with_stat_modifier(Stat::Stamina, 10)
            .with_description("Breathing control for long hunts."),
        SkillDefinition::new("keen_eye", "Keen Eye", "ranged", 1)
            .with_stat_modifier(Stat::Accuracy, 3)
            .with_description("Pick out the weak spot."),
    ]
}
