//! Status effects: templates, live instances, and the application rules.
//!
//! Templates are immutable content; an instance is an owned copy attached
//! to a character with its own remaining duration, potency, and source
//! tags. The `StatusEffectManager` answers the pure questions — can this
//! stack, what blocks it, what counters it — and leaves the decision to
//! callers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::ContentCatalog;
use crate::character::{Character, Stat};
use crate::elements::Element;

/// Durations of 999 turns never realistically expire; equipment-derived
/// effects are re-applied at this duration on every recompute.
pub const PERMANENT_DURATION: i32 = 999;

/// Status-effect categories.
///
/// The poison/bleeding/curse/weakness kinds exist for the cleanse and cure
/// consumable paths; they have no per-turn mechanic of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusEffectKind {
    DamageOverTime,
    HealOverTime,
    Control,
    StatDebuff,
    StatBuff,
    Protection,
    ElementalResistance,
    ElementalWeakness,
    Aura,
    Special,
    Enchantment,
    Movement,
    ArmorDestruction,
    Poison,
    Bleeding,
    Curse,
    Weakness,
}

/// An immutable status-effect template from the content tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEffectTemplate {
    pub id: String,
    pub name: String,
    pub kind: StatusEffectKind,
    pub duration: i32,
    pub potency: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stat_modifiers: BTreeMap<Stat, i32>,
    #[serde(default)]
    pub stackable: bool,
    /// Effect ids this effect blocks while it is active.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub immunities: Vec<String>,
}

impl StatusEffectTemplate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: StatusEffectKind,
        duration: i32,
        potency: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            duration,
            potency,
            stat_modifiers: BTreeMap::new(),
            stackable: false,
            immunities: Vec::new(),
        }
    }

    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }

    pub fn with_stat_modifier(mut self, stat: Stat, delta: i32) -> Self {
        self.stat_modifiers.insert(stat, delta);
        self
    }

    pub fn with_immunity(mut self, effect_id: impl Into<String>) -> Self {
        self.immunities.push(effect_id.into());
        self
    }
}

/// A live status effect on a character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEffectInstance {
    pub id: String,
    pub name: String,
    pub kind: StatusEffectKind,
    pub duration: i32,
    pub potency: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stat_modifiers: BTreeMap<Stat, i32>,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub immunities: Vec<String>,
    /// Origin tags, e.g. `["equipment", "armor"]`; used to strip effects
    /// selectively when their source goes away.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
    pub applied_at: u64,
}

impl StatusEffectInstance {
    /// Instantiate a template, applying overrides where given.
    pub fn from_template(
        template: &StatusEffectTemplate,
        duration_override: Option<i32>,
        potency_override: Option<i32>,
    ) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            kind: template.kind,
            duration: duration_override.unwrap_or(template.duration),
            potency: potency_override.unwrap_or(template.potency),
            stat_modifiers: template.stat_modifiers.clone(),
            stackable: template.stackable,
            immunities: template.immunities.clone(),
            source: Vec::new(),
            applied_at: unix_now(),
        }
    }

    pub fn with_source(mut self, source: Vec<String>) -> Self {
        self.source = source;
        self
    }

    pub fn has_source_tag(&self, tag: &str) -> bool {
        self.source.iter().any(|t| t == tag)
    }

    pub fn is_permanent(&self) -> bool {
        self.duration >= PERMANENT_DURATION
    }
}

/// Why an application attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationVerdict {
    Allowed,
    /// An active effect's immunity list blocks this id.
    BlockedByImmunity { granted_by: String },
    /// The effect does not stack and is already present.
    AlreadyActive,
}

impl ApplicationVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, ApplicationVerdict::Allowed)
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            ApplicationVerdict::Allowed => None,
            ApplicationVerdict::BlockedByImmunity { granted_by } => {
                Some(format!("blocked by immunity from {granted_by}"))
            }
            ApplicationVerdict::AlreadyActive => {
                Some("effect is already active and does not stack".to_string())
            }
        }
    }
}

/// Pure application rules over the status-effect catalog.
///
/// The verdicts are advisory: `CharacterEngine::add_status_effect` applies
/// unconditionally (replacing non-stackable duplicates), and callers that
/// want immunity semantics consult `validate_application` first.
#[derive(Clone)]
pub struct StatusEffectManager {
    catalog: Arc<ContentCatalog>,
}

impl StatusEffectManager {
    pub fn new(catalog: Arc<ContentCatalog>) -> Self {
        Self { catalog }
    }

    /// Instantiate a catalog template with optional overrides. `None` when
    /// the id is unknown.
    pub fn create_instance(
        &self,
        effect_id: &str,
        duration_override: Option<i32>,
        potency_override: Option<i32>,
    ) -> Option<StatusEffectInstance> {
        self.catalog
            .find_status_effect_by_id(effect_id)
            .map(|template| {
                StatusEffectInstance::from_template(template, duration_override, potency_override)
            })
    }

    /// Whether instances of this effect stack. Unknown ids do not stack.
    pub fn can_stack(&self, effect_id: &str) -> bool {
        self.catalog
            .find_status_effect_by_id(effect_id)
            .map(|t| t.stackable)
            .unwrap_or(false)
    }

    /// Effect ids this effect blocks while active. Empty for unknown ids.
    pub fn get_immunities(&self, effect_id: &str) -> HashSet<String> {
        self.catalog
            .find_status_effect_by_id(effect_id)
            .map(|t| t.immunities.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Check whether applying `effect_id` to the character would be blocked
    /// by an active immunity or by non-stackable duplication.
    pub fn validate_application(
        &self,
        character: &Character,
        effect_id: &str,
    ) -> ApplicationVerdict {
        for active in &character.status_effects {
            if active.immunities.iter().any(|id| id == effect_id) {
                return ApplicationVerdict::BlockedByImmunity {
                    granted_by: active.id.clone(),
                };
            }
        }
        if !self.can_stack(effect_id) && character.has_status_effect(effect_id) {
            return ApplicationVerdict::AlreadyActive;
        }
        ApplicationVerdict::Allowed
    }

    /// Effects that would logically cancel this one. Informational only;
    /// nothing cancels automatically.
    pub fn get_counter_effects(&self, effect_id: &str) -> &'static [&'static str] {
        counter_effects(effect_id)
    }
}

/// Static counter-effect table.
pub fn counter_effects(effect_id: &str) -> &'static [&'static str] {
    match effect_id {
        "burn" => &["frost_guard"],
        "poison" => &["poison_ward"],
        "bleed" => &["health_regen"],
        "weakness" => &["strength_boost"],
        "slow" => &["speed_boost"],
        "armor_break" => &["iron_skin"],
        "curse" => &["cleansing_light"],
        _ => &[],
    }
}

pub(crate) fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ============================================================================
// Built-in status-effect database
// ============================================================================

lazy_static::lazy_static! {
    /// The built-in status-effect content table, keyed by id.
    pub static ref STATUS_EFFECTS: HashMap<String, StatusEffectTemplate> = builtin_status_effects();
}

/// Look up a built-in status-effect template by id.
pub fn get_status_effect(id: &str) -> Option<StatusEffectTemplate> {
    STATUS_EFFECTS.get(id).cloned()
}

fn builtin_status_effects() -> HashMap<String, StatusEffectTemplate> {
    let mut templates = vec![
        // Ailments
        StatusEffectTemplate::new("burn", "Burn", StatusEffectKind::DamageOverTime, 4, 1),
        StatusEffectTemplate::new("poison", "Poison", StatusEffectKind::Poison, 5, 2)
            .with_stat_modifier(Stat::Strength, -2),
        StatusEffectTemplate::new("bleed", "Bleed", StatusEffectKind::Bleeding, 3, 1),
        StatusEffectTemplate::new("curse", "Curse", StatusEffectKind::Curse, PERMANENT_DURATION, 1)
            .with_stat_modifier(Stat::Accuracy, -5)
            .with_stat_modifier(Stat::MagicalDefence, -5),
        StatusEffectTemplate::new("weakness", "Weakness", StatusEffectKind::Weakness, 5, 1)
            .with_stat_modifier(Stat::Strength, -3),
        StatusEffectTemplate::new("stun", "Stun", StatusEffectKind::Control, 1, 1),
        StatusEffectTemplate::new("slow", "Slow", StatusEffectKind::Movement, 3, 1)
            .with_stat_modifier(Stat::Speed, -2),
        StatusEffectTemplate::new(
            "armor_break",
            "Armor Break",
            StatusEffectKind::ArmorDestruction,
            5,
            1,
        )
        .with_stat_modifier(Stat::PhysicalDefence, -5),

        // Recovery and buffs
        StatusEffectTemplate::new("health_regen", "Regeneration", StatusEffectKind::HealOverTime, 5, 2),
        StatusEffectTemplate::new("strength_boost", "Strength Boost", StatusEffectKind::StatBuff, 10, 5)
            .with_stat_modifier(Stat::Strength, 5),
        StatusEffectTemplate::new("magic_boost", "Magic Boost", StatusEffectKind::StatBuff, 10, 5)
            .with_stat_modifier(Stat::MagicPower, 5),
        StatusEffectTemplate::new("speed_boost", "Speed Boost", StatusEffectKind::StatBuff, 10, 3)
            .with_stat_modifier(Stat::Speed, 3),
        StatusEffectTemplate::new("iron_skin", "Iron Skin", StatusEffectKind::StatBuff, 10, 4)
            .with_stat_modifier(Stat::PhysicalDefence, 4),
        StatusEffectTemplate::new("arcane_ward", "Arcane Ward", StatusEffectKind::StatBuff, 10, 4)
            .with_stat_modifier(Stat::MagicalDefence, 4),
        StatusEffectTemplate::new("focus", "Focus", StatusEffectKind::StatBuff, 10, 4)
            .with_stat_modifier(Stat::Accuracy, 4),
        StatusEffectTemplate::new("stamina_boost", "Stamina Boost", StatusEffectKind::StatBuff, 10, 5)
            .with_stat_modifier(Stat::Stamina, 5),
        StatusEffectTemplate::new("stealth_mastery", "Stealth Mastery", StatusEffectKind::Special, 10, 1),

        // Equipment-granted
        StatusEffectTemplate::new(
            "night_vision",
            "Night Vision",
            StatusEffectKind::Special,
            PERMANENT_DURATION,
            1,
        ),
        StatusEffectTemplate::new(
            "thorns_aura",
            "Thorns Aura",
            StatusEffectKind::Aura,
            PERMANENT_DURATION,
            1,
        ),
        StatusEffectTemplate::new(
            "frost_guard",
            "Frost Guard",
            StatusEffectKind::Protection,
            PERMANENT_DURATION,
            1,
        )
        .with_immunity("burn"),
        StatusEffectTemplate::new(
            "poison_ward",
            "Poison Ward",
            StatusEffectKind::Protection,
            PERMANENT_DURATION,
            1,
        )
        .with_immunity("poison"),
        StatusEffectTemplate::new(
            "cleansing_light",
            "Cleansing Light",
            StatusEffectKind::Protection,
            PERMANENT_DURATION,
            1,
        )
        .with_immunity("curse"),
    ];

    // One resistance/weakness pair per element. Stackable: accumulated
    // equipment affinities and elemental choices coexist per element.
    for element in Element::all() {
        templates.push(
            StatusEffectTemplate::new(
                element.resistance_effect_id(),
                format!("{} Resistance", element.name()),
                StatusEffectKind::ElementalResistance,
                PERMANENT_DURATION,
                1,
            )
            .stackable(),
        );
        templates.push(
            StatusEffectTemplate::new(
                element.weakness_effect_id(),
                format!("{} Weakness", element.name()),
                StatusEffectKind::ElementalWeakness,
                PERMANENT_DURATION,
                1,
            )
            .stackable(),
        );
    }

    templates.into_iter().map(|t| (t.id.clone(), t)).collect()
}
