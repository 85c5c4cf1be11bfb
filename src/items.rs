//! Item definitions and the built-in item database.
//!
//! Definitions are immutable content: the engine looks them up through a
//! `ContentCatalog` and copies them into equipment slots. The tables at the
//! bottom of this file seed `ContentCatalog::builtin` and the tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::character::Stat;
use crate::elements::{Element, ElementalChoice};

/// Item categories. Only weapons, armor, and accessories are equippable;
/// consumable-class items (see `is_consumable_class`) can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Weapon,
    Armor,
    Accessory,
    Consumable,
    Herb,
    Food,
    Material,
    Enchantment,
    KeyItem,
}

impl ItemType {
    /// Whether items of this type stack in the inventory by default.
    /// Equipment pieces are unique; everything else stacks.
    pub fn stacks_by_default(&self) -> bool {
        !matches!(self, ItemType::Weapon | ItemType::Armor | ItemType::Accessory)
    }
}

/// What happens when a consumable is used. Unknown kinds deserialize to
/// `Other` and are a deliberate no-op, matching how the shipped content
/// tables carry forward-compatible effect types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumableEffectKind {
    Heal,
    RestoreMana,
    RestoreStamina,
    HealthRegen,
    FullHealAndCleanse,
    TempStrength,
    TempMagic,
    TempSpeed,
    StatBoost,
    StatFood,
    CurePoison,
    StealthBoost,
    MagicalBarrier,
    MagicalShield,
    ElementalWeapon,
    Other,
}

impl ConsumableEffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumableEffectKind::Heal => "heal",
            ConsumableEffectKind::RestoreMana => "restore_mana",
            ConsumableEffectKind::RestoreStamina => "restore_stamina",
            ConsumableEffectKind::HealthRegen => "health_regen",
            ConsumableEffectKind::FullHealAndCleanse => "full_heal_and_cleanse",
            ConsumableEffectKind::TempStrength => "temp_strength",
            ConsumableEffectKind::TempMagic => "temp_magic",
            ConsumableEffectKind::TempSpeed => "temp_speed",
            ConsumableEffectKind::StatBoost => "stat_boost",
            ConsumableEffectKind::StatFood => "stat_food",
            ConsumableEffectKind::CurePoison => "cure_poison",
            ConsumableEffectKind::StealthBoost => "stealth_boost",
            ConsumableEffectKind::MagicalBarrier => "magical_barrier",
            ConsumableEffectKind::MagicalShield => "magical_shield",
            ConsumableEffectKind::ElementalWeapon => "elemental_weapon",
            ConsumableEffectKind::Other => "other",
        }
    }

    pub fn parse(kind: &str) -> Self {
        match kind {
            "heal" => ConsumableEffectKind::Heal,
            "restore_mana" => ConsumableEffectKind::RestoreMana,
            "restore_stamina" => ConsumableEffectKind::RestoreStamina,
            "health_regen" => ConsumableEffectKind::HealthRegen,
            "full_heal_and_cleanse" => ConsumableEffectKind::FullHealAndCleanse,
            "temp_strength" => ConsumableEffectKind::TempStrength,
            "temp_magic" => ConsumableEffectKind::TempMagic,
            "temp_speed" => ConsumableEffectKind::TempSpeed,
            "stat_boost" => ConsumableEffectKind::StatBoost,
            "stat_food" => ConsumableEffectKind::StatFood,
            "cure_poison" => ConsumableEffectKind::CurePoison,
            "stealth_boost" => ConsumableEffectKind::StealthBoost,
            "magical_barrier" => ConsumableEffectKind::MagicalBarrier,
            "magical_shield" => ConsumableEffectKind::MagicalShield,
            "elemental_weapon" => ConsumableEffectKind::ElementalWeapon,
            _ => ConsumableEffectKind::Other,
        }
    }
}

impl Serialize for ConsumableEffectKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConsumableEffectKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = String::deserialize(deserializer)?;
        Ok(Self::parse(&kind))
    }
}

/// Consumable effect payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEffect {
    #[serde(rename = "type")]
    pub kind: ConsumableEffectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    /// Per-stat amounts for `stat_boost` / `stat_food` effects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<Stat, i32>,
}

impl ItemEffect {
    pub fn new(kind: ConsumableEffectKind) -> Self {
        Self {
            kind,
            amount: None,
            duration: None,
            stats: BTreeMap::new(),
        }
    }

    pub fn with_amount(mut self, amount: i32) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_duration(mut self, duration: i32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_stat(mut self, stat: Stat, amount: i32) -> Self {
        self.stats.insert(stat, amount);
        self
    }
}

/// Elemental resistances and weaknesses granted passively by an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementalAffinities {
    pub resistances: BTreeMap<Element, i32>,
    pub weaknesses: BTreeMap<Element, i32>,
}

impl ElementalAffinities {
    pub fn is_empty(&self) -> bool {
        self.resistances.is_empty() && self.weaknesses.is_empty()
    }
}

/// Which elemental-choice flow an item's special effects call for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementalChoiceStyle {
    /// "elemental attunement (choose 1 element)" — potency 1 resistance.
    Attunement,
    /// "choose 1 element for immunity" — potency 3 resistance plus two
    /// weaknesses.
    Immunity,
    /// "dual elemental mastery" — one immunity element, one resistance.
    Dual,
}

/// An immutable item definition from the content tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stat_modifiers: BTreeMap<Stat, i32>,
    #[serde(default)]
    pub enchantment_slots: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_effects: Vec<String>,
    #[serde(default, skip_serializing_if = "ElementalAffinities::is_empty")]
    pub elemental_affinities: ElementalAffinities,
    /// Set on equipped copies once the player has chosen; the recorded
    /// choice also lives on the character so it survives unequipping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elemental_choice: Option<ElementalChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<ItemEffect>,
}

impl ItemDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type,
            subcategory: None,
            stackable: item_type.stacks_by_default(),
            stat_modifiers: BTreeMap::new(),
            enchantment_slots: 0,
            special_effects: Vec::new(),
            elemental_affinities: ElementalAffinities::default(),
            elemental_choice: None,
            effect: None,
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_stat_modifier(mut self, stat: Stat, delta: i32) -> Self {
        self.stat_modifiers.insert(stat, delta);
        self
    }

    pub fn with_enchantment_slots(mut self, slots: u32) -> Self {
        self.enchantment_slots = slots;
        self
    }

    pub fn with_special_effect(mut self, token: impl Into<String>) -> Self {
        self.special_effects.push(token.into());
        self
    }

    pub fn with_resistance(mut self, element: Element, delta: i32) -> Self {
        self.elemental_affinities.resistances.insert(element, delta);
        self
    }

    pub fn with_weakness(mut self, element: Element, delta: i32) -> Self {
        self.elemental_affinities.weaknesses.insert(element, delta);
        self
    }

    pub fn with_effect(mut self, effect: ItemEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Consumable-class items can be used but never equipped: anything of
    /// type consumable, plus herbs and food that carry an effect.
    pub fn is_consumable_class(&self) -> bool {
        match self.item_type {
            ItemType::Consumable => true,
            ItemType::Herb | ItemType::Food => self.effect.is_some(),
            _ => false,
        }
    }

    pub fn is_weapon(&self) -> bool {
        self.item_type == ItemType::Weapon
    }

    pub fn is_equippable(&self) -> bool {
        matches!(
            self.item_type,
            ItemType::Weapon | ItemType::Armor | ItemType::Accessory
        ) && !self.is_consumable_class()
    }

    /// Free enchantment capacity given the currently applied ids.
    pub fn remaining_enchantment_slots(&self, applied: &[String]) -> u32 {
        (self.enchantment_slots as usize).saturating_sub(applied.len()) as u32
    }

    /// Which elemental-choice flow this item's special effects call for,
    /// if any. Dual mastery wins over immunity wording, immunity over plain
    /// attunement.
    pub fn elemental_choice_style(&self) -> Option<ElementalChoiceStyle> {
        let mut style = None;
        for token in &self.special_effects {
            let token = token.to_lowercase();
            if token.contains("dual elemental mastery") {
                return Some(ElementalChoiceStyle::Dual);
            }
            if token.contains("immunity") {
                style = Some(ElementalChoiceStyle::Immunity);
            } else if style.is_none()
                && (token.contains("elemental attunement") || token.contains("choose 1 element"))
            {
                style = Some(ElementalChoiceStyle::Attunement);
            }
        }
        style
    }

    /// Whether a special-effect token belongs to the elemental-choice flow
    /// rather than the token→status-effect mapping.
    pub fn is_elemental_choice_token(token: &str) -> bool {
        let token = token.to_lowercase();
        token.contains("dual elemental mastery")
            || token.contains("immunity")
            || token.contains("elemental attunement")
            || token.contains("choose 1 element")
    }
}

/// Map a special-effect token to the status effect it grants while the item
/// is equipped. Unknown tokens grant nothing.
pub fn status_effect_for_special(token: &str) -> Option<&'static str> {
    match token.to_lowercase().as_str() {
        "regeneration" => Some("health_regen"),
        "night vision" => Some("night_vision"),
        "thorns" => Some("thorns_aura"),
        "stealth" => Some("stealth_mastery"),
        "frost guard" => Some("frost_guard"),
        "poison ward" => Some("poison_ward"),
        "cleansing light" => Some("cleansing_light"),
        "battle focus" => Some("focus"),
        _ => None,
    }
}

// ============================================================================
// Built-in item database
// ============================================================================

lazy_static::lazy_static! {
    /// The built-in item content table.
    pub static ref ITEMS: Vec<ItemDefinition> = builtin_items();
}

/// Look up a built-in item definition by id.
pub fn get_item(id: &str) -> Option<ItemDefinition> {
    ITEMS.iter().find(|item| item.id == id).cloned()
}

fn builtin_items() -> Vec<ItemDefinition> {
    vec![
        // Weapons
        ItemDefinition::new("iron_sword", "Iron Sword", ItemType::Weapon)
            .with_subcategory("swords")
            .with_stat_modifier(Stat::Strength, 3)
            .with_enchantment_slots(1),
        ItemDefinition::new("steel_dagger", "Steel Dagger", ItemType::Weapon)
            .with_subcategory("daggers")
            .with_stat_modifier(Stat::Speed, 2)
            .with_stat_modifier(Stat::Accuracy, 1)
            .with_enchantment_slots(1),
        ItemDefinition::new("shadow_fang", "Shadow Fang", ItemType::Weapon)
            .with_subcategory("daggers")
            .with_stat_modifier(Stat::Speed, 3)
            .with_special_effect("stealth")
            .with_enchantment_slots(2),
        ItemDefinition::new("hunting_bow", "Hunting Bow", ItemType::Weapon)
            .with_subcategory("bows")
            .with_stat_modifier(Stat::Accuracy, 3)
            .with_enchantment_slots(1),
        ItemDefinition::new("oak_staff", "Oak Staff", ItemType::Weapon)
            .with_subcategory("staves")
            .with_stat_modifier(Stat::MagicPower, 4)
            .with_enchantment_slots(2),
        ItemDefinition::new("war_axe", "War Axe", ItemType::Weapon)
            .with_subcategory("axes")
            .with_stat_modifier(Stat::Strength, 5)
            .with_stat_modifier(Stat::Speed, -1),
        ItemDefinition::new("stone_hammer", "Stone Hammer", ItemType::Weapon)
            .with_subcategory("hammers")
            .with_stat_modifier(Stat::Strength, 4),
        ItemDefinition::new("ash_polearm", "Ash Polearm", ItemType::Weapon)
            .with_subcategory("polearms")
            .with_stat_modifier(Stat::Strength, 2)
            .with_stat_modifier(Stat::Accuracy, 1),
        // No proficiency skill exists for chakrams; anyone may equip them.
        ItemDefinition::new("moon_chakram", "Moon Chakram", ItemType::Weapon)
            .with_subcategory("chakrams")
            .with_stat_modifier(Stat::Speed, 2),

        // Armor
        ItemDefinition::new("leather_armor", "Leather Armor", ItemType::Armor)
            .with_stat_modifier(Stat::PhysicalDefence, 3)
            .with_enchantment_slots(1),
        ItemDefinition::new("wyvernscale_mail", "Wyvernscale Mail", ItemType::Armor)
            .with_stat_modifier(Stat::PhysicalDefence, 6)
            .with_stat_modifier(Stat::Hp, 5)
            .with_special_effect("poison ward")
            .with_resistance(Element::Fire, 1)
            .with_enchantment_slots(2),
        ItemDefinition::new("frostweave_robe", "Frostweave Robe", ItemType::Armor)
            .with_stat_modifier(Stat::MagicalDefence, 5)
            .with_resistance(Element::Ice, 2)
            .with_weakness(Element::Fire, 1)
            .with_enchantment_slots(1),

        // Accessories
        ItemDefinition::new("cats_eye_pendant", "Cat's Eye Pendant", ItemType::Accessory)
            .with_special_effect("night vision"),
        ItemDefinition::new("regen_band", "Band of Mending", ItemType::Accessory)
            .with_special_effect("regeneration"),
        ItemDefinition::new("vitality_charm", "Vitality Charm", ItemType::Accessory)
            .with_stat_modifier(Stat::Hp, 10),
        ItemDefinition::new("heavy_iron_torc", "Heavy Iron Torc", ItemType::Accessory)
            .with_stat_modifier(Stat::PhysicalDefence, 2)
            .with_stat_modifier(Stat::Hp, -5),
        ItemDefinition::new("elemental_ring", "Elemental Ring", ItemType::Accessory)
            .with_special_effect("elemental attunement (choose 1 element)"),
        ItemDefinition::new("guardian_amulet", "Guardian Amulet", ItemType::Accessory)
            .with_special_effect("choose 1 element for immunity"),
        ItemDefinition::new("twin_soul_talisman", "Twin Soul Talisman", ItemType::Accessory)
            .with_special_effect("dual elemental mastery"),

        // Consumables
        ItemDefinition::new("minor_healing_potion", "Minor Healing Potion", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::Heal).with_amount(20)),
        ItemDefinition::new("mana_potion", "Mana Potion", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::RestoreMana).with_amount(15)),
        ItemDefinition::new("stamina_draught", "Stamina Draught", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::RestoreStamina).with_amount(15)),
        ItemDefinition::new("regen_salve", "Regenerating Salve", ItemType::Consumable)
            .with_effect(
                ItemEffect::new(ConsumableEffectKind::HealthRegen)
                    .with_amount(2)
                    .with_duration(5),
            ),
        ItemDefinition::new("elixir_of_renewal", "Elixir of Renewal", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::FullHealAndCleanse)),
        ItemDefinition::new("ogre_strength_potion", "Ogre Strength Potion", ItemType::Consumable)
            .with_effect(
                ItemEffect::new(ConsumableEffectKind::TempStrength)
                    .with_amount(5)
                    .with_duration(10),
            ),
        ItemDefinition::new("sage_tonic", "Sage Tonic", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::TempMagic).with_amount(5)),
        ItemDefinition::new("swiftness_potion", "Swiftness Potion", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::TempSpeed).with_amount(3)),
        ItemDefinition::new("antidote", "Antidote", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::CurePoison)),
        ItemDefinition::new("shadow_extract", "Shadow Extract", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::StealthBoost)),
        ItemDefinition::new("barrier_scroll", "Barrier Scroll", ItemType::Consumable)
            .with_effect(ItemEffect::new(ConsumableEffectKind::MagicalBarrier)),

        // Herbs and food
        ItemDefinition::new("healing_herb", "Healing Herb", ItemType::Herb)
            .with_effect(ItemEffect::new(ConsumableEffectKind::Heal).with_amount(8)),
        ItemDefinition::new("dried_herb", "Dried Herb", ItemType::Herb),
        ItemDefinition::new("hearty_stew", "Hearty Stew", ItemType::Food)
            .with_effect(
                ItemEffect::new(ConsumableEffectKind::StatFood)
                    .with_duration(15)
                    .with_stat(Stat::Hp, 5)
                    .with_stat(Stat::Strength, 2),
            ),
        ItemDefinition::new("trail_biscuit", "Trail Biscuit", ItemType::Food),

        // Materials
        ItemDefinition::new("iron_ore", "Iron Ore", ItemType::Material),
        ItemDefinition::new("slime_gel", "Slime Gel", ItemType::Material),

        // Enchantments
        ItemDefinition::new("keen_edge_rune", "Keen Edge Rune", ItemType::Enchantment)
            .with_stat_modifier(Stat::Accuracy, 2),
        ItemDefinition::new("warding_rune", "Warding Rune", ItemType::Enchantment)
            .with_stat_modifier(Stat::MagicalDefence, 3),
        ItemDefinition::new("ember_rune", "Ember Rune", ItemType::Enchantment)
            .with_stat_modifier(Stat::Strength, 1),
    ]
}
