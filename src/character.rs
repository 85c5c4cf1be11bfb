//! The character record and its base attributes.
//!
//! A `Character` is a plain serializable record: the engine mutates it and
//! hands it to the injected store after every successful operation. Older
//! saves used an array-of-entries inventory and a single `weapon` equipment
//! slot; both shapes are accepted on deserialization and normalized into
//! the canonical form, so no downstream code ever branches on shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::elements::ElementalChoice;
use crate::items::ItemDefinition;
use crate::skills::UnlockedSkills;
use crate::status::StatusEffectInstance;

/// Unique character identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Stats
// ============================================================================

/// The eight character attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stat {
    Hp,
    Stamina,
    Strength,
    MagicPower,
    Speed,
    PhysicalDefence,
    MagicalDefence,
    Accuracy,
}

impl Stat {
    pub fn name(&self) -> &'static str {
        match self {
            Stat::Hp => "hp",
            Stat::Stamina => "stamina",
            Stat::Strength => "strength",
            Stat::MagicPower => "magicPower",
            Stat::Speed => "speed",
            Stat::PhysicalDefence => "physicalDefence",
            Stat::MagicalDefence => "magicalDefence",
            Stat::Accuracy => "accuracy",
        }
    }

    pub fn all() -> [Stat; 8] {
        [
            Stat::Hp,
            Stat::Stamina,
            Stat::Strength,
            Stat::MagicPower,
            Stat::Speed,
            Stat::PhysicalDefence,
            Stat::MagicalDefence,
            Stat::Accuracy,
        ]
    }
}

/// A full set of attribute values.
///
/// Used both for base attributes and for derived bonus sets (where each
/// field is a delta, zero-initialized).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub hp: i32,
    pub stamina: i32,
    pub strength: i32,
    pub magic_power: i32,
    pub speed: i32,
    pub physical_defence: i32,
    pub magical_defence: i32,
    pub accuracy: i32,
}

impl Stats {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn get(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Hp => self.hp,
            Stat::Stamina => self.stamina,
            Stat::Strength => self.strength,
            Stat::MagicPower => self.magic_power,
            Stat::Speed => self.speed,
            Stat::PhysicalDefence => self.physical_defence,
            Stat::MagicalDefence => self.magical_defence,
            Stat::Accuracy => self.accuracy,
        }
    }

    pub fn set(&mut self, stat: Stat, value: i32) {
        match stat {
            Stat::Hp => self.hp = value,
            Stat::Stamina => self.stamina = value,
            Stat::Strength => self.strength = value,
            Stat::MagicPower => self.magic_power = value,
            Stat::Speed => self.speed = value,
            Stat::PhysicalDefence => self.physical_defence = value,
            Stat::MagicalDefence => self.magical_defence = value,
            Stat::Accuracy => self.accuracy = value,
        }
    }

    pub fn add(&mut self, stat: Stat, delta: i32) {
        self.set(stat, self.get(stat) + delta);
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Canonical inventory: item id → quantity, unique keys, quantities > 0.
///
/// Older saves stored an ordered list of `{id, quantity}` entries; the
/// deserializer accepts that form and folds it into the map (duplicate ids
/// summed, zero quantities dropped).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory(BTreeMap<String, u32>);

#[derive(Deserialize)]
#[serde(untagged)]
enum InventoryRepr {
    Map(BTreeMap<String, u32>),
    Entries(Vec<LegacyEntry>),
}

#[derive(Deserialize)]
struct LegacyEntry {
    id: String,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl<'de> Deserialize<'de> for Inventory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = InventoryRepr::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        match repr {
            InventoryRepr::Map(entries) => {
                for (id, quantity) in entries {
                    if quantity > 0 {
                        map.insert(id, quantity);
                    }
                }
            }
            InventoryRepr::Entries(entries) => {
                for entry in entries {
                    if entry.quantity > 0 {
                        *map.entry(entry.id).or_insert(0) += entry.quantity;
                    }
                }
            }
        }
        Ok(Inventory(map))
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity on hand for an item id; 0 when absent.
    pub fn quantity(&self, item_id: &str) -> u32 {
        self.0.get(item_id).copied().unwrap_or(0)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.0.contains_key(item_id)
    }

    /// Set the quantity outright. A value of 0 removes the entry.
    pub fn set_quantity(&mut self, item_id: &str, quantity: u32) {
        if quantity == 0 {
            self.0.remove(item_id);
        } else {
            self.0.insert(item_id.to_string(), quantity);
        }
    }

    pub fn add_units(&mut self, item_id: &str, quantity: u32) {
        if quantity > 0 {
            *self.0.entry(item_id.to_string()).or_insert(0) += quantity;
        }
    }

    pub fn remove_entry(&mut self, item_id: &str) {
        self.0.remove(item_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u32)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Equipment slots
// ============================================================================

/// The fixed equipment slot set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EquipSlot {
    PrimaryWeapon,
    SecondaryWeapon,
    Armor,
    Accessory,
}

impl EquipSlot {
    pub fn name(&self) -> &'static str {
        match self {
            EquipSlot::PrimaryWeapon => "primaryWeapon",
            EquipSlot::SecondaryWeapon => "secondaryWeapon",
            EquipSlot::Armor => "armor",
            EquipSlot::Accessory => "accessory",
        }
    }

    pub fn all() -> [EquipSlot; 4] {
        [
            EquipSlot::PrimaryWeapon,
            EquipSlot::SecondaryWeapon,
            EquipSlot::Armor,
            EquipSlot::Accessory,
        ]
    }
}

impl std::fmt::Display for EquipSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What the character currently has equipped.
///
/// Each slot owns an independent copy of the item definition; the inventory
/// never holds the equipped unit. The legacy single `weapon` slot is kept as
/// a deserialization-only field and folded into the weapon slots by
/// `migrate_legacy`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EquippedGear {
    pub primary_weapon: Option<ItemDefinition>,
    pub secondary_weapon: Option<ItemDefinition>,
    pub armor: Option<ItemDefinition>,
    pub accessory: Option<ItemDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon: Option<ItemDefinition>,
}

impl EquippedGear {
    pub fn get(&self, slot: EquipSlot) -> Option<&ItemDefinition> {
        match slot {
            EquipSlot::PrimaryWeapon => self.primary_weapon.as_ref(),
            EquipSlot::SecondaryWeapon => self.secondary_weapon.as_ref(),
            EquipSlot::Armor => self.armor.as_ref(),
            EquipSlot::Accessory => self.accessory.as_ref(),
        }
    }

    pub fn get_mut(&mut self, slot: EquipSlot) -> Option<&mut ItemDefinition> {
        match slot {
            EquipSlot::PrimaryWeapon => self.primary_weapon.as_mut(),
            EquipSlot::SecondaryWeapon => self.secondary_weapon.as_mut(),
            EquipSlot::Armor => self.armor.as_mut(),
            EquipSlot::Accessory => self.accessory.as_mut(),
        }
    }

    /// Place an item in a slot, returning the displaced occupant if any.
    pub fn set(&mut self, slot: EquipSlot, item: ItemDefinition) -> Option<ItemDefinition> {
        match slot {
            EquipSlot::PrimaryWeapon => self.primary_weapon.replace(item),
            EquipSlot::SecondaryWeapon => self.secondary_weapon.replace(item),
            EquipSlot::Armor => self.armor.replace(item),
            EquipSlot::Accessory => self.accessory.replace(item),
        }
    }

    /// Empty a slot, returning its occupant if any.
    pub fn take(&mut self, slot: EquipSlot) -> Option<ItemDefinition> {
        match slot {
            EquipSlot::PrimaryWeapon => self.primary_weapon.take(),
            EquipSlot::SecondaryWeapon => self.secondary_weapon.take(),
            EquipSlot::Armor => self.armor.take(),
            EquipSlot::Accessory => self.accessory.take(),
        }
    }

    /// Fold the legacy single `weapon` slot into the two-weapon structure.
    /// Idempotent: once the legacy slot is empty this does nothing.
    pub fn migrate_legacy(&mut self) {
        if let Some(weapon) = self.weapon.take() {
            if self.primary_weapon.is_none() {
                self.primary_weapon = Some(weapon);
            } else if self.secondary_weapon.is_none() {
                self.secondary_weapon = Some(weapon);
            } else {
                // Both slots occupied in a save that also carries the legacy
                // slot; keep the legacy data rather than drop an item.
                self.weapon = Some(weapon);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EquipSlot, &ItemDefinition)> {
        EquipSlot::all()
            .into_iter()
            .filter_map(move |slot| self.get(slot).map(|item| (slot, item)))
    }
}

/// Enchantment ids applied per equipment slot, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EquippedEnchantments {
    pub primary_weapon: Vec<String>,
    pub secondary_weapon: Vec<String>,
    pub armor: Vec<String>,
    pub accessory: Vec<String>,
}

impl EquippedEnchantments {
    pub fn for_slot(&self, slot: EquipSlot) -> &Vec<String> {
        match slot {
            EquipSlot::PrimaryWeapon => &self.primary_weapon,
            EquipSlot::SecondaryWeapon => &self.secondary_weapon,
            EquipSlot::Armor => &self.armor,
            EquipSlot::Accessory => &self.accessory,
        }
    }

    pub fn for_slot_mut(&mut self, slot: EquipSlot) -> &mut Vec<String> {
        match slot {
            EquipSlot::PrimaryWeapon => &mut self.primary_weapon,
            EquipSlot::SecondaryWeapon => &mut self.secondary_weapon,
            EquipSlot::Armor => &mut self.armor,
            EquipSlot::Accessory => &mut self.accessory,
        }
    }
}

// ============================================================================
// Character
// ============================================================================

/// A playable character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub name: String,

    /// Base attributes. Only stat-upgrade flows (outside this engine) write
    /// these; everything else treats them as read-only inputs.
    pub stats: Stats,

    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub equipped: EquippedGear,
    #[serde(default)]
    pub equipped_enchantments: EquippedEnchantments,

    /// Derived from equipped items and enchantments; recomputed from
    /// scratch on every equipment change, never patched incrementally.
    #[serde(default)]
    pub equipment_bonuses: Stats,

    #[serde(default)]
    pub status_effects: Vec<StatusEffectInstance>,

    // Pools. Older saves predate the mana pool, so it defaults in.
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub mp: i32,
    #[serde(default)]
    pub max_mp: i32,
    pub stamina: i32,
    pub max_stamina: i32,

    #[serde(default)]
    pub unlocked_skills: UnlockedSkills,

    /// Elemental choices the player has made, keyed by item id. The choice
    /// outlives unequipping so the item never asks twice.
    #[serde(default)]
    pub elemental_choices: BTreeMap<String, ElementalChoice>,
}

impl Character {
    /// Create a fresh character with pools filled from the base attributes.
    pub fn new(name: impl Into<String>, stats: Stats) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            stats,
            inventory: Inventory::new(),
            equipped: EquippedGear::default(),
            equipped_enchantments: EquippedEnchantments::default(),
            equipment_bonuses: Stats::zero(),
            status_effects: Vec::new(),
            hp: stats.hp,
            max_hp: stats.hp,
            mp: stats.magic_power,
            max_mp: stats.magic_power,
            stamina: stats.stamina,
            max_stamina: stats.stamina,
            unlocked_skills: UnlockedSkills::default(),
            elemental_choices: BTreeMap::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> CharacterBuilder {
        CharacterBuilder::new(name)
    }

    pub fn has_status_effect(&self, effect_id: &str) -> bool {
        self.status_effects.iter().any(|e| e.id == effect_id)
    }

    pub fn status_effect(&self, effect_id: &str) -> Option<&StatusEffectInstance> {
        self.status_effects.iter().find(|e| e.id == effect_id)
    }

    /// Remove every status effect whose source tags include `tag`.
    /// Returns the number removed.
    pub fn remove_effects_with_source(&mut self, tag: &str) -> usize {
        let before = self.status_effects.len();
        self.status_effects.retain(|e| !e.has_source_tag(tag));
        before - self.status_effects.len()
    }
}

/// Builder for test fixtures and character creation flows.
pub struct CharacterBuilder {
    name: String,
    stats: Stats,
    items: Vec<(String, u32)>,
    weapon_skills: Vec<(String, String)>,
}

impl CharacterBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stats: Stats {
                hp: 50,
                stamina: 30,
                strength: 10,
                magic_power: 8,
                speed: 7,
                physical_defence: 5,
                magical_defence: 4,
                accuracy: 6,
            },
            items: Vec::new(),
            weapon_skills: Vec::new(),
        }
    }

    pub fn stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    pub fn stat(mut self, stat: Stat, value: i32) -> Self {
        self.stats.set(stat, value);
        self
    }

    pub fn item(mut self, item_id: impl Into<String>, quantity: u32) -> Self {
        self.items.push((item_id.into(), quantity));
        self
    }

    /// Unlock a weapon-tree skill, e.g. `("sword", "sword_beginner")`.
    pub fn weapon_skill(mut self, tree: impl Into<String>, skill_id: impl Into<String>) -> Self {
        self.weapon_skills.push((tree.into(), skill_id.into()));
        self
    }

    pub fn build(self) -> Character {
        let mut character = Character::new(self.name, self.stats);
        for (id, quantity) in self.items {
            character.inventory.add_units(&id, quantity);
        }
        for (tree, skill_id) in self.weapon_skills {
            character.unlocked_skills.unlock_weapon_skill(&tree, &skill_id);
        }
        character
    }
}
