//! The character engine: inventory, equipment, enchantments, consumables,
//! and status-effect bookkeeping.
//!
//! Every operation is atomic: preconditions are checked before anything is
//! touched, so a failure leaves the character exactly as it was, and the
//! injected store sees the character once per successful operation. The
//! engine owns no content and no globals — catalogs, skill bonuses, and
//! persistence all arrive through the constructor.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::ContentCatalog;
use crate::character::{Character, EquipSlot, Stat, Stats};
use crate::elements::{Element, ElementalChoice};
use crate::items::{
    status_effect_for_special, ConsumableEffectKind, ElementalChoiceStyle, ItemDefinition, ItemType,
};
use crate::persist::CharacterStore;
use crate::skills::{proficiency_for, SkillBonusProvider};
use crate::stats;
use crate::status::{StatusEffectKind, StatusEffectManager, PERMANENT_DURATION};

/// Failure classes from the engine's operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An id that exists nowhere in the content tables.
    NotFound,
    /// The character's current state does not allow the operation.
    PreconditionFailed,
    /// The operation makes no sense for this item or slot.
    InvalidState,
}

/// Why an engine operation was refused. The character is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("unknown status effect: {0}")]
    UnknownStatusEffect(String),

    #[error("unknown enchantment: {0}")]
    UnknownEnchantment(String),

    #[error("{item} is not in the inventory")]
    ItemNotHeld { item: String },

    #[error("not enough {item}: have {held}, need {requested}")]
    InsufficientQuantity {
        item: String,
        held: u32,
        requested: u32,
    },

    #[error("{item} is already held and does not stack")]
    DuplicateNonStackable { item: String },

    #[error("{item} cannot be equipped")]
    NotEquippable { item: String },

    #[error("{item} does not fit the {slot} slot")]
    SlotMismatch { item: String, slot: EquipSlot },

    #[error("nothing is equipped in the {0} slot")]
    SlotEmpty(EquipSlot),

    #[error("{skill} is required to wield {subcategory}")]
    MissingProficiency { subcategory: String, skill: String },

    #[error("dual wield is required to use the secondary weapon slot")]
    DualWieldRequired,

    #[error("{item} is not a consumable")]
    NotConsumable { item: String },

    #[error("{item} is not an enchantment")]
    NotAnEnchantment { item: String },

    #[error("{item} has no free enchantment slots")]
    EnchantmentSlotsFull { item: String },

    #[error("{enchantment} is not applied to the {slot} slot")]
    EnchantmentNotApplied { enchantment: String, slot: EquipSlot },

    #[error("{item} does not offer an elemental choice")]
    NoElementalChoice { item: String },

    #[error("{item} expects the other elemental-choice flow")]
    WrongChoiceVariant { item: String },

    #[error("the two chosen elements must differ")]
    DuplicateElement,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownItem(_)
            | EngineError::UnknownStatusEffect(_)
            | EngineError::UnknownEnchantment(_) => ErrorKind::NotFound,

            EngineError::ItemNotHeld { .. }
            | EngineError::InsufficientQuantity { .. }
            | EngineError::DuplicateNonStackable { .. }
            | EngineError::SlotMismatch { .. }
            | EngineError::SlotEmpty(_)
            | EngineError::MissingProficiency { .. }
            | EngineError::DualWieldRequired
            | EngineError::EnchantmentSlotsFull { .. }
            | EngineError::EnchantmentNotApplied { .. }
            | EngineError::WrongChoiceVariant { .. }
            | EngineError::DuplicateElement => ErrorKind::PreconditionFailed,

            EngineError::NotEquippable { .. }
            | EngineError::NotConsumable { .. }
            | EngineError::NotAnEnchantment { .. }
            | EngineError::NoElementalChoice { .. } => ErrorKind::InvalidState,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// The equipment/inventory/status engine for a single character at a time.
///
/// Callers must not run two operations concurrently on the same character
/// record; the engine itself is stateless between calls.
pub struct CharacterEngine {
    catalog: Arc<ContentCatalog>,
    effects: StatusEffectManager,
    skill_bonuses: Box<dyn SkillBonusProvider>,
    store: Box<dyn CharacterStore>,
}

impl CharacterEngine {
    pub fn new(
        catalog: Arc<ContentCatalog>,
        skill_bonuses: Box<dyn SkillBonusProvider>,
        store: Box<dyn CharacterStore>,
    ) -> Self {
        Self {
            effects: StatusEffectManager::new(catalog.clone()),
            catalog,
            skill_bonuses,
            store,
        }
    }

    /// Engine over the built-in content tables, with skill bonuses drawn
    /// from the structured skill definitions.
    pub fn builtin(store: Box<dyn CharacterStore>) -> Self {
        let catalog = Arc::new(ContentCatalog::builtin());
        let skill_bonuses = Box::new(crate::skills::CatalogSkillBonuses::new(catalog.clone()));
        Self::new(catalog, skill_bonuses, store)
    }

    pub fn catalog(&self) -> &ContentCatalog {
        &self.catalog
    }

    /// The status-effect rules, for callers that want to pre-validate an
    /// application before committing to it.
    pub fn effects(&self) -> &StatusEffectManager {
        &self.effects
    }

    fn persist(&self, character: &Character) {
        self.store.persist(character);
    }

    // ========================================================================
    // Inventory
    // ========================================================================

    /// Add an item to the inventory.
    ///
    /// Stackable items merge into their existing entry; a non-stackable item
    /// already present is refused (one copy at most in the canonical map).
    pub fn add_item(
        &self,
        character: &mut Character,
        item_id: &str,
        quantity: u32,
    ) -> EngineResult<()> {
        let item = self
            .catalog
            .find_item_by_id(item_id)
            .ok_or_else(|| EngineError::UnknownItem(item_id.to_string()))?;

        if item.stackable {
            character.inventory.add_units(item_id, quantity);
        } else {
            if character.inventory.contains(item_id) {
                return Err(EngineError::DuplicateNonStackable {
                    item: item_id.to_string(),
                });
            }
            character.inventory.set_quantity(item_id, 1);
        }

        debug!(item = item_id, quantity, "item added");
        self.persist(character);
        Ok(())
    }

    /// Remove `quantity` units of an item.
    ///
    /// Holding strictly more than requested decrements; holding exactly the
    /// requested amount deletes the entry; holding less fails outright.
    pub fn remove_item(
        &self,
        character: &mut Character,
        item_id: &str,
        quantity: u32,
    ) -> EngineResult<()> {
        let held = character.inventory.quantity(item_id);
        if held == 0 {
            return Err(EngineError::ItemNotHeld {
                item: item_id.to_string(),
            });
        }
        if held < quantity {
            return Err(EngineError::InsufficientQuantity {
                item: item_id.to_string(),
                held,
                requested: quantity,
            });
        }

        if held > quantity {
            character.inventory.set_quantity(item_id, held - quantity);
        } else {
            character.inventory.remove_entry(item_id);
        }

        debug!(item = item_id, quantity, "item removed");
        self.persist(character);
        Ok(())
    }

    // ========================================================================
    // Equipment
    // ========================================================================

    /// Equip an item from the inventory.
    ///
    /// Weapons are routed through the weapon slot-selection rules;
    /// armor and accessories go to their own slot, displacing any current
    /// occupant back into the inventory.
    pub fn equip_item(
        &self,
        character: &mut Character,
        item_id: &str,
        target_slot: Option<EquipSlot>,
    ) -> EngineResult<()> {
        let item = self
            .catalog
            .find_item_by_id(item_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownItem(item_id.to_string()))?;

        if item.is_consumable_class() || !item.is_equippable() {
            return Err(EngineError::NotEquippable {
                item: item_id.to_string(),
            });
        }
        if character.inventory.quantity(item_id) == 0 {
            return Err(EngineError::ItemNotHeld {
                item: item_id.to_string(),
            });
        }

        if item.is_weapon() {
            return self.equip_weapon_checked(character, item, target_slot);
        }

        let slot = match item.item_type {
            ItemType::Armor => EquipSlot::Armor,
            ItemType::Accessory => EquipSlot::Accessory,
            _ => {
                return Err(EngineError::NotEquippable {
                    item: item_id.to_string(),
                })
            }
        };

        self.place_in_slot(character, slot, item);
        self.apply_equipment_stats(character);
        debug!(item = item_id, slot = %slot, "item equipped");
        self.persist(character);
        Ok(())
    }

    /// Equip a weapon, choosing a slot when none is given.
    ///
    /// Slot selection: an empty primary slot wins; a dagger goes to an empty
    /// secondary slot when dual wield is unlocked; otherwise the primary
    /// occupant is replaced. An explicit secondary slot always requires dual
    /// wield, but accepts any weapon type.
    pub fn equip_weapon(
        &self,
        character: &mut Character,
        item_id: &str,
        target_slot: Option<EquipSlot>,
    ) -> EngineResult<()> {
        let item = self
            .catalog
            .find_item_by_id(item_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownItem(item_id.to_string()))?;

        if !item.is_weapon() {
            return Err(EngineError::NotEquippable {
                item: item_id.to_string(),
            });
        }
        if character.inventory.quantity(item_id) == 0 {
            return Err(EngineError::ItemNotHeld {
                item: item_id.to_string(),
            });
        }

        self.equip_weapon_checked(character, item, target_slot)
    }

    fn equip_weapon_checked(
        &self,
        character: &mut Character,
        item: ItemDefinition,
        target_slot: Option<EquipSlot>,
    ) -> EngineResult<()> {
        if let Some(subcategory) = item.subcategory.as_deref() {
            if let Some(proficiency) = proficiency_for(subcategory) {
                if !character
                    .unlocked_skills
                    .has_weapon_skill(proficiency.tree, proficiency.required_skill)
                {
                    return Err(EngineError::MissingProficiency {
                        subcategory: subcategory.to_string(),
                        skill: proficiency.required_skill.to_string(),
                    });
                }
            }
        }

        let slot = match target_slot {
            Some(EquipSlot::SecondaryWeapon) => {
                if !character.unlocked_skills.has_dual_wield() {
                    return Err(EngineError::DualWieldRequired);
                }
                EquipSlot::SecondaryWeapon
            }
            Some(EquipSlot::PrimaryWeapon) => EquipSlot::PrimaryWeapon,
            Some(slot) => {
                return Err(EngineError::SlotMismatch {
                    item: item.id.clone(),
                    slot,
                })
            }
            None => {
                if character.equipped.primary_weapon.is_none() {
                    EquipSlot::PrimaryWeapon
                } else if character.unlocked_skills.has_dual_wield()
                    && item.subcategory.as_deref() == Some("daggers")
                    && character.equipped.secondary_weapon.is_none()
                {
                    EquipSlot::SecondaryWeapon
                } else {
                    EquipSlot::PrimaryWeapon
                }
            }
        };

        let item_id = item.id.clone();
        self.place_in_slot(character, slot, item);
        self.apply_equipment_stats(character);
        debug!(item = %item_id, slot = %slot, "weapon equipped");
        self.persist(character);
        Ok(())
    }

    /// Unequip a slot, returning its enchantments and then the item itself
    /// to the inventory.
    pub fn unequip_item(&self, character: &mut Character, slot: EquipSlot) -> EngineResult<()> {
        if character.equipped.get(slot).is_none() {
            return Err(EngineError::SlotEmpty(slot));
        }

        self.displace(character, slot);
        self.apply_equipment_stats(character);
        debug!(slot = %slot, "slot unequipped");
        self.persist(character);
        Ok(())
    }

    /// Displace a slot's occupant back into the inventory: enchantments
    /// first, then the item. No recompute, no persist — callers finish the
    /// operation.
    fn displace(&self, character: &mut Character, slot: EquipSlot) {
        if let Some(previous) = character.equipped.take(slot) {
            let enchantments =
                std::mem::take(character.equipped_enchantments.for_slot_mut(slot));
            for enchantment_id in enchantments {
                self.give_back_unit(character, &enchantment_id);
            }
            self.give_back_unit(character, &previous.id);
        }
    }

    /// Move one unit from the inventory into a slot, stamping any recorded
    /// elemental choice onto the equipped copy.
    fn place_in_slot(&self, character: &mut Character, slot: EquipSlot, mut item: ItemDefinition) {
        self.displace(character, slot);
        self.take_unit(character, &item.id.clone());
        if let Some(choice) = character.elemental_choices.get(&item.id) {
            item.elemental_choice = Some(*choice);
        }
        character.equipped.set(slot, item);
    }

    fn take_unit(&self, character: &mut Character, item_id: &str) {
        let held = character.inventory.quantity(item_id);
        if held > 1 {
            character.inventory.set_quantity(item_id, held - 1);
        } else {
            character.inventory.remove_entry(item_id);
        }
    }

    fn give_back_unit(&self, character: &mut Character, item_id: &str) {
        let stackable = self
            .catalog
            .find_item_by_id(item_id)
            .map(|item| item.stackable)
            .unwrap_or(true);
        if stackable {
            character.inventory.add_units(item_id, 1);
        } else if !character.inventory.contains(item_id) {
            character.inventory.set_quantity(item_id, 1);
        } else {
            warn!(item = item_id, "non-stackable item returned to an occupied entry");
        }
    }

    // ========================================================================
    // Enchantments
    // ========================================================================

    /// Apply an enchantment from the inventory to an equipped item.
    pub fn apply_enchantment(
        &self,
        character: &mut Character,
        slot: EquipSlot,
        enchantment_id: &str,
    ) -> EngineResult<()> {
        let item = character
            .equipped
            .get(slot)
            .cloned()
            .ok_or(EngineError::SlotEmpty(slot))?;

        let enchantment = self
            .catalog
            .find_item_by_id(enchantment_id)
            .ok_or_else(|| EngineError::UnknownEnchantment(enchantment_id.to_string()))?;
        if enchantment.item_type != ItemType::Enchantment {
            return Err(EngineError::NotAnEnchantment {
                item: enchantment_id.to_string(),
            });
        }
        if character.inventory.quantity(enchantment_id) == 0 {
            return Err(EngineError::ItemNotHeld {
                item: enchantment_id.to_string(),
            });
        }
        if item.remaining_enchantment_slots(character.equipped_enchantments.for_slot(slot)) == 0 {
            return Err(EngineError::EnchantmentSlotsFull { item: item.id });
        }

        self.take_unit(character, enchantment_id);
        character
            .equipped_enchantments
            .for_slot_mut(slot)
            .push(enchantment_id.to_string());
        self.apply_equipment_stats(character);
        debug!(enchantment = enchantment_id, slot = %slot, "enchantment applied");
        self.persist(character);
        Ok(())
    }

    /// Remove an applied enchantment, returning it to the inventory.
    pub fn remove_enchantment(
        &self,
        character: &mut Character,
        slot: EquipSlot,
        enchantment_id: &str,
    ) -> EngineResult<()> {
        let applied = character.equipped_enchantments.for_slot_mut(slot);
        let Some(position) = applied.iter().position(|id| id == enchantment_id) else {
            return Err(EngineError::EnchantmentNotApplied {
                enchantment: enchantment_id.to_string(),
                slot,
            });
        };
        applied.remove(position);

        self.give_back_unit(character, enchantment_id);
        self.apply_equipment_stats(character);
        debug!(enchantment = enchantment_id, slot = %slot, "enchantment removed");
        self.persist(character);
        Ok(())
    }

    // ========================================================================
    // Consumables
    // ========================================================================

    /// Use one unit of a consumable-class item.
    pub fn use_consumable(&self, character: &mut Character, item_id: &str) -> EngineResult<()> {
        let item = self
            .catalog
            .find_item_by_id(item_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownItem(item_id.to_string()))?;

        if !item.is_consumable_class() {
            return Err(EngineError::NotConsumable {
                item: item_id.to_string(),
            });
        }
        if character.inventory.quantity(item_id) == 0 {
            return Err(EngineError::ItemNotHeld {
                item: item_id.to_string(),
            });
        }

        self.dispatch_consumable_effect(character, &item);
        self.take_unit(character, item_id);
        debug!(item = item_id, "consumable used");
        self.persist(character);
        Ok(())
    }

    /// Apply a consumable's effect without touching the inventory.
    /// Persists afterwards regardless of which branch ran.
    pub fn apply_consumable_effects(&self, character: &mut Character, item: &ItemDefinition) {
        self.dispatch_consumable_effect(character, item);
        self.persist(character);
    }

    fn dispatch_consumable_effect(&self, character: &mut Character, item: &ItemDefinition) {
        let Some(effect) = item.effect.as_ref() else {
            return;
        };
        let amount = effect.amount;

        match effect.kind {
            ConsumableEffectKind::Heal => {
                character.hp = (character.hp + amount.unwrap_or(0)).min(character.max_hp);
            }
            ConsumableEffectKind::RestoreMana => {
                character.mp = (character.mp + amount.unwrap_or(0)).min(character.max_mp);
            }
            ConsumableEffectKind::RestoreStamina => {
                character.stamina =
                    (character.stamina + amount.unwrap_or(0)).min(character.max_stamina);
            }
            ConsumableEffectKind::HealthRegen => {
                self.add_effect_unpersisted(
                    character,
                    "health_regen",
                    effect.duration,
                    amount,
                    None,
                );
            }
            ConsumableEffectKind::FullHealAndCleanse => {
                character.hp = character.max_hp;
                character.mp = character.max_mp;
                character.stamina = character.max_stamina;
                character.status_effects.retain(|e| {
                    !matches!(
                        e.kind,
                        StatusEffectKind::Poison
                            | StatusEffectKind::Bleeding
                            | StatusEffectKind::Curse
                            | StatusEffectKind::Weakness
                    )
                });
            }
            ConsumableEffectKind::TempStrength => {
                self.add_stat_buff(character, "strength_boost", Stat::Strength, amount, effect.duration);
            }
            ConsumableEffectKind::TempMagic => {
                self.add_stat_buff(character, "magic_boost", Stat::MagicPower, amount, effect.duration);
            }
            ConsumableEffectKind::TempSpeed => {
                self.add_stat_buff(character, "speed_boost", Stat::Speed, amount, effect.duration);
            }
            ConsumableEffectKind::StatBoost | ConsumableEffectKind::StatFood => {
                for (&stat, &stat_amount) in &effect.stats {
                    if stat == Stat::Hp {
                        character.max_hp += stat_amount;
                        character.hp += stat_amount;
                    } else if let Some(effect_id) = buff_effect_for_stat(stat) {
                        self.add_stat_buff(
                            character,
                            effect_id,
                            stat,
                            Some(stat_amount),
                            effect.duration,
                        );
                    }
                }
            }
            ConsumableEffectKind::CurePoison => {
                character
                    .status_effects
                    .retain(|e| e.kind != StatusEffectKind::Poison);
            }
            ConsumableEffectKind::StealthBoost => {
                self.add_effect_unpersisted(character, "stealth_mastery", effect.duration, None, None);
            }
            // Informational only; no mechanical effect yet.
            ConsumableEffectKind::MagicalBarrier
            | ConsumableEffectKind::MagicalShield
            | ConsumableEffectKind::ElementalWeapon => {}
            ConsumableEffectKind::Other => {}
        }
    }

    /// Add a timed stat buff, overriding the buffed stat's delta when the
    /// consumable specifies its own amount.
    fn add_stat_buff(
        &self,
        character: &mut Character,
        effect_id: &str,
        stat: Stat,
        amount: Option<i32>,
        duration: Option<i32>,
    ) {
        let Some(mut instance) = self.effects.create_instance(effect_id, duration, amount) else {
            warn!(effect = effect_id, "buff effect missing from catalog");
            return;
        };
        if let Some(amount) = amount {
            instance.stat_modifiers.insert(stat, amount);
        }
        if !instance.stackable {
            character.status_effects.retain(|e| e.id != effect_id);
        }
        character.status_effects.push(instance);
    }

    // ========================================================================
    // Status effects
    // ========================================================================

    /// Attach a status effect to the character.
    ///
    /// A non-stackable effect replaces any existing instance with the same
    /// id unconditionally; immunity vetoes are the caller's call, via
    /// `effects().validate_application`.
    pub fn add_status_effect(
        &self,
        character: &mut Character,
        effect_id: &str,
        duration: Option<i32>,
        potency: Option<i32>,
        source: Option<Vec<String>>,
    ) -> EngineResult<()> {
        if self.catalog.find_status_effect_by_id(effect_id).is_none() {
            return Err(EngineError::UnknownStatusEffect(effect_id.to_string()));
        }
        self.add_effect_unpersisted(character, effect_id, duration, potency, source);
        debug!(effect = effect_id, "status effect added");
        self.persist(character);
        Ok(())
    }

    fn add_effect_unpersisted(
        &self,
        character: &mut Character,
        effect_id: &str,
        duration: Option<i32>,
        potency: Option<i32>,
        source: Option<Vec<String>>,
    ) {
        let Some(mut instance) = self.effects.create_instance(effect_id, duration, potency) else {
            warn!(effect = effect_id, "status effect missing from catalog");
            return;
        };
        if let Some(source) = source {
            instance.source = source;
        }
        if !instance.stackable {
            character.status_effects.retain(|e| e.id != effect_id);
        }
        character.status_effects.push(instance);
    }

    /// Advance every status effect by one turn: tick damage and healing,
    /// count durations down uniformly, and sweep out whatever expired.
    pub fn process_status_effects(&self, character: &mut Character) {
        let ticks: Vec<(StatusEffectKind, i32)> = character
            .status_effects
            .iter()
            .map(|e| (e.kind, e.potency))
            .collect();
        for (kind, potency) in ticks {
            match kind {
                StatusEffectKind::DamageOverTime => {
                    character.hp = (character.hp - potency).max(0);
                }
                StatusEffectKind::HealOverTime => {
                    character.hp = (character.hp + potency).min(character.max_hp);
                }
                _ => {}
            }
        }

        for effect in &mut character.status_effects {
            effect.duration -= 1;
        }

        let before = character.status_effects.len();
        character.status_effects.retain(|e| e.duration > 0);
        if character.status_effects.len() != before {
            self.apply_equipment_stats(character);
        }

        self.persist(character);
    }

    // ========================================================================
    // Equipment-derived stats
    // ========================================================================

    /// Full recompute of everything equipment-derived. Safe to call any
    /// number of times; the result depends only on the current equipment,
    /// enchantments, and recorded elemental choices.
    pub fn apply_equipment_stats(&self, character: &mut Character) {
        // (a) fold any legacy single-weapon save data into the slot pair
        character.equipped.migrate_legacy();

        // (b) derived bonuses start from zero on every recompute
        character.equipment_bonuses = Stats::zero();

        // (c) rebuild the equipment-sourced status effects
        character.remove_effects_with_source("equipment");
        let equipped: Vec<(EquipSlot, ItemDefinition)> = character
            .equipped
            .iter()
            .map(|(slot, item)| (slot, item.clone()))
            .collect();

        for (slot, item) in &equipped {
            // Elemental-choice items are handled with the affinity step.
            if item.elemental_choice_style().is_some() {
                continue;
            }
            for token in &item.special_effects {
                match status_effect_for_special(token) {
                    Some(effect_id) => {
                        self.add_effect_unpersisted(
                            character,
                            effect_id,
                            Some(PERMANENT_DURATION),
                            None,
                            Some(vec!["equipment".to_string(), slot.name().to_string()]),
                        );
                    }
                    None => debug!(token = %token, "no status effect mapped for special effect"),
                }
            }
        }

        // (d) accumulated elemental affinities, then recorded choices
        let mut resistances: BTreeMap<Element, i32> = BTreeMap::new();
        let mut weaknesses: BTreeMap<Element, i32> = BTreeMap::new();
        for (_slot, item) in &equipped {
            for (&element, &delta) in &item.elemental_affinities.resistances {
                *resistances.entry(element).or_insert(0) += delta;
            }
            for (&element, &delta) in &item.elemental_affinities.weaknesses {
                *weaknesses.entry(element).or_insert(0) += delta;
            }
        }
        let affinity_source = vec![
            "equipment".to_string(),
            "accumulated".to_string(),
            "elemental_affinity".to_string(),
        ];
        for (element, total) in resistances {
            if total != 0 {
                self.add_effect_unpersisted(
                    character,
                    &element.resistance_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(total),
                    Some(affinity_source.clone()),
                );
            }
        }
        for (element, total) in weaknesses {
            if total != 0 {
                self.add_effect_unpersisted(
                    character,
                    &element.weakness_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(total),
                    Some(affinity_source.clone()),
                );
            }
        }
        for (slot, item) in &equipped {
            let choice = item
                .elemental_choice
                .or_else(|| character.elemental_choices.get(&item.id).copied());
            if let Some(choice) = choice {
                self.apply_elemental_choice(character, *slot, item, choice);
            }
        }

        // (e) item stat modifiers
        for (_slot, item) in &equipped {
            for (&stat, &delta) in &item.stat_modifiers {
                character.equipment_bonuses.add(stat, delta);
            }
        }

        // (f) enchantment stat modifiers
        for slot in EquipSlot::all() {
            for enchantment_id in character.equipped_enchantments.for_slot(slot) {
                match self.catalog.find_item_by_id(enchantment_id) {
                    Some(enchantment) => {
                        for (&stat, &delta) in &enchantment.stat_modifiers {
                            character.equipment_bonuses.add(stat, delta);
                        }
                    }
                    None => warn!(enchantment = %enchantment_id, "enchantment missing from catalog"),
                }
            }
        }

        // (g) max pools follow the hp/stamina bonuses; shrinking clamps the
        // current value, growing never refills it
        let skill = self.skill_bonuses.stat_bonuses(character);
        character.max_hp = (character.stats.hp + character.equipment_bonuses.hp + skill.hp).max(1);
        if character.hp > character.max_hp {
            character.hp = character.max_hp;
        }
        character.max_stamina =
            (character.stats.stamina + character.equipment_bonuses.stamina + skill.stamina).max(1);
        if character.stamina > character.max_stamina {
            character.stamina = character.max_stamina;
        }
    }

    fn apply_elemental_choice(
        &self,
        character: &mut Character,
        slot: EquipSlot,
        item: &ItemDefinition,
        choice: ElementalChoice,
    ) {
        let style = item
            .elemental_choice_style()
            .unwrap_or(ElementalChoiceStyle::Attunement);
        let source = vec!["equipment".to_string(), slot.name().to_string()];

        match (style, choice) {
            (ElementalChoiceStyle::Dual, ElementalChoice::Dual { immunity, resistance }) => {
                self.add_effect_unpersisted(
                    character,
                    &immunity.resistance_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(3),
                    Some(source.clone()),
                );
                self.add_effect_unpersisted(
                    character,
                    &resistance.resistance_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(1),
                    Some(source.clone()),
                );
                let first = immunity.opposite();
                let second = resistance.opposite();
                self.add_effect_unpersisted(
                    character,
                    &first.weakness_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(2),
                    Some(source.clone()),
                );
                if second != first {
                    self.add_effect_unpersisted(
                        character,
                        &second.weakness_effect_id(),
                        Some(PERMANENT_DURATION),
                        Some(1),
                        Some(source),
                    );
                }
            }
            (ElementalChoiceStyle::Immunity, ElementalChoice::Resistance { resistance, weakness }) => {
                // Potency 3 is full immunity; the opposing weakness bites
                // harder and a second, fixed weakness comes with it.
                self.add_effect_unpersisted(
                    character,
                    &resistance.resistance_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(3),
                    Some(source.clone()),
                );
                self.add_effect_unpersisted(
                    character,
                    &weakness.weakness_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(2),
                    Some(source.clone()),
                );
                self.add_effect_unpersisted(
                    character,
                    &resistance.second_weakness().weakness_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(1),
                    Some(source),
                );
            }
            (_, ElementalChoice::Resistance { resistance, weakness }) => {
                self.add_effect_unpersisted(
                    character,
                    &resistance.resistance_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(1),
                    Some(source.clone()),
                );
                self.add_effect_unpersisted(
                    character,
                    &weakness.weakness_effect_id(),
                    Some(PERMANENT_DURATION),
                    Some(1),
                    Some(source),
                );
            }
            (_, ElementalChoice::Dual { .. }) => {
                warn!(item = %item.id, "dual choice recorded for a single-choice item");
            }
        }
    }

    // ========================================================================
    // Elemental choice flow
    // ========================================================================

    /// Record the player's element for a single-choice item in `slot`.
    pub fn choose_element(
        &self,
        character: &mut Character,
        slot: EquipSlot,
        element: Element,
    ) -> EngineResult<()> {
        let item = character
            .equipped
            .get(slot)
            .cloned()
            .ok_or(EngineError::SlotEmpty(slot))?;

        match item.elemental_choice_style() {
            None => {
                return Err(EngineError::NoElementalChoice { item: item.id });
            }
            Some(ElementalChoiceStyle::Dual) => {
                return Err(EngineError::WrongChoiceVariant { item: item.id });
            }
            Some(_) => {}
        }

        let choice = ElementalChoice::Resistance {
            resistance: element,
            weakness: element.opposite(),
        };
        self.record_choice(character, slot, &item.id, choice);
        Ok(())
    }

    /// Record the player's two elements for a dual-mastery item in `slot`.
    pub fn choose_dual_elements(
        &self,
        character: &mut Character,
        slot: EquipSlot,
        immunity: Element,
        resistance: Element,
    ) -> EngineResult<()> {
        if immunity == resistance {
            return Err(EngineError::DuplicateElement);
        }

        let item = character
            .equipped
            .get(slot)
            .cloned()
            .ok_or(EngineError::SlotEmpty(slot))?;

        match item.elemental_choice_style() {
            Some(ElementalChoiceStyle::Dual) => {}
            Some(_) => {
                return Err(EngineError::WrongChoiceVariant { item: item.id });
            }
            None => {
                return Err(EngineError::NoElementalChoice { item: item.id });
            }
        }

        let choice = ElementalChoice::Dual {
            immunity,
            resistance,
        };
        self.record_choice(character, slot, &item.id, choice);
        Ok(())
    }

    fn record_choice(
        &self,
        character: &mut Character,
        slot: EquipSlot,
        item_id: &str,
        choice: ElementalChoice,
    ) {
        character
            .elemental_choices
            .insert(item_id.to_string(), choice);
        if let Some(equipped) = character.equipped.get_mut(slot) {
            equipped.elemental_choice = Some(choice);
        }
        self.apply_equipment_stats(character);
        debug!(item = item_id, slot = %slot, "elemental choice recorded");
        self.persist(character);
    }

    // ========================================================================
    // Read-only resolution
    // ========================================================================

    /// Effective stats: base + equipment + status effects + skill bonuses,
    /// clamped per stat.
    pub fn get_effective_stats(&self, character: &Character) -> Stats {
        stats::effective_stats(character, &self.skill_bonuses.stat_bonuses(character))
    }

    /// Sum of stat modifiers across active status effects.
    pub fn get_status_effect_bonuses(&self, character: &Character) -> Stats {
        stats::status_effect_bonuses(character)
    }
}

/// The timed buff granted when a stat-boost consumable routes a given stat.
/// HP is handled directly and has no buff effect.
fn buff_effect_for_stat(stat: Stat) -> Option<&'static str> {
    match stat {
        Stat::Hp => None,
        Stat::Stamina => Some("stamina_boost"),
        Stat::Strength => Some("strength_boost"),
        Stat::MagicPower => Some("magic_boost"),
        Stat::Speed => Some("speed_boost"),
        Stat::PhysicalDefence => Some("iron_skin"),
        Stat::MagicalDefence => Some("arcane_ward"),
        Stat::Accuracy => Some("focus"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::NoSkillBonuses;
    use crate::testing::{sample_adventurer, sample_character, RecordingStore};

    fn engine() -> (CharacterEngine, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::new());
        let engine = CharacterEngine::new(
            Arc::new(ContentCatalog::builtin()),
            Box::new(NoSkillBonuses),
            Box::new(store.clone()),
        );
        (engine, store)
    }

    fn effect_signature(character: &Character) -> Vec<(String, i32, i32)> {
        let mut signature: Vec<_> = character
            .status_effects
            .iter()
            .map(|e| (e.id.clone(), e.potency, e.duration))
            .collect();
        signature.sort();
        signature
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    #[test]
    fn test_add_unknown_item_fails() {
        let (engine, store) = engine();
        let mut hero = sample_character("Hero");
        assert_eq!(
            engine.add_item(&mut hero, "no_such_item", 1),
            Err(EngineError::UnknownItem("no_such_item".to_string()))
        );
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_add_stackable_merges() {
        let (engine, store) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "healing_herb", 2).unwrap();
        engine.add_item(&mut hero, "healing_herb", 3).unwrap();
        assert_eq!(hero.inventory.quantity("healing_herb"), 5);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_add_non_stackable_duplicate_rejected() {
        let (engine, store) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "iron_sword", 1).unwrap();
        // Requested quantity is irrelevant for non-stackable items.
        assert_eq!(
            engine.add_item(&mut hero, "iron_sword", 1),
            Err(EngineError::DuplicateNonStackable {
                item: "iron_sword".to_string()
            })
        );
        assert_eq!(hero.inventory.quantity("iron_sword"), 1);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_add_non_stackable_caps_quantity_at_one() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "leather_armor", 5).unwrap();
        assert_eq!(hero.inventory.quantity("leather_armor"), 1);
    }

    #[test]
    fn test_remove_exact_quantity_deletes_entry() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "iron_ore", 3).unwrap();
        engine.remove_item(&mut hero, "iron_ore", 3).unwrap();
        assert!(!hero.inventory.contains("iron_ore"));
    }

    #[test]
    fn test_remove_fewer_decrements() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "iron_ore", 3).unwrap();
        engine.remove_item(&mut hero, "iron_ore", 2).unwrap();
        assert_eq!(hero.inventory.quantity("iron_ore"), 1);
    }

    #[test]
    fn test_remove_more_than_held_fails_untouched() {
        let (engine, store) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "iron_ore", 2).unwrap();
        let persists = store.count();

        assert_eq!(
            engine.remove_item(&mut hero, "iron_ore", 3),
            Err(EngineError::InsufficientQuantity {
                item: "iron_ore".to_string(),
                held: 2,
                requested: 3,
            })
        );
        assert_eq!(hero.inventory.quantity("iron_ore"), 2);
        assert_eq!(store.count(), persists);
    }

    #[test]
    fn test_remove_absent_fails() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        assert_eq!(
            engine.remove_item(&mut hero, "iron_ore", 1),
            Err(EngineError::ItemNotHeld {
                item: "iron_ore".to_string()
            })
        );
    }

    // ------------------------------------------------------------------
    // Equipping
    // ------------------------------------------------------------------

    #[test]
    fn test_equip_requires_proficiency() {
        let (engine, store) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "iron_sword", 1).unwrap();
        let persists = store.count();

        let result = engine.equip_item(&mut hero, "iron_sword", None);
        assert_eq!(
            result,
            Err(EngineError::MissingProficiency {
                subcategory: "swords".to_string(),
                skill: "sword_beginner".to_string(),
            })
        );
        assert!(hero.equipped.primary_weapon.is_none());
        assert_eq!(hero.inventory.quantity("iron_sword"), 1);
        assert_eq!(store.count(), persists);
    }

    #[test]
    fn test_unknown_weapon_subcategory_needs_no_proficiency() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "moon_chakram", 1).unwrap();
        engine.equip_item(&mut hero, "moon_chakram", None).unwrap();
        assert_eq!(hero.equipped.primary_weapon.as_ref().unwrap().id, "moon_chakram");
    }

    #[test]
    fn test_equip_and_unequip_restore_inventory_and_bonuses() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");
        let baseline_bonuses = hero.equipment_bonuses;

        engine.equip_item(&mut hero, "iron_sword", None).unwrap();
        assert!(!hero.inventory.contains("iron_sword"));
        assert_eq!(hero.equipment_bonuses.strength, 3);

        engine
            .unequip_item(&mut hero, EquipSlot::PrimaryWeapon)
            .unwrap();
        assert_eq!(hero.inventory.quantity("iron_sword"), 1);
        assert_eq!(hero.equipment_bonuses, baseline_bonuses);
        assert!(hero.equipped.primary_weapon.is_none());
    }

    #[test]
    fn test_equipped_copy_is_independent_of_inventory() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");
        engine.equip_item(&mut hero, "iron_sword", None).unwrap();
        // The slot owns a copy; the inventory entry is gone entirely.
        assert!(hero.equipped.primary_weapon.is_some());
        assert_eq!(hero.inventory.quantity("iron_sword"), 0);
    }

    #[test]
    fn test_equip_consumable_rejected() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "healing_herb", 1).unwrap();
        engine.add_item(&mut hero, "minor_healing_potion", 1).unwrap();

        for item in ["healing_herb", "minor_healing_potion"] {
            let result = engine.equip_item(&mut hero, item, None);
            assert_eq!(
                result,
                Err(EngineError::NotEquippable {
                    item: item.to_string()
                })
            );
            assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidState);
        }
    }

    #[test]
    fn test_equip_material_rejected() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "iron_ore", 1).unwrap();
        assert!(matches!(
            engine.equip_item(&mut hero, "iron_ore", None),
            Err(EngineError::NotEquippable { .. })
        ));
    }

    #[test]
    fn test_equip_not_held_rejected() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");
        hero.inventory.remove_entry("iron_sword");
        assert_eq!(
            engine.equip_item(&mut hero, "iron_sword", None),
            Err(EngineError::ItemNotHeld {
                item: "iron_sword".to_string()
            })
        );
    }

    #[test]
    fn test_dual_wield_slot_selection() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");

        engine.equip_item(&mut hero, "iron_sword", None).unwrap();
        assert_eq!(hero.equipped.primary_weapon.as_ref().unwrap().id, "iron_sword");

        // A dagger drifts to the empty secondary slot when dual wield is
        // unlocked.
        engine.equip_item(&mut hero, "steel_dagger", None).unwrap();
        assert_eq!(hero.equipped.primary_weapon.as_ref().unwrap().id, "iron_sword");
        assert_eq!(
            hero.equipped.secondary_weapon.as_ref().unwrap().id,
            "steel_dagger"
        );
        assert!(!hero.inventory.contains("iron_sword"));
        assert!(!hero.inventory.contains("steel_dagger"));
    }

    #[test]
    fn test_non_dagger_never_auto_selects_secondary() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");
        hero.unlocked_skills.unlock_weapon_skill("axe", "axe_beginner");
        engine.add_item(&mut hero, "war_axe", 1).unwrap();

        engine.equip_item(&mut hero, "iron_sword", None).unwrap();
        engine.equip_item(&mut hero, "war_axe", None).unwrap();
        // The axe replaces the primary occupant instead of drifting.
        assert_eq!(hero.equipped.primary_weapon.as_ref().unwrap().id, "war_axe");
        assert!(hero.equipped.secondary_weapon.is_none());
        assert_eq!(hero.inventory.quantity("iron_sword"), 1);
    }

    #[test]
    fn test_explicit_secondary_requires_dual_wield() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        hero.unlocked_skills.unlock_weapon_skill("sword", "sword_beginner");
        engine.add_item(&mut hero, "iron_sword", 1).unwrap();

        assert_eq!(
            engine.equip_weapon(&mut hero, "iron_sword", Some(EquipSlot::SecondaryWeapon)),
            Err(EngineError::DualWieldRequired)
        );
    }

    #[test]
    fn test_explicit_secondary_accepts_any_weapon_with_dual_wield() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");
        engine
            .equip_weapon(&mut hero, "iron_sword", Some(EquipSlot::SecondaryWeapon))
            .unwrap();
        assert_eq!(hero.equipped.secondary_weapon.as_ref().unwrap().id, "iron_sword");
        assert!(hero.equipped.primary_weapon.is_none());
    }

    #[test]
    fn test_weapon_into_armor_slot_rejected() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");
        assert_eq!(
            engine.equip_weapon(&mut hero, "iron_sword", Some(EquipSlot::Armor)),
            Err(EngineError::SlotMismatch {
                item: "iron_sword".to_string(),
                slot: EquipSlot::Armor,
            })
        );
    }

    #[test]
    fn test_replacing_equipment_returns_old_piece() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "leather_armor", 1).unwrap();
        engine.add_item(&mut hero, "wyvernscale_mail", 1).unwrap();

        engine.equip_item(&mut hero, "leather_armor", None).unwrap();
        engine.equip_item(&mut hero, "wyvernscale_mail", None).unwrap();

        assert_eq!(hero.equipped.armor.as_ref().unwrap().id, "wyvernscale_mail");
        assert_eq!(hero.inventory.quantity("leather_armor"), 1);
    }

    #[test]
    fn test_unequip_empty_slot_fails() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        assert_eq!(
            engine.unequip_item(&mut hero, EquipSlot::Armor),
            Err(EngineError::SlotEmpty(EquipSlot::Armor))
        );
    }

    #[test]
    fn test_legacy_weapon_slot_migrates_on_recompute() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");
        let sword = engine.catalog().find_item_by_id("iron_sword").cloned().unwrap();
        hero.equipped.weapon = Some(sword);

        engine.apply_equipment_stats(&mut hero);
        assert!(hero.equipped.weapon.is_none());
        assert_eq!(hero.equipped.primary_weapon.as_ref().unwrap().id, "iron_sword");
        assert_eq!(hero.equipment_bonuses.strength, 3);
    }

    // ------------------------------------------------------------------
    // Recompute pipeline
    // ------------------------------------------------------------------

    #[test]
    fn test_special_effects_derive_status_effects() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "regen_band", 1).unwrap();
        engine.equip_item(&mut hero, "regen_band", None).unwrap();

        let regen = hero.status_effect("health_regen").unwrap();
        assert!(regen.has_source_tag("equipment"));
        assert!(regen.has_source_tag("accessory"));
        assert!(regen.is_permanent());

        engine.unequip_item(&mut hero, EquipSlot::Accessory).unwrap();
        assert!(!hero.has_status_effect("health_regen"));
    }

    #[test]
    fn test_apply_equipment_stats_is_idempotent() {
        let (engine, _) = engine();
        let mut hero = sample_adventurer("Hero");
        engine.add_item(&mut hero, "wyvernscale_mail", 1).unwrap();
        engine.add_item(&mut hero, "regen_band", 1).unwrap();
        engine.equip_item(&mut hero, "iron_sword", None).unwrap();
        engine.equip_item(&mut hero, "wyvernscale_mail", None).unwrap();
        engine.equip_item(&mut hero, "regen_band", None).unwrap();

        engine.apply_equipment_stats(&mut hero);
        let bonuses = hero.equipment_bonuses;
        let effects = effect_signature(&hero);

        engine.apply_equipment_stats(&mut hero);
        assert_eq!(hero.equipment_bonuses, bonuses);
        assert_eq!(effect_signature(&hero), effects);
    }

    #[test]
    fn test_elemental_affinities_accumulate() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "wyvernscale_mail", 1).unwrap();
        engine.equip_item(&mut hero, "wyvernscale_mail", None).unwrap();

        let fire = hero.status_effect("fire_resistance").unwrap();
        assert_eq!(fire.potency, 1);
        assert!(fire.has_source_tag("elemental_affinity"));
        assert!(fire.has_source_tag("accumulated"));

        // Swapping to the robe replaces the accumulated set entirely.
        engine.add_item(&mut hero, "frostweave_robe", 1).unwrap();
        engine.equip_item(&mut hero, "frostweave_robe", None).unwrap();
        assert!(!hero.has_status_effect("fire_resistance"));
        assert_eq!(hero.status_effect("ice_resistance").unwrap().potency, 2);
        assert_eq!(hero.status_effect("fire_weakness").unwrap().potency, 1);
    }

    #[test]
    fn test_max_hp_shrink_clamps_growth_does_not_refill() {
        let (engine, _) = engine();
        let mut hero = Character::builder("Hero").stat(Stat::Hp, 10).build();
        assert_eq!((hero.hp, hero.max_hp), (10, 10));

        engine.add_item(&mut hero, "heavy_iron_torc", 1).unwrap();
        engine.equip_item(&mut hero, "heavy_iron_torc", None).unwrap();
        assert_eq!(hero.max_hp, 5);
        assert_eq!(hero.hp, 5);

        engine.unequip_item(&mut hero, EquipSlot::Accessory).unwrap();
        assert_eq!(hero.max_hp, 10);
        // No auto-heal when the maximum grows back.
        assert_eq!(hero.hp, 5);
    }

    #[test]
    fn test_max_pool_floor_is_one() {
        let (engine, _) = engine();
        let mut hero = Character::builder("Hero").stat(Stat::Hp, 3).build();
        engine.add_item(&mut hero, "heavy_iron_torc", 1).unwrap();
        engine.equip_item(&mut hero, "heavy_iron_torc", None).unwrap();
        assert_eq!(hero.max_hp, 1);
        assert_eq!(hero.hp, 1);
    }

    // ------------------------------------------------------------------
    // Enchantments
    // ------------------------------------------------------------------

    #[test]
    fn test_enchantment_lifecycle() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "wyvernscale_mail", 1).unwrap();
        engine.add_item(&mut hero, "keen_edge_rune", 1).unwrap();
        engine.add_item(&mut hero, "warding_rune", 1).unwrap();
        engine.add_item(&mut hero, "ember_rune", 1).unwrap();
        engine.equip_item(&mut hero, "wyvernscale_mail", None).unwrap();

        engine
            .apply_enchantment(&mut hero, EquipSlot::Armor, "keen_edge_rune")
            .unwrap();
        engine
            .apply_enchantment(&mut hero, EquipSlot::Armor, "warding_rune")
            .unwrap();
        assert_eq!(hero.equipment_bonuses.accuracy, 2);
        assert_eq!(hero.equipment_bonuses.magical_defence, 3);
        assert!(!hero.inventory.contains("keen_edge_rune"));

        // Two slots on the mail; the third application is refused.
        assert_eq!(
            engine.apply_enchantment(&mut hero, EquipSlot::Armor, "ember_rune"),
            Err(EngineError::EnchantmentSlotsFull {
                item: "wyvernscale_mail".to_string()
            })
        );

        engine
            .remove_enchantment(&mut hero, EquipSlot::Armor, "keen_edge_rune")
            .unwrap();
        assert_eq!(hero.inventory.quantity("keen_edge_rune"), 1);
        assert_eq!(hero.equipment_bonuses.accuracy, 0);
    }

    #[test]
    fn test_unequip_returns_enchantments() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "wyvernscale_mail", 1).unwrap();
        engine.add_item(&mut hero, "keen_edge_rune", 1).unwrap();
        engine.equip_item(&mut hero, "wyvernscale_mail", None).unwrap();
        engine
            .apply_enchantment(&mut hero, EquipSlot::Armor, "keen_edge_rune")
            .unwrap();

        engine.unequip_item(&mut hero, EquipSlot::Armor).unwrap();
        assert_eq!(hero.inventory.quantity("keen_edge_rune"), 1);
        assert_eq!(hero.inventory.quantity("wyvernscale_mail"), 1);
        assert!(hero.equipped_enchantments.armor.is_empty());
    }

    #[test]
    fn test_enchantment_preconditions() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "wyvernscale_mail", 1).unwrap();
        engine.add_item(&mut hero, "iron_ore", 1).unwrap();

        assert_eq!(
            engine.apply_enchantment(&mut hero, EquipSlot::Armor, "keen_edge_rune"),
            Err(EngineError::SlotEmpty(EquipSlot::Armor))
        );

        engine.equip_item(&mut hero, "wyvernscale_mail", None).unwrap();
        assert_eq!(
            engine.apply_enchantment(&mut hero, EquipSlot::Armor, "missing_rune"),
            Err(EngineError::UnknownEnchantment("missing_rune".to_string()))
        );
        assert_eq!(
            engine.apply_enchantment(&mut hero, EquipSlot::Armor, "iron_ore"),
            Err(EngineError::NotAnEnchantment {
                item: "iron_ore".to_string()
            })
        );
        assert_eq!(
            engine.apply_enchantment(&mut hero, EquipSlot::Armor, "keen_edge_rune"),
            Err(EngineError::ItemNotHeld {
                item: "keen_edge_rune".to_string()
            })
        );
        assert_eq!(
            engine.remove_enchantment(&mut hero, EquipSlot::Armor, "keen_edge_rune"),
            Err(EngineError::EnchantmentNotApplied {
                enchantment: "keen_edge_rune".to_string(),
                slot: EquipSlot::Armor,
            })
        );
    }

    // ------------------------------------------------------------------
    // Elemental choice
    // ------------------------------------------------------------------

    #[test]
    fn test_plain_choice_grants_resistance_and_opposite_weakness() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "elemental_ring", 1).unwrap();
        engine.equip_item(&mut hero, "elemental_ring", None).unwrap();
        engine
            .choose_element(&mut hero, EquipSlot::Accessory, Element::Fire)
            .unwrap();

        let resistance = hero.status_effect("fire_resistance").unwrap();
        assert_eq!(resistance.potency, 1);
        assert!(resistance.is_permanent());
        assert!(resistance.has_source_tag("accessory"));

        let weakness = hero.status_effect("water_weakness").unwrap();
        assert_eq!(weakness.potency, 1);

        // Recomputing again re-derives the same pair, no duplicates.
        engine.apply_equipment_stats(&mut hero);
        let fire_count = hero
            .status_effects
            .iter()
            .filter(|e| e.id == "fire_resistance")
            .count();
        assert_eq!(fire_count, 1);
    }

    #[test]
    fn test_choice_survives_reequip_without_reselection() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "elemental_ring", 1).unwrap();
        engine.equip_item(&mut hero, "elemental_ring", None).unwrap();
        engine
            .choose_element(&mut hero, EquipSlot::Accessory, Element::Fire)
            .unwrap();

        engine.unequip_item(&mut hero, EquipSlot::Accessory).unwrap();
        assert!(!hero.has_status_effect("fire_resistance"));
        assert!(!hero.has_status_effect("water_weakness"));

        engine.equip_item(&mut hero, "elemental_ring", None).unwrap();
        assert_eq!(hero.status_effect("fire_resistance").unwrap().potency, 1);
        assert_eq!(hero.status_effect("water_weakness").unwrap().potency, 1);
    }

    #[test]
    fn test_immunity_choice_grants_two_weaknesses() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "guardian_amulet", 1).unwrap();
        engine.equip_item(&mut hero, "guardian_amulet", None).unwrap();
        engine
            .choose_element(&mut hero, EquipSlot::Accessory, Element::Ice)
            .unwrap();

        // Potency 3 resistance is immunity.
        assert_eq!(hero.status_effect("ice_resistance").unwrap().potency, 3);
        // Opposing element of ice is lightning; its fixed second weakness
        // is fire.
        assert_eq!(hero.status_effect("lightning_weakness").unwrap().potency, 2);
        assert_eq!(hero.status_effect("fire_weakness").unwrap().potency, 1);
    }

    #[test]
    fn test_dual_choice_grants_both_resistances() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "twin_soul_talisman", 1).unwrap();
        engine.equip_item(&mut hero, "twin_soul_talisman", None).unwrap();
        engine
            .choose_dual_elements(&mut hero, EquipSlot::Accessory, Element::Light, Element::Dark)
            .unwrap();

        assert_eq!(hero.status_effect("light_resistance").unwrap().potency, 3);
        assert_eq!(hero.status_effect("dark_resistance").unwrap().potency, 1);
        // Weaknesses land on each chosen element's opposite.
        assert_eq!(hero.status_effect("dark_weakness").unwrap().potency, 2);
        assert_eq!(hero.status_effect("light_weakness").unwrap().potency, 1);
    }

    #[test]
    fn test_dual_choice_deduplicates_coinciding_opposites() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "twin_soul_talisman", 1).unwrap();
        engine.equip_item(&mut hero, "twin_soul_talisman", None).unwrap();
        // Ice and wind both oppose lightning.
        engine
            .choose_dual_elements(&mut hero, EquipSlot::Accessory, Element::Ice, Element::Wind)
            .unwrap();

        let lightning: Vec<_> = hero
            .status_effects
            .iter()
            .filter(|e| e.id == "lightning_weakness")
            .collect();
        assert_eq!(lightning.len(), 1);
        assert_eq!(lightning[0].potency, 2);
    }

    #[test]
    fn test_choice_flow_preconditions() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "cats_eye_pendant", 1).unwrap();
        engine.add_item(&mut hero, "twin_soul_talisman", 1).unwrap();

        assert_eq!(
            engine.choose_element(&mut hero, EquipSlot::Accessory, Element::Fire),
            Err(EngineError::SlotEmpty(EquipSlot::Accessory))
        );

        engine.equip_item(&mut hero, "cats_eye_pendant", None).unwrap();
        assert_eq!(
            engine.choose_element(&mut hero, EquipSlot::Accessory, Element::Fire),
            Err(EngineError::NoElementalChoice {
                item: "cats_eye_pendant".to_string()
            })
        );

        engine.equip_item(&mut hero, "twin_soul_talisman", None).unwrap();
        assert_eq!(
            engine.choose_element(&mut hero, EquipSlot::Accessory, Element::Fire),
            Err(EngineError::WrongChoiceVariant {
                item: "twin_soul_talisman".to_string()
            })
        );
        assert_eq!(
            engine.choose_dual_elements(
                &mut hero,
                EquipSlot::Accessory,
                Element::Fire,
                Element::Fire
            ),
            Err(EngineError::DuplicateElement)
        );
    }

    // ------------------------------------------------------------------
    // Status effects
    // ------------------------------------------------------------------

    #[test]
    fn test_add_unknown_status_effect_fails() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        assert_eq!(
            engine.add_status_effect(&mut hero, "no_such_effect", None, None, None),
            Err(EngineError::UnknownStatusEffect("no_such_effect".to_string()))
        );
    }

    #[test]
    fn test_non_stackable_effect_replaced_unconditionally() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine
            .add_status_effect(&mut hero, "burn", Some(4), Some(1), None)
            .unwrap();
        engine
            .add_status_effect(&mut hero, "burn", Some(9), Some(2), None)
            .unwrap();

        let burns: Vec<_> = hero.status_effects.iter().filter(|e| e.id == "burn").collect();
        assert_eq!(burns.len(), 1);
        assert_eq!(burns[0].duration, 9);
        assert_eq!(burns[0].potency, 2);
    }

    #[test]
    fn test_burn_ticks_and_expires() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        let start_hp = hero.hp;
        engine
            .add_status_effect(&mut hero, "burn", Some(4), Some(1), None)
            .unwrap();

        engine.process_status_effects(&mut hero);
        assert_eq!(hero.hp, start_hp - 1);
        assert_eq!(hero.status_effect("burn").unwrap().duration, 3);

        for _ in 0..3 {
            engine.process_status_effects(&mut hero);
        }
        assert!(!hero.has_status_effect("burn"));
        assert_eq!(hero.hp, start_hp - 4);
    }

    #[test]
    fn test_damage_over_time_floors_at_zero() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        hero.hp = 2;
        engine
            .add_status_effect(&mut hero, "burn", Some(3), Some(5), None)
            .unwrap();
        engine.process_status_effects(&mut hero);
        assert_eq!(hero.hp, 0);
    }

    #[test]
    fn test_heal_over_time_caps_at_max() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        hero.hp = hero.max_hp - 1;
        engine
            .add_status_effect(&mut hero, "health_regen", Some(5), Some(10), None)
            .unwrap();
        engine.process_status_effects(&mut hero);
        assert_eq!(hero.hp, hero.max_hp);
    }

    #[test]
    fn test_durations_decrement_uniformly() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine
            .add_status_effect(&mut hero, "slow", Some(3), None, None)
            .unwrap();
        engine
            .add_status_effect(&mut hero, "night_vision", None, None, None)
            .unwrap();

        engine.process_status_effects(&mut hero);
        assert_eq!(hero.status_effect("slow").unwrap().duration, 2);
        assert_eq!(
            hero.status_effect("night_vision").unwrap().duration,
            PERMANENT_DURATION - 1
        );
    }

    // ------------------------------------------------------------------
    // Consumables
    // ------------------------------------------------------------------

    #[test]
    fn test_heal_consumable_caps_at_max() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        hero.hp = hero.max_hp - 5;
        engine.add_item(&mut hero, "minor_healing_potion", 1).unwrap();
        engine.use_consumable(&mut hero, "minor_healing_potion").unwrap();
        assert_eq!(hero.hp, hero.max_hp);
        assert!(!hero.inventory.contains("minor_healing_potion"));
    }

    #[test]
    fn test_use_consumable_rejects_non_consumables() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "iron_sword", 1).unwrap();
        engine.add_item(&mut hero, "trail_biscuit", 1).unwrap();

        assert_eq!(
            engine.use_consumable(&mut hero, "iron_sword"),
            Err(EngineError::NotConsumable {
                item: "iron_sword".to_string()
            })
        );
        // Food with no effect is not consumable-class either.
        assert_eq!(
            engine.use_consumable(&mut hero, "trail_biscuit"),
            Err(EngineError::NotConsumable {
                item: "trail_biscuit".to_string()
            })
        );
    }

    #[test]
    fn test_temp_strength_buff_uses_item_amount() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine.add_item(&mut hero, "ogre_strength_potion", 1).unwrap();
        engine.use_consumable(&mut hero, "ogre_strength_potion").unwrap();

        let boost = hero.status_effect("strength_boost").unwrap();
        assert_eq!(boost.duration, 10);
        assert_eq!(boost.stat_modifiers.get(&Stat::Strength), Some(&5));
        assert_eq!(engine.get_status_effect_bonuses(&hero).strength, 5);
    }

    #[test]
    fn test_health_regen_consumable() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        hero.hp = 10;
        engine.add_item(&mut hero, "regen_salve", 1).unwrap();
        engine.use_consumable(&mut hero, "regen_salve").unwrap();

        let regen = hero.status_effect("health_regen").unwrap();
        assert_eq!(regen.duration, 5);
        assert_eq!(regen.potency, 2);

        engine.process_status_effects(&mut hero);
        assert_eq!(hero.hp, 12);
    }

    #[test]
    fn test_full_heal_and_cleanse() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        hero.hp = 1;
        hero.mp = 0;
        hero.stamina = 2;
        engine
            .add_status_effect(&mut hero, "poison", None, None, None)
            .unwrap();
        engine
            .add_status_effect(&mut hero, "bleed", None, None, None)
            .unwrap();
        engine
            .add_status_effect(&mut hero, "curse", None, None, None)
            .unwrap();
        engine
            .add_status_effect(&mut hero, "weakness", None, None, None)
            .unwrap();
        engine
            .add_status_effect(&mut hero, "burn", None, None, None)
            .unwrap();

        engine.add_item(&mut hero, "elixir_of_renewal", 1).unwrap();
        engine.use_consumable(&mut hero, "elixir_of_renewal").unwrap();

        assert_eq!(hero.hp, hero.max_hp);
        assert_eq!(hero.mp, hero.max_mp);
        assert_eq!(hero.stamina, hero.max_stamina);
        for cleansed in ["poison", "bleed", "curse", "weakness"] {
            assert!(!hero.has_status_effect(cleansed), "{cleansed} should be gone");
        }
        // Burn is not on the cleanse list.
        assert!(hero.has_status_effect("burn"));
    }

    #[test]
    fn test_cure_poison_strips_poison_only() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        engine
            .add_status_effect(&mut hero, "poison", None, None, None)
            .unwrap();
        engine
            .add_status_effect(&mut hero, "burn", None, None, None)
            .unwrap();

        engine.add_item(&mut hero, "antidote", 1).unwrap();
        engine.use_consumable(&mut hero, "antidote").unwrap();
        assert!(!hero.has_status_effect("poison"));
        assert!(hero.has_status_effect("burn"));
    }

    #[test]
    fn test_stat_food_routes_hp_directly() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        let (hp, max_hp) = (hero.hp, hero.max_hp);
        engine.add_item(&mut hero, "hearty_stew", 1).unwrap();
        engine.use_consumable(&mut hero, "hearty_stew").unwrap();

        // HP rises directly, both current and maximum.
        assert_eq!(hero.max_hp, max_hp + 5);
        assert_eq!(hero.hp, hp + 5);
        // Strength arrives as a timed buff with the food's amount.
        let boost = hero.status_effect("strength_boost").unwrap();
        assert_eq!(boost.duration, 15);
        assert_eq!(boost.stat_modifiers.get(&Stat::Strength), Some(&2));
    }

    #[test]
    fn test_informational_consumables_are_noops() {
        let (engine, _) = engine();
        let mut hero = sample_character("Hero");
        let snapshot = hero.clone();
        engine.add_item(&mut hero, "barrier_scroll", 1).unwrap();
        engine.use_consumable(&mut hero, "barrier_scroll").unwrap();

        assert!(!hero.inventory.contains("barrier_scroll"));
        assert_eq!(hero.status_effects, snapshot.status_effects);
        assert_eq!(hero.hp, snapshot.hp);
    }

    // ------------------------------------------------------------------
    // Resolution and persistence
    // ------------------------------------------------------------------

    #[test]
    fn test_effective_stats_clamped() {
        let (engine, _) = engine();
        let hero = Character::builder("Hero").stat(Stat::Strength, 20_000).build();
        let effective = engine.get_effective_stats(&hero);
        assert_eq!(effective.strength, crate::stats::STAT_MAX);
    }

    #[test]
    fn test_successful_operations_persist_once() {
        let (engine, store) = engine();
        let mut hero = sample_adventurer("Hero");

        engine.add_item(&mut hero, "iron_ore", 1).unwrap();
        assert_eq!(store.count(), 1);

        engine.equip_item(&mut hero, "iron_sword", None).unwrap();
        assert_eq!(store.count(), 2);

        engine.process_status_effects(&mut hero);
        assert_eq!(store.count(), 3);

        let last = store.last().unwrap();
        assert_eq!(last.equipped.primary_weapon.as_ref().unwrap().id, "iron_sword");
    }

    #[test]
    fn test_failed_operations_do_not_persist() {
        let (engine, store) = engine();
        let mut hero = sample_character("Hero");

        let _ = engine.add_item(&mut hero, "no_such_item", 1);
        let _ = engine.remove_item(&mut hero, "iron_ore", 1);
        let _ = engine.unequip_item(&mut hero, EquipSlot::Armor);
        let _ = engine.use_consumable(&mut hero, "iron_sword");
        assert_eq!(store.count(), 0);
    }
}
