//! Effective-stat resolution.
//!
//! Effective stats are derived on demand and never stored: base attributes
//! plus equipment bonuses plus status-effect bonuses plus skill bonuses,
//! clamped per stat. Status effects contribute to the six combat stats
//! only — HP and stamina flow through the max-pool recompute instead.

use crate::character::{Character, Stat, Stats};

/// Lower clamp for any effective stat.
pub const STAT_MIN: i32 = -999;
/// Upper clamp for any effective stat.
pub const STAT_MAX: i32 = 9999;

/// Sum of `stat_modifiers` across every active status effect, over the full
/// eight-stat set (zero where nothing contributes).
pub fn status_effect_bonuses(character: &Character) -> Stats {
    let mut bonuses = Stats::zero();
    for effect in &character.status_effects {
        for (&stat, &delta) in &effect.stat_modifiers {
            bonuses.add(stat, delta);
        }
    }
    bonuses
}

/// Resolve the character's effective stats.
///
/// `skill_bonuses` comes from the injected provider; the engine's
/// `get_effective_stats` supplies it. Base stats are never mutated.
pub fn effective_stats(character: &Character, skill_bonuses: &Stats) -> Stats {
    let status = status_effect_bonuses(character);
    let mut effective = Stats::zero();
    for stat in Stat::all() {
        let mut value = character.stats.get(stat)
            + character.equipment_bonuses.get(stat)
            + skill_bonuses.get(stat);
        // HP and stamina pools are governed by the max-pool recompute;
        // status effects never feed them here.
        if !matches!(stat, Stat::Hp | Stat::Stamina) {
            value += status.get(stat);
        }
        effective.set(stat, value.clamp(STAT_MIN, STAT_MAX));
    }
    effective
}
