//! Elemental affinity tables.
//!
//! Elements govern the resistance/weakness status effects granted by
//! equipment and by player elemental choices. The opposition table decides
//! which weakness a chosen resistance drags along with it.

use serde::{Deserialize, Serialize};

/// The eight elements of the game world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Fire,
    Water,
    Ice,
    Lightning,
    Earth,
    Wind,
    Light,
    Dark,
}

impl Element {
    pub fn id(&self) -> &'static str {
        match self {
            Element::Fire => "fire",
            Element::Water => "water",
            Element::Ice => "ice",
            Element::Lightning => "lightning",
            Element::Earth => "earth",
            Element::Wind => "wind",
            Element::Light => "light",
            Element::Dark => "dark",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Element::Fire => "Fire",
            Element::Water => "Water",
            Element::Ice => "Ice",
            Element::Lightning => "Lightning",
            Element::Earth => "Earth",
            Element::Wind => "Wind",
            Element::Light => "Light",
            Element::Dark => "Dark",
        }
    }

    pub fn all() -> [Element; 8] {
        [
            Element::Fire,
            Element::Water,
            Element::Ice,
            Element::Lightning,
            Element::Earth,
            Element::Wind,
            Element::Light,
            Element::Dark,
        ]
    }

    /// The opposing element, as used to derive the automatic weakness when a
    /// resistance element is chosen.
    ///
    /// The table is intentionally asymmetric: wind opposes lightning while
    /// earth opposes wind. This mirrors the shipped content tables and must
    /// not be "fixed" without a content change.
    pub fn opposite(&self) -> Element {
        match self {
            Element::Fire => Element::Water,
            Element::Water => Element::Fire,
            Element::Ice => Element::Lightning,
            Element::Lightning => Element::Earth,
            Element::Earth => Element::Wind,
            Element::Wind => Element::Lightning,
            Element::Light => Element::Dark,
            Element::Dark => Element::Light,
        }
    }

    /// The second weakness granted by immunity-class items, on top of the
    /// opposing-element weakness.
    pub fn second_weakness(&self) -> Element {
        match self {
            Element::Fire => Element::Ice,
            Element::Ice => Element::Fire,
            Element::Lightning => Element::Earth,
            Element::Earth => Element::Lightning,
            Element::Water => Element::Wind,
            Element::Wind => Element::Water,
            Element::Light => Element::Dark,
            Element::Dark => Element::Light,
        }
    }

    /// Status-effect id of this element's resistance, e.g. `fire_resistance`.
    pub fn resistance_effect_id(&self) -> String {
        format!("{}_resistance", self.id())
    }

    /// Status-effect id of this element's weakness, e.g. `fire_weakness`.
    pub fn weakness_effect_id(&self) -> String {
        format!("{}_weakness", self.id())
    }
}

/// A player's recorded elemental choice for a choice-class item.
///
/// Stored per character and stamped onto the equipped copy of the item, so
/// re-equipping the item reproduces the derived status effects without
/// asking the player again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementalChoice {
    /// One element chosen for resistance; the opposing element becomes a
    /// weakness. Used by both plain-attunement and immunity items (the item
    /// decides the potencies when the effects are derived).
    Resistance {
        resistance: Element,
        weakness: Element,
    },
    /// Dual-mastery items: one element for immunity, a second for plain
    /// resistance.
    Dual {
        immunity: Element,
        resistance: Element,
    },
}
