//! Composable item modifiers.
//!
//! A modifier is a tagged variant (`{"type": tag, ...payload}`) that can
//! rename an item, extend its description, contribute stats or govern equip
//! and stacking behavior. Capabilities are dispatched with a plain `match`,
//! so adding a variant forces every capability to be considered.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::{
    ENCHANTED_BOOK_GROUP, PRIORITY_DEFAULT, PRIORITY_ENHANCER, PRIORITY_SPECIAL, PRIORITY_STARS,
};
use crate::equipment::EquipSlot;

pub mod canonical;
pub mod registry;

pub use canonical::{canonical_hash, canonicalize};
pub use registry::{ModifierError, ModifierFactory, ModifierRegistry};

/// Reforge groups are short lists; keep them inline.
pub type GroupList = SmallVec<[String; 4]>;

/// Additive change to a single stat key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatDelta {
    pub stat: String,
    pub amount: f64,
}

impl StatDelta {
    #[must_use]
    pub fn new(stat: &str, amount: f64) -> Self {
        Self {
            stat: stat.to_string(),
            amount,
        }
    }
}

/// A single enchant entry carried by an [`Enchantment`] modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enchant {
    pub name: String,
    pub level: u32,
    pub max_level: u32,
    #[serde(default)]
    pub applies_to: GroupList,
}

impl Enchant {
    /// Whether this enchant may be newly added to an item in `group`.
    #[must_use]
    pub fn applies_to_group(&self, group: Option<&str>) -> bool {
        match group {
            Some(ENCHANTED_BOOK_GROUP) => true,
            Some(group) => self.applies_to.iter().any(|g| g == group),
            None => false,
        }
    }

    /// Display label, e.g. `Sharpness III`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.name, roman(self.level))
    }
}

/// Equip slot granted to the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equippable {
    pub slot: EquipSlot,
}

/// Stack capacity and the number of units held by this entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stackable {
    pub stack: u32,
    pub amount: u32,
}

impl Stackable {
    /// Capacity, never below one.
    #[must_use]
    pub fn cap(&self) -> u32 {
        self.stack.max(1)
    }

    /// Units that can still be added before the stack is full.
    #[must_use]
    pub fn spare(&self) -> u32 {
        self.cap().saturating_sub(self.amount)
    }
}

/// Applied reforge: a name prefix and a set of stat deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reforge {
    pub reforge_name: String,
    #[serde(default)]
    pub stats: Vec<StatDelta>,
}

/// Marks which reforge/enchant pool the item belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reforgeable {
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stars {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enchantment {
    pub enchants: Vec<Enchant>,
}

/// Consumable effect applied onto other items through enhancement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enhancer {
    pub enhances_groups: GroupList,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

impl Enhancer {
    #[must_use]
    pub fn enhances(&self, group: &str) -> bool {
        self.enhances_groups.iter().any(|g| g == group)
    }
}

/// Fixed bonus with a name prefix, e.g. event or boss-drop variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Special {
    pub name_prefix: String,
    #[serde(default)]
    pub stats: Vec<StatDelta>,
}

/// Polymorphic item modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Modifier {
    Equippable(Equippable),
    Stackable(Stackable),
    Reforge(Reforge),
    Reforgeable(Reforgeable),
    Stars(Stars),
    Enchantment(Enchantment),
    Enhancer(Enhancer),
    Special(Special),
}

/// Type tag of a [`Modifier`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Equippable,
    Stackable,
    Reforge,
    Reforgeable,
    Stars,
    Enchantment,
    Enhancer,
    Special,
}

impl ModifierKind {
    pub const ALL: [Self; 8] = [
        Self::Equippable,
        Self::Stackable,
        Self::Reforge,
        Self::Reforgeable,
        Self::Stars,
        Self::Enchantment,
        Self::Enhancer,
        Self::Special,
    ];

    /// Wire tag used in raw specs and canonical hashes.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Equippable => "equippable",
            Self::Stackable => "stackable",
            Self::Reforge => "reforge",
            Self::Reforgeable => "reforgeable",
            Self::Stars => "stars",
            Self::Enchantment => "enchantment",
            Self::Enhancer => "enhancer",
            Self::Special => "special",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Override-by-type kinds hold at most one instance per item; a player
    /// override replaces the catalog default. Enchantment and Enhancer
    /// accumulate instead.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        !matches!(self, Self::Enchantment | Self::Enhancer)
    }
}

impl Modifier {
    #[must_use]
    pub const fn kind(&self) -> ModifierKind {
        match self {
            Self::Equippable(_) => ModifierKind::Equippable,
            Self::Stackable(_) => ModifierKind::Stackable,
            Self::Reforge(_) => ModifierKind::Reforge,
            Self::Reforgeable(_) => ModifierKind::Reforgeable,
            Self::Stars(_) => ModifierKind::Stars,
            Self::Enchantment(_) => ModifierKind::Enchantment,
            Self::Enhancer(_) => ModifierKind::Enhancer,
            Self::Special(_) => ModifierKind::Special,
        }
    }

    /// Layering key for name and description transforms.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        match self {
            Self::Special(_) => PRIORITY_SPECIAL,
            Self::Enhancer(_) => PRIORITY_ENHANCER,
            Self::Stars(_) => PRIORITY_STARS,
            _ => PRIORITY_DEFAULT,
        }
    }

    /// Transform the running display name, or `None` to leave it untouched.
    #[must_use]
    pub fn modify_name(&self, name: &str) -> Option<String> {
        match self {
            Self::Reforge(reforge) => Some(format!("{} {name}", reforge.reforge_name)),
            Self::Special(special) => Some(format!("{} {name}", special.name_prefix)),
            Self::Stars(stars) if stars.count > 0 => Some(format!("{name} ✪{}", stars.count)),
            _ => None,
        }
    }

    /// Transform the running description, or `None` to leave it untouched.
    #[must_use]
    pub fn modify_description(&self, description: &str) -> Option<String> {
        match self {
            Self::Enchantment(enchantment) if !enchantment.enchants.is_empty() => {
                let mut lines = vec![description.to_string()];
                lines.extend(enchantment.enchants.iter().map(Enchant::label));
                Some(join_lines(&lines))
            }
            Self::Enhancer(enhancer) => {
                let groups: Vec<&str> = enhancer.enhances_groups.iter().map(String::as_str).collect();
                let mut lines = vec![
                    description.to_string(),
                    format!("Applies to: {}", groups.join(", ")),
                ];
                lines.extend(enhancer.modifiers.iter().map(Self::effect_summary));
                Some(join_lines(&lines))
            }
            _ => None,
        }
    }

    /// Stat deltas contributed by this modifier.
    #[must_use]
    pub fn stat_changes(&self) -> &[StatDelta] {
        match self {
            Self::Reforge(reforge) => &reforge.stats,
            Self::Special(special) => &special.stats,
            _ => &[],
        }
    }

    /// Canonical, order-independent identity string.
    #[must_use]
    pub fn hash(&self) -> String {
        canonical_hash(self)
    }

    /// Raw JSON spec (`{"type": tag, ...}`) for this modifier.
    #[must_use]
    pub fn to_spec(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// One-line summary used when this modifier is carried by an enhancer.
    #[must_use]
    pub fn effect_summary(&self) -> String {
        match self {
            Self::Stars(stars) => format!("+{} Stars", stars.count),
            Self::Reforge(_) => "Removes reforge".to_string(),
            Self::Enchantment(enchantment) => {
                let labels: Vec<String> = enchantment.enchants.iter().map(Enchant::label).collect();
                format!("Grants {}", labels.join(", "))
            }
            Self::Special(special) => format!("Grants {} bonus", special.name_prefix),
            other => format!("Grants {}", other.kind().tag()),
        }
    }

    /// Every kind used by this modifier, including nested enhancer payloads.
    #[must_use]
    pub fn kinds(&self) -> Vec<ModifierKind> {
        let mut kinds = vec![self.kind()];
        if let Self::Enhancer(enhancer) = self {
            for nested in &enhancer.modifiers {
                kinds.extend(nested.kinds());
            }
        }
        kinds
    }
}

fn join_lines(lines: &[String]) -> String {
    lines
        .iter()
        .filter(|line| !line.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn roman(level: u32) -> String {
    const NUMERALS: [&str; 10] = ["I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X"];
    usize::try_from(level)
        .ok()
        .and_then(|l| l.checked_sub(1))
        .and_then(|idx| NUMERALS.get(idx))
        .map_or_else(|| level.to_string(), |n| (*n).to_string())
}
