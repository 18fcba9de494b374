//! Static item catalog and runtime item instances.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::equipment::EquipSlot;
use crate::modifiers::{
    Enchantment, Modifier, ModifierError, ModifierKind, ModifierRegistry, Stackable,
};
use crate::stats::StatTable;

/// Item rarity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
    Special,
}

/// Lookup failures against the item catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown item id `{0}`")]
    UnknownItem(String),
}

/// Raw catalog entry as it appears in content documents.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItemDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub base_stats: StatTable,
    #[serde(default)]
    pub modifiers: Vec<Value>,
}

/// Immutable item template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rarity: Rarity,
    pub icon: Option<String>,
    pub base_stats: StatTable,
    /// Built-in modifiers every fresh instance starts with.
    pub modifiers: Vec<Modifier>,
}

impl CatalogItem {
    /// Build a catalog entry, instantiating its default modifiers through `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error when any default modifier spec cannot be instantiated.
    pub fn from_document(
        doc: CatalogItemDocument,
        registry: &ModifierRegistry,
    ) -> Result<Self, ModifierError> {
        let modifiers = doc
            .modifiers
            .iter()
            .map(|spec| registry.instantiate(spec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            rarity: doc.rarity,
            icon: doc.icon,
            base_stats: doc.base_stats,
            modifiers,
        })
    }

    /// Hashes of the built-in modifiers.
    #[must_use]
    pub fn default_hashes(&self) -> BTreeSet<String> {
        self.modifiers.iter().map(Modifier::hash).collect()
    }
}

/// Id-keyed catalog of item templates.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: HashMap<String, CatalogItem>,
}

impl ItemCatalog {
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.id.clone(), item))
                .collect(),
        }
    }

    /// Find a template by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownItem`] when `id` is not in the catalog.
    pub fn get(&self, id: &str) -> Result<&CatalogItem, CatalogError> {
        self.items
            .get(id)
            .ok_or_else(|| CatalogError::UnknownItem(id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.items.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Hydrate a fresh instance carrying the template's default modifiers.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownItem`] when `id` is not in the catalog.
    pub fn instantiate(&self, id: &str) -> Result<ItemInstance, CatalogError> {
        self.get(id).map(ItemInstance::from_catalog)
    }
}

/// Runtime-only identity. Fresh on every hydration; never persisted and never
/// meaningful across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemUid(u64);

impl ItemUid {
    #[must_use]
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A concrete item held by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInstance {
    #[serde(skip_deserializing, default = "ItemUid::fresh")]
    pub uid: ItemUid,
    pub catalog_id: String,
    pub modifiers: Vec<Modifier>,
}

impl ItemInstance {
    #[must_use]
    pub fn from_catalog(item: &CatalogItem) -> Self {
        Self {
            uid: ItemUid::fresh(),
            catalog_id: item.id.clone(),
            modifiers: item.modifiers.clone(),
        }
    }

    /// First modifier of `kind`.
    #[must_use]
    pub fn modifier(&self, kind: ModifierKind) -> Option<&Modifier> {
        self.modifiers.iter().find(|m| m.kind() == kind)
    }

    #[must_use]
    pub fn has(&self, kind: ModifierKind) -> bool {
        self.modifier(kind).is_some()
    }

    #[must_use]
    pub fn stackable(&self) -> Option<&Stackable> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Stackable(stack) => Some(stack),
            _ => None,
        })
    }

    /// Units represented by this entry; non-stackable items count as one.
    #[must_use]
    pub fn amount(&self) -> u32 {
        self.stackable().map_or(1, |stack| stack.amount)
    }

    #[must_use]
    pub fn stars(&self) -> u32 {
        self.modifiers
            .iter()
            .find_map(|m| match m {
                Modifier::Stars(stars) => Some(stars.count),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Current reforge group, from the Reforgeable modifier.
    #[must_use]
    pub fn reforge_group(&self) -> Option<&str> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Reforgeable(r) => Some(r.group.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn equip_slot(&self) -> Option<EquipSlot> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Equippable(e) => Some(e.slot),
            _ => None,
        })
    }

    #[must_use]
    pub fn enchantment(&self) -> Option<&Enchantment> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Enchantment(e) => Some(e),
            _ => None,
        })
    }

    /// Insert `modifier`, replacing any existing modifier of the same kind
    /// when that kind is override-by-type. Accumulating kinds are appended.
    pub fn set_modifier(&mut self, modifier: Modifier) {
        let kind = modifier.kind();
        if kind.is_exclusive()
            && let Some(slot) = self.modifiers.iter_mut().find(|m| m.kind() == kind)
        {
            *slot = modifier;
            return;
        }
        self.modifiers.push(modifier);
    }

    /// Builder form of [`Self::set_modifier`].
    #[must_use]
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.set_modifier(modifier);
        self
    }

    /// Drop every modifier of `kind`.
    pub fn remove_kind(&mut self, kind: ModifierKind) {
        self.modifiers.retain(|m| m.kind() != kind);
    }

    /// Copy of this entry holding `amount` units. Non-stackable items are
    /// returned unchanged.
    #[must_use]
    pub fn with_amount(mut self, amount: u32) -> Self {
        for modifier in &mut self.modifiers {
            if let Modifier::Stackable(stack) = modifier {
                stack.amount = amount;
            }
        }
        self
    }

    /// Copy with a fresh runtime uid, for splitting one entry into many.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            uid: ItemUid::fresh(),
            ..self.clone()
        }
    }

    /// Canonical hashes of every modifier on this instance.
    #[must_use]
    pub fn modifier_hashes(&self) -> BTreeSet<String> {
        self.modifiers.iter().map(Modifier::hash).collect()
    }
}
