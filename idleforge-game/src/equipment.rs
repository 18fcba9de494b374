//! Equipment slots and the fixed-key equipment map.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::catalog::ItemInstance;

/// Equip slot derived from an item's Equippable modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Head,
    Body,
    Legs,
    Feet,
    Weapon,
    Offhand,
    Necklace,
    Ring,
    Pickaxe,
    Axe,
    FishingRod,
}

impl EquipSlot {
    pub const ALL: [Self; 11] = [
        Self::Head,
        Self::Body,
        Self::Legs,
        Self::Feet,
        Self::Weapon,
        Self::Offhand,
        Self::Necklace,
        Self::Ring,
        Self::Pickaxe,
        Self::Axe,
        Self::FishingRod,
    ];
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EquipError {
    #[error("item `{0}` has no equip slot")]
    NotEquippable(String),
}

/// Slot → item map. Every slot key is always present; empty slots hold `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    slots: BTreeMap<EquipSlot, Option<ItemInstance>>,
}

impl Default for Equipment {
    fn default() -> Self {
        Self {
            slots: EquipSlot::ALL.into_iter().map(|slot| (slot, None)).collect(),
        }
    }
}

impl Equipment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `item` into the slot named by its Equippable modifier, returning
    /// whatever was displaced.
    ///
    /// # Errors
    ///
    /// Returns [`EquipError::NotEquippable`] when the item carries no slot.
    pub fn equip(&mut self, item: ItemInstance) -> Result<Option<ItemInstance>, EquipError> {
        let slot = item
            .equip_slot()
            .ok_or_else(|| EquipError::NotEquippable(item.catalog_id.clone()))?;
        Ok(self.slots.insert(slot, Some(item)).flatten())
    }

    /// Empty `slot`, returning its item.
    pub fn unequip(&mut self, slot: EquipSlot) -> Option<ItemInstance> {
        self.slots.get_mut(&slot).and_then(Option::take)
    }

    #[must_use]
    pub fn get(&self, slot: EquipSlot) -> Option<&ItemInstance> {
        self.slots.get(&slot).and_then(Option::as_ref)
    }

    /// Equipped items in slot order.
    pub fn items(&self) -> impl Iterator<Item = &ItemInstance> {
        self.slots.values().filter_map(Option::as_ref)
    }

    /// Every slot with its (possibly empty) content.
    pub fn slots(&self) -> impl Iterator<Item = (EquipSlot, Option<&ItemInstance>)> {
        self.slots.iter().map(|(slot, item)| (*slot, item.as_ref()))
    }
}
