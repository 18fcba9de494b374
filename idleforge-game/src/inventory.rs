//! Player inventory and stack merging.
//!
//! Every operation takes the inventory by value and returns the new one;
//! callers must thread the returned value forward.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{ItemInstance, ItemUid};
use crate::modifiers::Modifier;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("need {requested} x `{id}` but only {available} held")]
    Insufficient {
        id: String,
        requested: u64,
        available: u64,
    },
    #[error("no inventory entry with uid {0}")]
    MissingItem(u64),
}

/// Ordered list of item entries. Order drives stacking and display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    items: Vec<ItemInstance>,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_items(items: Vec<ItemInstance>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[ItemInstance] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<ItemInstance> {
        self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, uid: ItemUid) -> Option<&ItemInstance> {
        self.items.iter().find(|item| item.uid == uid)
    }

    /// Units held across every entry.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.amount())).sum()
    }

    /// Units held of catalog item `id`.
    #[must_use]
    pub fn count_items(&self, id: &str) -> u64 {
        self.items
            .iter()
            .filter(|item| item.catalog_id == id)
            .map(|item| u64::from(item.amount()))
            .sum()
    }

    /// Swap the entry with `uid` for `replacement`, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::MissingItem`] when no entry has `uid`.
    pub fn replace(mut self, uid: ItemUid, replacement: ItemInstance) -> Result<Self, InventoryError> {
        let slot = self
            .items
            .iter_mut()
            .find(|item| item.uid == uid)
            .ok_or(InventoryError::MissingItem(uid.get()))?;
        *slot = replacement;
        Ok(self)
    }
}

/// Merge `item` into `inventory`.
///
/// Non-stackable items are appended. Stackable items first top up existing
/// entries with the same catalog id, in order, then any remainder is appended
/// as new entries no larger than the item's own stack cap.
#[must_use]
pub fn try_stack_item_in_inventory(item: ItemInstance, inventory: Inventory) -> Inventory {
    let mut items = inventory.items;
    let Some(incoming) = item.stackable().cloned() else {
        items.push(item);
        return Inventory { items };
    };

    let mut remaining = incoming.amount;
    for entry in items
        .iter_mut()
        .filter(|entry| entry.catalog_id == item.catalog_id)
    {
        if remaining == 0 {
            break;
        }
        if let Some(stack) = entry.modifiers.iter_mut().find_map(|m| match m {
            Modifier::Stackable(stack) => Some(stack),
            _ => None,
        }) {
            let moved = stack.spare().min(remaining);
            stack.amount += moved;
            remaining -= moved;
        }
    }

    let cap = incoming.cap();
    while remaining > 0 {
        let portion = remaining.min(cap);
        items.push(item.duplicate().with_amount(portion));
        remaining -= portion;
    }
    Inventory { items }
}

/// Fold many items into `inventory`.
#[must_use]
pub fn add_items(
    inventory: Inventory,
    items: impl IntoIterator<Item = ItemInstance>,
) -> Inventory {
    items
        .into_iter()
        .fold(inventory, |inv, item| try_stack_item_in_inventory(item, inv))
}

/// Remove `amount` units of catalog item `id`, draining entries head-first.
///
/// # Errors
///
/// Returns [`InventoryError::Insufficient`] without touching anything when
/// fewer than `amount` units are held.
pub fn remove_items(inventory: Inventory, id: &str, amount: u64) -> Result<Inventory, InventoryError> {
    let available = inventory.count_items(id);
    if available < amount {
        return Err(InventoryError::Insufficient {
            id: id.to_string(),
            requested: amount,
            available,
        });
    }

    let mut outstanding = amount;
    let mut kept = Vec::with_capacity(inventory.items.len());
    for mut entry in inventory.items {
        if outstanding == 0 || entry.catalog_id != id {
            kept.push(entry);
            continue;
        }
        let held = u64::from(entry.amount());
        if held <= outstanding {
            outstanding -= held;
            continue;
        }
        let left = u32::try_from(held - outstanding).unwrap_or(u32::MAX);
        outstanding = 0;
        entry = entry.with_amount(left);
        kept.push(entry);
    }
    Ok(Inventory { items: kept })
}

/// Remove a single unit from the entry with `uid`.
///
/// # Errors
///
/// Returns [`InventoryError::MissingItem`] when no entry has `uid`.
pub fn consume_one(inventory: Inventory, uid: ItemUid) -> Result<Inventory, InventoryError> {
    let mut items = inventory.items;
    let index = items
        .iter()
        .position(|item| item.uid == uid)
        .ok_or(InventoryError::MissingItem(uid.get()))?;
    let held = items[index].amount();
    if held > 1 {
        let entry = items.remove(index).with_amount(held - 1);
        items.insert(index, entry);
    } else {
        items.remove(index);
    }
    Ok(Inventory { items })
}
