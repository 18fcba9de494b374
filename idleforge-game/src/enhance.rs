//! Enchantment combination, enhancer application and reforging.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::catalog::{ItemInstance, ItemUid};
use crate::constants::STAR_CAP;
use crate::inventory::{Inventory, InventoryError, consume_one};
use crate::modifiers::{Enchant, Enchantment, Enhancer, Modifier, ModifierKind, Reforge, Stars};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnhanceError {
    #[error("item `{0}` carries no enhancer")]
    NotAnEnhancer(String),
    #[error("enhancer does not apply to `{item}` (group {group:?})")]
    GroupMismatch { item: String, group: Option<String> },
    #[error("item `{0}` is not reforgeable")]
    NotReforgeable(String),
    #[error("no reforges defined for group `{0}`")]
    NoReforges(String),
    #[error("an item cannot enhance itself")]
    SameItem,
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// Reforges available per reforge group, loaded from content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReforgeTable {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<Reforge>>,
}

impl ReforgeTable {
    #[must_use]
    pub fn options(&self, group: &str) -> &[Reforge] {
        self.groups.get(group).map_or(&[], Vec::as_slice)
    }
}

/// Merge `incoming` enchants into `target`.
///
/// New enchants are added only when they apply to `group` (or the group is
/// the Enchanted Book sentinel). Existing enchants rise to the higher level,
/// never past their `max_level`; lower incoming levels are ignored.
#[must_use]
pub fn combine_enchantments(
    target: &[Enchant],
    incoming: &[Enchant],
    group: Option<&str>,
) -> Vec<Enchant> {
    let mut combined = target.to_vec();
    for enchant in incoming {
        if let Some(existing) = combined.iter_mut().find(|e| e.name == enchant.name) {
            let capped = enchant.level.min(existing.max_level);
            if capped > existing.level {
                existing.level = capped;
            }
        } else if enchant.applies_to_group(group) {
            let mut added = enchant.clone();
            added.level = added.level.min(added.max_level);
            combined.push(added);
        }
    }
    combined
}

/// Apply the combination rule to `item`'s enchantment modifier, creating one
/// when the item had none and something was accepted.
#[must_use]
pub fn enchant_item(mut item: ItemInstance, incoming: &[Enchant]) -> ItemInstance {
    let group = item.reforge_group().map(str::to_string);
    let current = item
        .enchantment()
        .map(|e| e.enchants.clone())
        .unwrap_or_default();
    let combined = combine_enchantments(&current, incoming, group.as_deref());
    if combined.is_empty() {
        return item;
    }
    let replacement = Modifier::Enchantment(Enchantment { enchants: combined });
    if let Some(slot) = item
        .modifiers
        .iter_mut()
        .find(|m| m.kind() == ModifierKind::Enchantment)
    {
        *slot = replacement;
    } else {
        item.modifiers.push(replacement);
    }
    item
}

/// Result of applying `enhancer_item` onto `target`. Neither input is touched.
///
/// # Errors
///
/// Returns [`EnhanceError::NotAnEnhancer`] when the source carries no enhancer
/// and [`EnhanceError::GroupMismatch`] when none of its enhancers applies to
/// the target's reforge group.
pub fn preview_enhance_item(
    target: &ItemInstance,
    enhancer_item: &ItemInstance,
) -> Result<ItemInstance, EnhanceError> {
    let enhancers: Vec<&Enhancer> = enhancer_item
        .modifiers
        .iter()
        .filter_map(|m| match m {
            Modifier::Enhancer(e) => Some(e),
            _ => None,
        })
        .collect();
    if enhancers.is_empty() {
        return Err(EnhanceError::NotAnEnhancer(enhancer_item.catalog_id.clone()));
    }

    let mismatch = || EnhanceError::GroupMismatch {
        item: target.catalog_id.clone(),
        group: target.reforge_group().map(str::to_string),
    };
    let group = target.reforge_group().ok_or_else(mismatch)?;
    let applicable: Vec<&Enhancer> = enhancers.into_iter().filter(|e| e.enhances(group)).collect();
    if applicable.is_empty() {
        return Err(mismatch());
    }

    let mut result = target.clone();
    for enhancer in applicable {
        for nested in &enhancer.modifiers {
            result = apply_nested(result, nested);
        }
    }
    Ok(result)
}

fn apply_nested(mut item: ItemInstance, nested: &Modifier) -> ItemInstance {
    match nested {
        Modifier::Stars(stars) => {
            let count = item.stars().saturating_add(stars.count).min(STAR_CAP);
            item.set_modifier(Modifier::Stars(Stars { count }));
            item
        }
        Modifier::Reforge(_) => {
            item.remove_kind(ModifierKind::Reforge);
            item
        }
        Modifier::Enchantment(enchantment) => enchant_item(item, &enchantment.enchants),
        other => item.with_modifier(other.clone()),
    }
}

/// Enhance the entry `target_uid` with one unit of `enhancer_uid`.
///
/// # Errors
///
/// Fails when either entry is missing, when both uids are the same entry, or
/// with any [`preview_enhance_item`] error.
pub fn enhance_in_inventory(
    inventory: Inventory,
    target_uid: ItemUid,
    enhancer_uid: ItemUid,
) -> Result<Inventory, EnhanceError> {
    if target_uid == enhancer_uid {
        return Err(EnhanceError::SameItem);
    }
    let target = inventory
        .get(target_uid)
        .ok_or(InventoryError::MissingItem(target_uid.get()))?;
    let enhancer = inventory
        .get(enhancer_uid)
        .ok_or(InventoryError::MissingItem(enhancer_uid.get()))?;
    let enhanced = preview_enhance_item(target, enhancer)?;
    let inventory = inventory.replace(target_uid, enhanced)?;
    Ok(consume_one(inventory, enhancer_uid)?)
}

/// Roll a new reforge for `item` from its group's table.
///
/// # Errors
///
/// Returns [`EnhanceError::NotReforgeable`] when the item has no reforge
/// group and [`EnhanceError::NoReforges`] when the group has no entries.
pub fn reforge_item<R: Rng + ?Sized>(
    item: &ItemInstance,
    table: &ReforgeTable,
    rng: &mut R,
) -> Result<ItemInstance, EnhanceError> {
    let group = item
        .reforge_group()
        .ok_or_else(|| EnhanceError::NotReforgeable(item.catalog_id.clone()))?;
    let choice = table
        .options(group)
        .choose(rng)
        .ok_or_else(|| EnhanceError::NoReforges(group.to_string()))?;
    Ok(item.clone().with_modifier(Modifier::Reforge(choice.clone())))
}
