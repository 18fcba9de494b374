//! Persisted item form.
//!
//! A [`DbItem`] stores only the modifiers that differ from the catalog
//! template, so storage grows with player customization rather than with item
//! complexity.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::catalog::{CatalogError, ItemInstance};
use crate::constants::ENCHANTED_BOOK_GROUP;
use crate::content::Content;
use crate::enhance::combine_enchantments;
use crate::inventory::Inventory;
use crate::modifiers::{Enchantment, Modifier, ModifierError, ModifierKind};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    UnknownItem(#[from] CatalogError),
    #[error(transparent)]
    Modifier(#[from] ModifierError),
}

/// Persisted item: catalog id plus the canonical hashes of every modifier
/// not already supplied by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbItem {
    pub id: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// A persisted record that could not be hydrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadIssue {
    pub index: usize,
    pub id: String,
    pub reason: String,
}

/// Diff `item` against its catalog template. Hashes are sorted.
///
/// # Errors
///
/// Returns [`CodecError::UnknownItem`] when the template is missing.
pub fn encode_db_item(item: &ItemInstance, content: &Content) -> Result<DbItem, CodecError> {
    let template = content.items.get(&item.catalog_id)?;
    let defaults = template.default_hashes();
    let modifiers = item
        .modifier_hashes()
        .into_iter()
        .filter(|hash| !defaults.contains(hash))
        .collect();
    Ok(DbItem {
        id: item.catalog_id.clone(),
        modifiers,
    })
}

/// Hydrate a persisted item onto a fresh copy of its template.
///
/// Override-by-type modifiers replace the template's modifier of that type.
/// Persisted enchantments merge by name keeping the higher level; other
/// accumulating modifiers are added unless an identical one is present.
///
/// # Errors
///
/// Returns [`CodecError::UnknownItem`] for an unknown catalog id and
/// [`CodecError::Modifier`] for any hash the registry cannot rebuild.
pub fn load_db_item(db: &DbItem, content: &Content) -> Result<ItemInstance, CodecError> {
    let mut item = content.items.instantiate(&db.id)?;
    let decoded = db
        .modifiers
        .iter()
        .map(|hash| content.registry.from_hash(hash))
        .collect::<Result<Vec<_>, _>>()?;

    let (exclusive, accumulating): (Vec<_>, Vec<_>) =
        decoded.into_iter().partition(|m| m.kind().is_exclusive());
    for modifier in exclusive {
        item.set_modifier(modifier);
    }
    for modifier in accumulating {
        match modifier {
            Modifier::Enchantment(persisted) => merge_enchantment(&mut item, &persisted),
            other => {
                let hash = other.hash();
                if !item.modifiers.iter().any(|m| m.hash() == hash) {
                    item.modifiers.push(other);
                }
            }
        }
    }
    Ok(item)
}

fn merge_enchantment(item: &mut ItemInstance, persisted: &Enchantment) {
    // persisted enchants already passed the group check when applied
    let current = item
        .enchantment()
        .map(|e| e.enchants.clone())
        .unwrap_or_default();
    let enchants = combine_enchantments(&current, &persisted.enchants, Some(ENCHANTED_BOOK_GROUP));
    item.remove_kind(ModifierKind::Enchantment);
    item.modifiers.push(Modifier::Enchantment(Enchantment { enchants }));
}

/// Hydrate a whole persisted inventory. Records that fail are skipped,
/// logged and reported.
#[must_use]
pub fn load_inventory(records: &[DbItem], content: &Content) -> (Inventory, Vec<LoadIssue>) {
    let mut items = Vec::with_capacity(records.len());
    let mut issues = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match load_db_item(record, content) {
            Ok(item) => items.push(item),
            Err(err) => {
                log::warn!("skipping stored item #{index} (`{}`): {err}", record.id);
                issues.push(LoadIssue {
                    index,
                    id: record.id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    (Inventory::from_items(items), issues)
}

/// Encode every entry of `inventory`, in order.
///
/// # Errors
///
/// Fails on the first entry whose template is missing.
pub fn encode_inventory(inventory: &Inventory, content: &Content) -> Result<Vec<DbItem>, CodecError> {
    inventory
        .items()
        .iter()
        .map(|item| encode_db_item(item, content))
        .collect()
}

/// Logical identity of an item: xxHash64 over the catalog id and the sorted
/// modifier hashes. Stable across hydrations, unlike the runtime uid.
#[must_use]
pub fn item_fingerprint(item: &ItemInstance) -> u64 {
    let hashes: BTreeSet<String> = item.modifier_hashes();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(item.catalog_id.as_bytes());
    for hash in &hashes {
        hasher.write(&[0x1f]);
        hasher.write(hash.as_bytes());
    }
    hasher.finish()
}
