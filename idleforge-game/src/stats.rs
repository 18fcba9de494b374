//! Stat resolution per item and across equipment.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{CatalogError, ItemCatalog, ItemInstance};
use crate::equipment::Equipment;
use crate::modifiers::ModifierKind;

/// Stat key → value.
pub type StatTable = BTreeMap<String, f64>;

/// Resolved contributions to one stat on one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatLine {
    pub base: f64,
    /// Non-reforge modifier contributions.
    pub modifier_total: f64,
    /// Reforge contributions, kept apart for display.
    pub reforge_total: f64,
}

impl StatLine {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.base + self.modifier_total + self.reforge_total
    }
}

/// Per-item stat breakdown keyed by stat.
pub type ItemStats = BTreeMap<String, StatLine>;

/// Resolve every stat referenced by the item's base stats or modifiers.
///
/// # Errors
///
/// Returns [`CatalogError::UnknownItem`] when the item's template is missing.
pub fn compute_item_stats(
    item: &ItemInstance,
    catalog: &ItemCatalog,
) -> Result<ItemStats, CatalogError> {
    let template = catalog.get(&item.catalog_id)?;
    let mut stats: ItemStats = template
        .base_stats
        .iter()
        .map(|(stat, base)| {
            (
                stat.clone(),
                StatLine {
                    base: *base,
                    ..StatLine::default()
                },
            )
        })
        .collect();

    for modifier in &item.modifiers {
        let is_reforge = modifier.kind() == ModifierKind::Reforge;
        for delta in modifier.stat_changes() {
            let line = stats.entry(delta.stat.clone()).or_default();
            if is_reforge {
                line.reforge_total += delta.amount;
            } else {
                line.modifier_total += delta.amount;
            }
        }
    }
    Ok(stats)
}

/// Global base table plus every equipped item's contributions.
///
/// Only keys already present in `global_base` are touched. Equipped items
/// whose template is missing are skipped.
#[must_use]
pub fn get_modified_stats(
    global_base: &StatTable,
    equipment: &Equipment,
    catalog: &ItemCatalog,
) -> StatTable {
    let mut resolved = global_base.clone();
    for item in equipment.items() {
        let item_stats = match compute_item_stats(item, catalog) {
            Ok(stats) => stats,
            Err(err) => {
                log::warn!("skipping equipped item in stat resolution: {err}");
                continue;
            }
        };
        for (stat, line) in item_stats {
            if let Some(value) = resolved.get_mut(&stat) {
                *value += line.total();
            }
        }
    }
    resolved
}
