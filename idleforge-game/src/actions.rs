//! Action catalog and per-repetition loot rolls.
use chrono::TimeDelta;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::catalog::{ItemCatalog, ItemInstance};
use crate::numbers::seconds_to_delta;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown action id `{0}`")]
    UnknownAction(String),
}

/// Parallel id/amount lists consumed per repetition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInputs {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub amounts: Vec<u32>,
}

impl ActionInputs {
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.ids.len() == self.amounts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.amounts.iter().copied())
    }
}

/// Possible output: `min..=max` copies of `id`, included with probability
/// `1 / chance` (absent or `<= 1` means guaranteed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChanceItem {
    pub id: String,
    #[serde(default = "default_amount")]
    pub min: u32,
    #[serde(default = "default_amount")]
    pub max: u32,
    #[serde(default)]
    pub chance: Option<f64>,
}

const fn default_amount() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutputs {
    #[serde(default)]
    pub items: Vec<ChanceItem>,
    #[serde(default)]
    pub xp: Option<u64>,
}

/// Content-defined crafting or gathering action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub inputs: ActionInputs,
    #[serde(default)]
    pub outputs: ActionOutputs,
    /// Duration of one repetition in seconds.
    pub time: f64,
    #[serde(default)]
    pub icon: Option<String>,
}

impl Action {
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        seconds_to_delta(self.time)
    }

    /// XP granted per repetition.
    #[must_use]
    pub fn xp(&self) -> u64 {
        self.outputs.xp.unwrap_or(0)
    }
}

/// Id-keyed catalog of actions.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    actions: HashMap<String, Action>,
}

impl ActionCatalog {
    #[must_use]
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            actions: actions
                .into_iter()
                .map(|action| (action.id.clone(), action))
                .collect(),
        }
    }

    /// Find an action by id.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnknownAction`] when `id` is not in the catalog.
    pub fn get(&self, id: &str) -> Result<&Action, ActionError> {
        self.actions
            .get(id)
            .ok_or_else(|| ActionError::UnknownAction(id.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions sorted by id.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self.actions.values().collect();
        actions.sort_by(|a, b| a.id.cmp(&b.id));
        actions
    }
}

/// Include roll for a chance item.
pub fn roll_chance<R: Rng + ?Sized>(chance: Option<f64>, rng: &mut R) -> bool {
    match chance {
        Some(chance) if chance > 1.0 => rng.r#gen::<f64>() < 1.0 / chance,
        _ => true,
    }
}

/// Roll one repetition's outputs. Each included entry yields a uniform
/// `min..=max` number of fresh catalog copies; unknown item ids are skipped.
pub fn complete_action<R: Rng + ?Sized>(
    action: &Action,
    items: &ItemCatalog,
    rng: &mut R,
) -> Vec<ItemInstance> {
    let mut produced = Vec::new();
    for output in &action.outputs.items {
        if !roll_chance(output.chance, rng) {
            continue;
        }
        let (low, high) = (output.min.min(output.max), output.min.max(output.max));
        let amount = rng.gen_range(low..=high);
        let template = match items.get(&output.id) {
            Ok(template) => template,
            Err(err) => {
                log::warn!("action `{}` skipped an output: {err}", action.id);
                continue;
            }
        };
        produced.extend((0..amount).map(|_| ItemInstance::from_catalog(template)));
    }
    produced
}
