//! Canonical form and hashing for modifiers.
//!
//! A canonical hash is `"{tag}:{payload}"` where the payload is the compact
//! JSON of the variant's fields after normalisation. Unordered collections are
//! sorted so that logically equal modifiers hash identically regardless of
//! how they were assembled.
use super::{Enchant, Enhancer, Modifier, StatDelta};

/// Normalised copy of `modifier` with every unordered collection sorted.
#[must_use]
pub fn canonicalize(modifier: &Modifier) -> Modifier {
    match modifier {
        Modifier::Reforge(reforge) => {
            let mut reforge = reforge.clone();
            sort_stats(&mut reforge.stats);
            Modifier::Reforge(reforge)
        }
        Modifier::Special(special) => {
            let mut special = special.clone();
            sort_stats(&mut special.stats);
            Modifier::Special(special)
        }
        Modifier::Enchantment(enchantment) => {
            let mut enchantment = enchantment.clone();
            for enchant in &mut enchantment.enchants {
                sort_groups(enchant);
            }
            enchantment
                .enchants
                .sort_by(|a, b| a.name.cmp(&b.name).then(a.level.cmp(&b.level)));
            Modifier::Enchantment(enchantment)
        }
        Modifier::Enhancer(enhancer) => Modifier::Enhancer(canonical_enhancer(enhancer)),
        other => other.clone(),
    }
}

/// Deterministic identity string for `modifier`.
#[must_use]
pub fn canonical_hash(modifier: &Modifier) -> String {
    let canonical = canonicalize(modifier);
    format!("{}:{}", canonical.kind().tag(), payload_json(&canonical))
}

/// Split a hash into its tag and payload halves.
#[must_use]
pub fn split_hash(hash: &str) -> Option<(&str, &str)> {
    let (tag, payload) = hash.split_once(':')?;
    if tag.is_empty() || payload.is_empty() {
        return None;
    }
    Some((tag, payload))
}

fn canonical_enhancer(enhancer: &Enhancer) -> Enhancer {
    let mut groups = enhancer.enhances_groups.clone();
    groups.sort();
    groups.dedup();
    let mut nested: Vec<(String, Modifier)> = enhancer
        .modifiers
        .iter()
        .map(|m| {
            let canonical = canonicalize(m);
            (canonical_hash(&canonical), canonical)
        })
        .collect();
    nested.sort_by(|a, b| a.0.cmp(&b.0));
    Enhancer {
        enhances_groups: groups,
        modifiers: nested.into_iter().map(|(_, m)| m).collect(),
    }
}

fn sort_stats(stats: &mut [StatDelta]) {
    for delta in stats.iter_mut() {
        // fold -0.0 into 0.0 so the printed payload is stable
        delta.amount += 0.0;
    }
    stats.sort_by(|a, b| {
        a.stat
            .cmp(&b.stat)
            .then(a.amount.total_cmp(&b.amount))
    });
}

fn sort_groups(enchant: &mut Enchant) {
    enchant.applies_to.sort();
    enchant.applies_to.dedup();
}

fn payload_json(modifier: &Modifier) -> String {
    let encoded = match modifier {
        Modifier::Equippable(p) => serde_json::to_string(p),
        Modifier::Stackable(p) => serde_json::to_string(p),
        Modifier::Reforge(p) => serde_json::to_string(p),
        Modifier::Reforgeable(p) => serde_json::to_string(p),
        Modifier::Stars(p) => serde_json::to_string(p),
        Modifier::Enchantment(p) => serde_json::to_string(p),
        Modifier::Enhancer(p) => serde_json::to_string(p),
        Modifier::Special(p) => serde_json::to_string(p),
    };
    encoded.unwrap_or_default()
}
