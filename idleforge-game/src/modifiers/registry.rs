//! Type-tag registry producing modifiers from raw specs and canonical hashes.
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

use super::canonical::{canonical_hash, split_hash};
use super::{
    Enchantment, Enhancer, Equippable, Modifier, ModifierKind, Reforge, Reforgeable, Special,
    Stackable, Stars,
};

/// Builds a modifier from its payload (the spec without the `type` key).
pub type ModifierFactory = fn(Value) -> Result<Modifier, serde_json::Error>;

/// Errors raised while instantiating modifiers.
#[derive(Debug, Error)]
pub enum ModifierError {
    #[error("unknown modifier type `{0}`")]
    UnknownModifierType(String),
    #[error("modifier spec must be an object with a string `type` field")]
    MissingType,
    #[error("malformed modifier hash `{0}`")]
    MalformedHash(String),
    #[error("invalid `{tag}` modifier payload: {source}")]
    InvalidPayload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Maps modifier type tags to their factories.
#[derive(Debug, Clone)]
pub struct ModifierRegistry {
    factories: HashMap<&'static str, (ModifierKind, ModifierFactory)>,
}

impl Default for ModifierRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ModifierRegistry {
    /// Registry with no registered kinds.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in modifier kind registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for kind in ModifierKind::ALL {
            registry.register(kind);
        }
        registry
    }

    /// Register `kind`; registering twice is a no-op.
    pub fn register(&mut self, kind: ModifierKind) -> &mut Self {
        self.factories
            .entry(kind.tag())
            .or_insert((kind, factory_for(kind)));
        self
    }

    #[must_use]
    pub fn is_registered(&self, kind: ModifierKind) -> bool {
        self.factories.contains_key(kind.tag())
    }

    /// Registered kinds in declaration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ModifierKind> {
        ModifierKind::ALL
            .into_iter()
            .filter(|kind| self.is_registered(*kind))
            .collect()
    }

    /// Instantiate a modifier from a raw spec such as `{"type": "stars", "count": 2}`.
    ///
    /// # Errors
    ///
    /// Returns [`ModifierError::UnknownModifierType`] when the tag (or any
    /// nested enhancer tag) is unregistered, [`ModifierError::MissingType`]
    /// when the spec has no tag, and [`ModifierError::InvalidPayload`] when the
    /// fields do not match the variant.
    pub fn instantiate(&self, spec: &Value) -> Result<Modifier, ModifierError> {
        let object = spec.as_object().ok_or(ModifierError::MissingType)?;
        let tag = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ModifierError::MissingType)?;
        let mut payload: Map<String, Value> = object.clone();
        payload.remove("type");
        self.build(tag, Value::Object(payload))
    }

    /// Rebuild a modifier from its canonical hash.
    ///
    /// # Errors
    ///
    /// Returns [`ModifierError::MalformedHash`] when the hash is not
    /// `tag:payload`, plus every error [`Self::instantiate`] can produce.
    pub fn from_hash(&self, hash: &str) -> Result<Modifier, ModifierError> {
        let (tag, payload) =
            split_hash(hash).ok_or_else(|| ModifierError::MalformedHash(hash.to_string()))?;
        let payload: Value = serde_json::from_str(payload)
            .map_err(|_| ModifierError::MalformedHash(hash.to_string()))?;
        self.build(tag, payload)
    }

    /// Canonical hash of `modifier`.
    #[must_use]
    pub fn hash(&self, modifier: &Modifier) -> String {
        canonical_hash(modifier)
    }

    /// Raw spec for `modifier`.
    #[must_use]
    pub fn to_spec(&self, modifier: &Modifier) -> Value {
        modifier.to_spec()
    }

    fn build(&self, tag: &str, payload: Value) -> Result<Modifier, ModifierError> {
        let (_, factory) = self
            .factories
            .get(tag)
            .ok_or_else(|| ModifierError::UnknownModifierType(tag.to_string()))?;
        let modifier = factory(payload).map_err(|source| ModifierError::InvalidPayload {
            tag: tag.to_string(),
            source,
        })?;
        if let Some(unregistered) = modifier
            .kinds()
            .into_iter()
            .find(|kind| !self.is_registered(*kind))
        {
            return Err(ModifierError::UnknownModifierType(
                unregistered.tag().to_string(),
            ));
        }
        Ok(modifier)
    }
}

fn factory_for(kind: ModifierKind) -> ModifierFactory {
    match kind {
        ModifierKind::Equippable => build_equippable,
        ModifierKind::Stackable => build_stackable,
        ModifierKind::Reforge => build_reforge,
        ModifierKind::Reforgeable => build_reforgeable,
        ModifierKind::Stars => build_stars,
        ModifierKind::Enchantment => build_enchantment,
        ModifierKind::Enhancer => build_enhancer,
        ModifierKind::Special => build_special,
    }
}

fn build_equippable(payload: Value) -> Result<Modifier, serde_json::Error> {
    serde_json::from_value::<Equippable>(payload).map(Modifier::Equippable)
}

fn build_stackable(payload: Value) -> Result<Modifier, serde_json::Error> {
    serde_json::from_value::<Stackable>(payload).map(Modifier::Stackable)
}

fn build_reforge(payload: Value) -> Result<Modifier, serde_json::Error> {
    serde_json::from_value::<Reforge>(payload).map(Modifier::Reforge)
}

fn build_reforgeable(payload: Value) -> Result<Modifier, serde_json::Error> {
    serde_json::from_value::<Reforgeable>(payload).map(Modifier::Reforgeable)
}

fn build_stars(payload: Value) -> Result<Modifier, serde_json::Error> {
    serde_json::from_value::<Stars>(payload).map(Modifier::Stars)
}

fn build_enchantment(payload: Value) -> Result<Modifier, serde_json::Error> {
    serde_json::from_value::<Enchantment>(payload).map(Modifier::Enchantment)
}

fn build_enhancer(payload: Value) -> Result<Modifier, serde_json::Error> {
    serde_json::from_value::<Enhancer>(payload).map(Modifier::Enhancer)
}

fn build_special(payload: Value) -> Result<Modifier, serde_json::Error> {
    serde_json::from_value::<Special>(payload).map(Modifier::Special)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::EquipSlot;
    use crate::modifiers::canonical::canonicalize;
    use crate::modifiers::{Enchant, StatDelta};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;
    use smallvec::smallvec;

    fn sample_modifiers() -> Vec<Modifier> {
        vec![
            Modifier::Equippable(Equippable {
                slot: EquipSlot::Weapon,
            }),
            Modifier::Stackable(Stackable {
                stack: 64,
                amount: 12,
            }),
            Modifier::Reforge(Reforge {
                reforge_name: "Sharp".to_string(),
                stats: vec![StatDelta::new("damage", 4.5), StatDelta::new("crit", 1.0)],
            }),
            Modifier::Reforgeable(Reforgeable {
                group: "Sword".to_string(),
            }),
            Modifier::Stars(Stars { count: 7 }),
            Modifier::Enchantment(Enchantment {
                enchants: vec![Enchant {
                    name: "Sharpness".to_string(),
                    level: 2,
                    max_level: 5,
                    applies_to: smallvec!["Sword".to_string(), "Axe".to_string()],
                }],
            }),
            Modifier::Enhancer(Enhancer {
                enhances_groups: smallvec!["Sword".to_string()],
                modifiers: vec![
                    Modifier::Stars(Stars { count: 5 }),
                    Modifier::Reforge(Reforge {
                        reforge_name: "Any".to_string(),
                        stats: Vec::new(),
                    }),
                ],
            }),
            Modifier::Special(Special {
                name_prefix: "Ancient".to_string(),
                stats: vec![StatDelta::new("defense", 3.0)],
            }),
        ]
    }

    #[test]
    fn every_kind_roundtrips_through_hash() {
        let registry = ModifierRegistry::with_defaults();
        for modifier in sample_modifiers() {
            let hash = registry.hash(&modifier);
            let rebuilt = registry.from_hash(&hash).unwrap();
            assert_eq!(registry.hash(&rebuilt), hash, "{hash}");
        }
    }

    fn random_amount(rng: &mut SmallRng) -> f64 {
        if rng.gen_bool(0.5) {
            return rng.gen_range(-1000.0..1000.0);
        }
        loop {
            let wide = f64::from_bits(rng.r#gen::<u64>());
            if wide.is_finite() {
                return wide;
            }
        }
    }

    fn random_stats(rng: &mut SmallRng) -> Vec<StatDelta> {
        ["damage", "defense", "crit"]
            .into_iter()
            .take(rng.gen_range(1..=3))
            .map(|key| StatDelta::new(key, random_amount(rng)))
            .collect()
    }

    #[test]
    fn random_stat_amounts_survive_hash_reparse() {
        let registry = ModifierRegistry::with_defaults();
        let mut rng = SmallRng::seed_from_u64(0xF10A7);
        for _ in 0..2_000 {
            let reforge = Modifier::Reforge(Reforge {
                reforge_name: "Sharp".to_string(),
                stats: random_stats(&mut rng),
            });
            let special = Modifier::Special(Special {
                name_prefix: "Ancient".to_string(),
                stats: random_stats(&mut rng),
            });
            let enhancer = Modifier::Enhancer(Enhancer {
                enhances_groups: smallvec!["Sword".to_string()],
                modifiers: vec![reforge.clone()],
            });
            for modifier in [reforge, special, enhancer] {
                let hash = registry.hash(&modifier);
                let rebuilt = registry.from_hash(&hash).unwrap();
                assert_eq!(registry.hash(&rebuilt), hash);
                assert_eq!(rebuilt, canonicalize(&modifier), "{hash}");
            }
        }
    }

    #[test]
    fn exact_amount_is_not_nudged_by_reparse() {
        let registry = ModifierRegistry::with_defaults();
        let modifier = Modifier::Reforge(Reforge {
            reforge_name: "Sharp".to_string(),
            stats: vec![StatDelta::new("damage", -922.812_265_974_187_5)],
        });
        let hash = registry.hash(&modifier);
        assert!(hash.contains("-922.8122659741875"), "{hash}");
        assert_eq!(registry.hash(&registry.from_hash(&hash).unwrap()), hash);
    }

    #[test]
    fn every_kind_roundtrips_through_spec() {
        let registry = ModifierRegistry::with_defaults();
        for modifier in sample_modifiers() {
            let rebuilt = registry.instantiate(&registry.to_spec(&modifier)).unwrap();
            assert_eq!(rebuilt, modifier);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let registry = ModifierRegistry::with_defaults();
        let err = registry
            .instantiate(&json!({"type": "curse", "power": 3}))
            .unwrap_err();
        assert!(matches!(err, ModifierError::UnknownModifierType(tag) if tag == "curse"));
    }

    #[test]
    fn partial_registry_rejects_unregistered_kinds() {
        let mut registry = ModifierRegistry::empty();
        registry.register(ModifierKind::Enhancer);
        let err = registry
            .instantiate(&json!({
                "type": "enhancer",
                "enhances_groups": ["Sword"],
                "modifiers": [{"type": "stars", "count": 1}]
            }))
            .unwrap_err();
        assert!(matches!(err, ModifierError::UnknownModifierType(tag) if tag == "stars"));
        assert_eq!(registry.kinds(), vec![ModifierKind::Enhancer]);
    }

    #[test]
    fn missing_type_and_bad_payload_are_distinct() {
        let registry = ModifierRegistry::with_defaults();
        assert!(matches!(
            registry.instantiate(&json!({"count": 1})),
            Err(ModifierError::MissingType)
        ));
        assert!(matches!(
            registry.instantiate(&json!({"type": "stars", "count": "many"})),
            Err(ModifierError::InvalidPayload { .. })
        ));
        assert!(matches!(
            registry.from_hash("stars"),
            Err(ModifierError::MalformedHash(_))
        ));
        assert!(matches!(
            registry.from_hash("stars:{not json"),
            Err(ModifierError::MalformedHash(_))
        ));
    }
}
