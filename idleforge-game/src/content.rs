//! Content bundle: modifier registry, item and action catalogs, reforge table.
//!
//! Content is parsed once from JSON documents and read-only afterwards. Any
//! parse or reference error is fatal at load time.
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

use crate::actions::{Action, ActionCatalog};
use crate::catalog::{CatalogItem, CatalogItemDocument, ItemCatalog};
use crate::enhance::ReforgeTable;
use crate::modifiers::{ModifierError, ModifierRegistry};
use crate::ContentLoader;

const DEFAULT_ITEMS_DATA: &str = include_str!("../assets/data/items.json");
const DEFAULT_ACTIONS_DATA: &str = include_str!("../assets/data/actions.json");
const DEFAULT_REFORGES_DATA: &str = include_str!("../assets/data/reforges.json");
const DEFAULT_ENGINE_CONFIG: &str = include_str!("../assets/data/engine.json");

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to parse {document} content")]
    Parse {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("item `{id}` has an invalid default modifier")]
    Modifier {
        id: String,
        #[source]
        source: ModifierError,
    },
    #[error("duplicate {kind} id `{id}`")]
    Duplicate { kind: &'static str, id: String },
    #[error("action `{0}` lists a different number of input ids and amounts")]
    InputShape(String),
    #[error("action `{action}` references unknown item `{item}`")]
    UnknownReference { action: String, item: String },
    #[error("action `{action}` output `{item}` has min greater than max")]
    OutputRange { action: String, item: String },
    #[error("action `{0}` must take a positive amount of time")]
    InvalidDuration(String),
}

#[derive(Debug, Deserialize)]
struct ItemsDocument {
    #[serde(default)]
    items: Vec<CatalogItemDocument>,
}

#[derive(Debug, Deserialize)]
struct ActionsDocument {
    #[serde(default)]
    actions: Vec<Action>,
}

/// Everything the engine reads but never writes.
#[derive(Debug, Clone)]
pub struct Content {
    pub registry: ModifierRegistry,
    pub items: ItemCatalog,
    pub actions: ActionCatalog,
    pub reforges: ReforgeTable,
}

impl Content {
    /// Parse the three content documents using the default registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a document fails to parse or references are broken.
    pub fn from_json(items: &str, actions: &str, reforges: &str) -> Result<Self, ContentError> {
        Self::from_json_with_registry(ModifierRegistry::with_defaults(), items, actions, reforges)
    }

    /// Parse the content documents, instantiating item modifiers through
    /// `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a document fails to parse, an item carries a
    /// modifier `registry` cannot build, or references are broken.
    pub fn from_json_with_registry(
        registry: ModifierRegistry,
        items: &str,
        actions: &str,
        reforges: &str,
    ) -> Result<Self, ContentError> {
        let items: ItemsDocument =
            serde_json::from_str(items).map_err(|source| ContentError::Parse {
                document: "items",
                source,
            })?;
        let actions: ActionsDocument =
            serde_json::from_str(actions).map_err(|source| ContentError::Parse {
                document: "actions",
                source,
            })?;
        let reforges: ReforgeTable =
            serde_json::from_str(reforges).map_err(|source| ContentError::Parse {
                document: "reforges",
                source,
            })?;
        Self::from_parts(registry, items.items, actions.actions, reforges)
    }

    /// Assemble content from already-parsed documents.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate ids, invalid modifiers or broken
    /// action references.
    pub fn from_parts(
        registry: ModifierRegistry,
        items: Vec<CatalogItemDocument>,
        actions: Vec<Action>,
        reforges: ReforgeTable,
    ) -> Result<Self, ContentError> {
        ensure_unique("item", items.iter().map(|doc| doc.id.as_str()))?;
        ensure_unique("action", actions.iter().map(|action| action.id.as_str()))?;

        let built = items
            .into_iter()
            .map(|doc| {
                let id = doc.id.clone();
                CatalogItem::from_document(doc, &registry)
                    .map_err(|source| ContentError::Modifier { id, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let items = ItemCatalog::from_items(built);

        for action in &actions {
            validate_action(action, &items)?;
        }

        Ok(Self {
            registry,
            items,
            actions: ActionCatalog::from_actions(actions),
            reforges,
        })
    }

    /// Content compiled into the crate.
    #[must_use]
    pub fn builtin() -> &'static Self {
        static CONTENT: OnceLock<Content> = OnceLock::new();
        CONTENT.get_or_init(|| {
            Self::from_json(DEFAULT_ITEMS_DATA, DEFAULT_ACTIONS_DATA, DEFAULT_REFORGES_DATA)
                .expect("valid builtin content")
        })
    }
}

/// Loader serving the compiled-in content and config documents. Unknown
/// config names parse as an empty document.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLoader;

impl ContentLoader for BuiltinLoader {
    type Error = serde_json::Error;

    fn load_content(&self) -> Result<Content, Self::Error> {
        Ok(Content::builtin().clone())
    }

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        match config_name {
            "engine" => serde_json::from_str(DEFAULT_ENGINE_CONFIG),
            _ => serde_json::from_str("{}"),
        }
    }
}

fn ensure_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ContentError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ContentError::Duplicate {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_action(action: &Action, items: &ItemCatalog) -> Result<(), ContentError> {
    if !(action.time.is_finite() && action.time > 0.0) {
        return Err(ContentError::InvalidDuration(action.id.clone()));
    }
    if !action.inputs.is_well_formed() {
        return Err(ContentError::InputShape(action.id.clone()));
    }
    let unknown = |item: &str| ContentError::UnknownReference {
        action: action.id.clone(),
        item: item.to_string(),
    };
    for (input, _) in action.inputs.iter() {
        if !items.contains(input) {
            return Err(unknown(input));
        }
    }
    for output in &action.outputs.items {
        if !items.contains(&output.id) {
            return Err(unknown(&output.id));
        }
        if output.min > output.max {
            return Err(ContentError::OutputRange {
                action: action.id.clone(),
                item: output.id.clone(),
            });
        }
    }
    Ok(())
}
