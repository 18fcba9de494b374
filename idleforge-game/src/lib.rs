//! Idleforge Game Engine
//!
//! Platform-agnostic gameplay state for the Idleforge idle RPG: a catalog of
//! items shaped by composable modifiers, and a lazily evaluated action queue
//! that turns elapsed wall-clock time into crafting and gathering rewards.
//! The crate performs no I/O; persistence and content loading are supplied
//! through [`PlayerStorage`] and [`ContentLoader`].

pub mod actions;
pub mod catalog;
pub mod codec;
pub mod constants;
pub mod content;
pub mod display;
pub mod enhance;
pub mod equipment;
pub mod inventory;
pub mod modifiers;
pub mod numbers;
pub mod queue;
pub mod seed;
pub mod stats;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use actions::{
    Action, ActionCatalog, ActionError, ActionInputs, ActionOutputs, ChanceItem, complete_action,
    roll_chance,
};
pub use catalog::{CatalogError, CatalogItem, ItemCatalog, ItemInstance, ItemUid, Rarity};
pub use codec::{
    CodecError, DbItem, LoadIssue, encode_db_item, encode_inventory, item_fingerprint,
    load_db_item, load_inventory,
};
pub use content::{BuiltinLoader, Content, ContentError};
pub use display::{get_display_description, get_display_name};
pub use enhance::{
    EnhanceError, ReforgeTable, combine_enchantments, enhance_in_inventory, preview_enhance_item,
    reforge_item,
};
pub use equipment::{EquipError, EquipSlot, Equipment};
pub use inventory::{
    Inventory, InventoryError, add_items, consume_one, remove_items, try_stack_item_in_inventory,
};
pub use modifiers::{Modifier, ModifierError, ModifierKind, ModifierRegistry};
pub use queue::{
    Completion, QueueEntry, QueueError, QueueOutcome, QueueState, clear_queue, enqueue_action,
    process_queue_until_now,
};
pub use seed::{derive_stream_seed, poll_rng, reforge_rng};
pub use stats::{ItemStats, StatLine, StatTable, compute_item_stats, get_modified_stats};

use constants::{DEFAULT_LOOT_SECRET, DEFAULT_MAX_COMPLETIONS_PER_POLL};

/// Engine tuning loaded from the `engine` config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_completions_per_poll: u32,
    pub loot_secret: u64,
    /// Player stats before equipment.
    pub base_stats: StatTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_completions_per_poll: DEFAULT_MAX_COMPLETIONS_PER_POLL,
            loot_secret: DEFAULT_LOOT_SECRET,
            base_stats: StatTable::new(),
        }
    }
}

/// Trait for abstracting content loading
/// Platform-specific implementations should provide this
pub trait ContentLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the item, action and reforge content
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be loaded or is invalid.
    fn load_content(&self) -> Result<Content, Self::Error>;

    /// Load configuration data for a specific system
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;
}

/// Trait for abstracting per-player persistence
/// Implementations must isolate concurrent writers for the same player
pub trait PlayerStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a player's queue, `None` if nothing was saved yet
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    fn load_queue(&self, player_id: &str) -> Result<Option<QueueState>, Self::Error>;

    /// Save a player's queue
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    fn save_queue(&self, player_id: &str, state: &QueueState) -> Result<(), Self::Error>;

    /// Load a player's persisted inventory records
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be read.
    fn load_inventory(&self, player_id: &str) -> Result<Vec<DbItem>, Self::Error>;

    /// Replace a player's persisted inventory records
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be written.
    fn save_inventory(&self, player_id: &str, items: &[DbItem]) -> Result<(), Self::Error>;
}

/// Outcome of [`GameEngine::poll_player`].
#[derive(Debug, Clone)]
pub struct PollReport {
    pub outcome: QueueOutcome,
    /// Stored records that could not be hydrated, reported on every poll.
    /// They are written back untouched whenever the inventory is saved.
    pub load_issues: Vec<LoadIssue>,
}

struct LoadedInventory {
    inventory: Inventory,
    stale: Vec<DbItem>,
    issues: Vec<LoadIssue>,
}

/// Main engine running the load, process, stack, encode, save cycle
pub struct GameEngine<S>
where
    S: PlayerStorage,
{
    content: Content,
    config: EngineConfig,
    storage: S,
}

impl<S> GameEngine<S>
where
    S: PlayerStorage,
{
    /// Create an engine over already-loaded content
    pub const fn new(content: Content, config: EngineConfig, storage: S) -> Self {
        Self {
            content,
            config,
            storage,
        }
    }

    /// Create an engine from a content loader
    ///
    /// # Errors
    ///
    /// Returns an error if content or the `engine` config cannot be loaded.
    pub fn from_loader<L>(loader: &L, storage: S) -> anyhow::Result<Self>
    where
        L: ContentLoader,
    {
        let content = loader.load_content().context("loading content")?;
        let config = loader
            .load_config::<EngineConfig>("engine")
            .context("loading engine config")?;
        Ok(Self::new(content, config, storage))
    }

    #[must_use]
    pub const fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bring a player's queue up to `now`, stacking every reward into their
    /// inventory and persisting both.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn poll_player(
        &self,
        player_id: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<PollReport> {
        let state = self
            .storage
            .load_queue(player_id)
            .context("loading queue")?
            .unwrap_or_default();
        let mut rng = poll_rng(self.config.loot_secret, player_id, state.started_at);
        let outcome = process_queue_until_now(
            &self.content.actions,
            &self.content.items,
            state.clone(),
            now,
            &mut rng,
            self.config.max_completions_per_poll,
        );

        let loaded = self.load_player_inventory(player_id)?;
        if outcome.outputs().next().is_some() {
            let inventory = add_items(loaded.inventory, outcome.outputs().cloned());
            self.save_player_inventory(player_id, &inventory, &loaded.stale)?;
        }

        let next = outcome.state();
        if next != state {
            self.storage
                .save_queue(player_id, &next)
                .context("saving queue")?;
        }
        log::debug!(
            "polled `{player_id}`: {} repetitions, {} xp",
            outcome.completed.iter().map(|c| u64::from(c.amount_completed)).sum::<u64>(),
            outcome.total_xp()
        );
        Ok(PollReport {
            outcome,
            load_issues: loaded.issues,
        })
    }

    /// Catch the player's queue up to `now`, then queue `amount` repetitions
    /// of `action_id`, paying its inputs from the inventory.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown actions, missing inputs or storage
    /// failures. Nothing is charged when enqueueing fails.
    pub fn enqueue(
        &self,
        player_id: &str,
        action_id: &str,
        amount: u32,
        now: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<QueueState> {
        let report = self.poll_player(player_id, now)?;
        let loaded = self.load_player_inventory(player_id)?;
        let (state, inventory) = enqueue_action(
            &report.outcome.state(),
            &loaded.inventory,
            &self.content.actions,
            action_id,
            amount,
            now,
        )?;
        self.save_player_inventory(player_id, &inventory, &loaded.stale)?;
        self.storage
            .save_queue(player_id, &state)
            .context("saving queue")?;
        Ok(state)
    }

    /// Drop every queued entry. Inputs already paid are not refunded.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn clear(&self, player_id: &str) -> anyhow::Result<()> {
        self.storage
            .save_queue(player_id, &clear_queue())
            .context("saving queue")
    }

    /// Reforge the item `item_uid` in the player's inventory. The draw comes
    /// from the player's reforge stream for `nonce`.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is missing or cannot be reforged, or if
    /// storage fails. Nothing is saved when reforging fails.
    pub fn reforge(
        &self,
        player_id: &str,
        item_uid: ItemUid,
        nonce: u64,
    ) -> anyhow::Result<ItemInstance> {
        let loaded = self.load_player_inventory(player_id)?;
        let item = loaded
            .inventory
            .get(item_uid)
            .ok_or(InventoryError::MissingItem(item_uid.get()))?;
        let mut rng = reforge_rng(self.config.loot_secret, player_id, nonce);
        let reforged = reforge_item(item, &self.content.reforges, &mut rng)?;
        let inventory = loaded.inventory.replace(item_uid, reforged.clone())?;
        self.save_player_inventory(player_id, &inventory, &loaded.stale)?;
        log::debug!("reforged `{}` for `{player_id}`", reforged.catalog_id);
        Ok(reforged)
    }

    /// Hydrated inventory of `player_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn inventory(&self, player_id: &str) -> anyhow::Result<Inventory> {
        Ok(self.load_player_inventory(player_id)?.inventory)
    }

    /// Persisted queue of `player_id`, without catching it up.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn queue(&self, player_id: &str) -> anyhow::Result<QueueState> {
        Ok(self
            .storage
            .load_queue(player_id)
            .context("loading queue")?
            .unwrap_or_default())
    }

    /// Base stats from config plus everything equipped.
    #[must_use]
    pub fn modified_stats(&self, equipment: &Equipment) -> StatTable {
        get_modified_stats(&self.config.base_stats, equipment, &self.content.items)
    }

    fn load_player_inventory(&self, player_id: &str) -> anyhow::Result<LoadedInventory> {
        let records = self
            .storage
            .load_inventory(player_id)
            .context("loading inventory")?;
        let (inventory, issues) = load_inventory(&records, &self.content);
        let stale = issues
            .iter()
            .filter_map(|issue| records.get(issue.index).cloned())
            .collect();
        Ok(LoadedInventory {
            inventory,
            stale,
            issues,
        })
    }

    fn save_player_inventory(
        &self,
        player_id: &str,
        inventory: &Inventory,
        stale: &[DbItem],
    ) -> anyhow::Result<()> {
        let mut records = encode_inventory(inventory, &self.content)?;
        records.extend_from_slice(stale);
        self.storage
            .save_inventory(player_id, &records)
            .context("saving inventory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use serde::de::DeserializeOwned;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl ContentLoader for FixtureLoader {
        type Error = Infallible;

        fn load_content(&self) -> Result<Content, Self::Error> {
            Ok(Content::builtin().clone())
        }

        fn load_config<T>(&self, _config_name: &str) -> Result<T, Self::Error>
        where
            T: DeserializeOwned,
        {
            let parsed = serde_json::from_str("{}")
                .or_else(|_| serde_json::from_str("null"))
                .unwrap();
            Ok(parsed)
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStorage {
        queues: Rc<RefCell<HashMap<String, QueueState>>>,
        inventories: Rc<RefCell<HashMap<String, Vec<DbItem>>>>,
    }

    impl PlayerStorage for MemoryStorage {
        type Error = Infallible;

        fn load_queue(&self, player_id: &str) -> Result<Option<QueueState>, Self::Error> {
            Ok(self.queues.borrow().get(player_id).cloned())
        }

        fn save_queue(&self, player_id: &str, state: &QueueState) -> Result<(), Self::Error> {
            self.queues
                .borrow_mut()
                .insert(player_id.to_string(), state.clone());
            Ok(())
        }

        fn load_inventory(&self, player_id: &str) -> Result<Vec<DbItem>, Self::Error> {
            Ok(self
                .inventories
                .borrow()
                .get(player_id)
                .cloned()
                .unwrap_or_default())
        }

        fn save_inventory(&self, player_id: &str, items: &[DbItem]) -> Result<(), Self::Error> {
            self.inventories
                .borrow_mut()
                .insert(player_id.to_string(), items.to_vec());
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn engine(storage: MemoryStorage) -> GameEngine<MemoryStorage> {
        GameEngine::from_loader(&FixtureLoader, storage).unwrap()
    }

    fn ore_records(amount: u32) -> Vec<DbItem> {
        vec![DbItem {
            id: "iron_ore".to_string(),
            modifiers: vec![format!(r#"stackable:{{"stack":64,"amount":{amount}}}"#)],
        }]
    }

    #[test]
    fn config_defaults_apply_to_empty_document() {
        let engine = engine(MemoryStorage::default());
        assert_eq!(engine.config(), &EngineConfig::default());
    }

    #[test]
    fn idle_player_poll_is_a_no_op() {
        let storage = MemoryStorage::default();
        let engine = engine(storage.clone());
        let report = engine.poll_player("idle", t0()).unwrap();
        assert!(report.outcome.completed.is_empty());
        assert!(storage.queues.borrow().is_empty());
        assert!(storage.inventories.borrow().is_empty());
    }

    #[test]
    fn mining_rewards_land_in_inventory() {
        let engine = engine(MemoryStorage::default());
        engine.enqueue("p1", "iron_ore_mine", 3, t0()).unwrap();

        let report = engine
            .poll_player("p1", t0() + TimeDelta::seconds(12))
            .unwrap();
        assert_eq!(report.outcome.completed_count("iron_ore_mine"), 2);
        assert_eq!(engine.inventory("p1").unwrap().count_items("iron_ore"), 2);

        let queue = engine.queue("p1").unwrap();
        assert_eq!(queue.queue, vec![QueueEntry::new("iron_ore_mine", 1)]);
        assert_eq!(queue.started_at, Some(t0() + TimeDelta::seconds(10)));

        let again = engine
            .poll_player("p1", t0() + TimeDelta::seconds(12))
            .unwrap();
        assert!(again.outcome.completed.is_empty());
        assert_eq!(engine.inventory("p1").unwrap().count_items("iron_ore"), 2);
    }

    #[test]
    fn enqueue_pays_inputs_or_fails_cleanly() {
        let storage = MemoryStorage::default();
        storage
            .inventories
            .borrow_mut()
            .insert("p1".to_string(), ore_records(5));
        let engine = engine(storage);

        let err = engine.enqueue("p1", "iron_bar_smelt", 1, t0()).unwrap_err();
        assert!(err.downcast_ref::<QueueError>().is_some());
        assert_eq!(engine.inventory("p1").unwrap().count_items("iron_ore"), 5);
        assert!(engine.queue("p1").unwrap().is_idle());

        engine.enqueue("p1", "whetstone_carve", 1, t0()).unwrap();
        assert_eq!(engine.inventory("p1").unwrap().count_items("iron_ore"), 1);
    }

    #[test]
    fn enqueue_after_drained_queue_starts_fresh() {
        let engine = engine(MemoryStorage::default());
        engine.enqueue("p1", "coal_mine", 1, t0()).unwrap();
        let later = t0() + TimeDelta::minutes(10);
        let state = engine.enqueue("p1", "iron_ore_mine", 2, later).unwrap();
        assert_eq!(state.started_at, Some(later));
        assert_eq!(state.queue, vec![QueueEntry::new("iron_ore_mine", 2)]);
        assert!(engine.inventory("p1").unwrap().count_items("coal") >= 1);
    }

    #[test]
    fn unreadable_records_survive_a_save() {
        let storage = MemoryStorage::default();
        let mut records = ore_records(1);
        records.push(DbItem {
            id: "retired_item".to_string(),
            modifiers: Vec::new(),
        });
        storage
            .inventories
            .borrow_mut()
            .insert("p1".to_string(), records);
        let engine = engine(storage.clone());
        engine.enqueue("p1", "iron_ore_mine", 1, t0()).unwrap();
        let report = engine
            .poll_player("p1", t0() + TimeDelta::seconds(5))
            .unwrap();
        assert_eq!(report.load_issues.len(), 1);
        let saved = storage.inventories.borrow()["p1"].clone();
        assert!(saved.iter().any(|record| record.id == "retired_item"));
        assert_eq!(engine.inventory("p1").unwrap().count_items("iron_ore"), 2);
    }

    #[test]
    fn idle_poll_still_reports_unreadable_records() {
        let storage = MemoryStorage::default();
        let mut records = ore_records(1);
        records.push(DbItem {
            id: "retired_item".to_string(),
            modifiers: Vec::new(),
        });
        storage
            .inventories
            .borrow_mut()
            .insert("p1".to_string(), records.clone());
        let engine = engine(storage.clone());

        let report = engine.poll_player("p1", t0()).unwrap();
        assert!(report.outcome.completed.is_empty());
        assert_eq!(report.load_issues.len(), 1);
        assert_eq!(report.load_issues[0].index, 1);
        assert_eq!(storage.inventories.borrow()["p1"], records);
    }

    fn sword_records() -> Vec<DbItem> {
        vec![DbItem {
            id: "iron_sword".to_string(),
            modifiers: Vec::new(),
        }]
    }

    fn sword_uid(engine: &GameEngine<MemoryStorage>) -> ItemUid {
        engine.inventory("p1").unwrap().items()[0].uid
    }

    #[test]
    fn reforge_is_repeatable_per_nonce_and_persists() {
        let first_storage = MemoryStorage::default();
        first_storage
            .inventories
            .borrow_mut()
            .insert("p1".to_string(), sword_records());
        let first = engine(first_storage.clone());
        let reforged = first.reforge("p1", sword_uid(&first), 11).unwrap();
        assert!(reforged.has(ModifierKind::Reforge));

        let saved = first_storage.inventories.borrow()["p1"].clone();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].modifiers[0].starts_with("reforge:"));

        let second_storage = MemoryStorage::default();
        second_storage
            .inventories
            .borrow_mut()
            .insert("p1".to_string(), sword_records());
        let second = engine(second_storage.clone());
        second.reforge("p1", sword_uid(&second), 11).unwrap();
        assert_eq!(second_storage.inventories.borrow()["p1"], saved);
    }

    #[test]
    fn reforge_rejects_missing_and_plain_items() {
        let storage = MemoryStorage::default();
        storage
            .inventories
            .borrow_mut()
            .insert("p1".to_string(), ore_records(3));
        let engine = engine(storage.clone());

        let ore = engine.inventory("p1").unwrap().items()[0].uid;
        let err = engine.reforge("p1", ore, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EnhanceError>(),
            Some(EnhanceError::NotReforgeable(_))
        ));

        let err = engine.reforge("p1", ItemUid::fresh(), 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InventoryError>(),
            Some(InventoryError::MissingItem(_))
        ));
        assert_eq!(storage.inventories.borrow()["p1"], ore_records(3));
    }

    #[test]
    fn modified_stats_use_config_base() {
        let mut config = EngineConfig::default();
        config.base_stats.insert("damage".to_string(), 1.0);
        let engine = GameEngine::new(
            Content::builtin().clone(),
            config,
            MemoryStorage::default(),
        );
        let mut equipment = Equipment::new();
        equipment
            .equip(engine.content().items.instantiate("iron_sword").unwrap())
            .unwrap();
        let stats = engine.modified_stats(&equipment);
        assert!((stats["damage"] - 11.0).abs() < f64::EPSILON);
        assert!(!stats.contains_key("speed"));
    }
}
