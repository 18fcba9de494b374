use anyhow::Result;
use chrono::{DateTime, Utc};
use idleforge_game::Content;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

pub mod items;
pub mod queue;

/// Fixed wall-clock origin every scenario measures elapsed time from.
const EPOCH_SECONDS: i64 = 1_700_000_000;

/// Per-iteration inputs handed to a scenario check.
#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub content: &'static Content,
    pub verbose: bool,
}

impl ScenarioCtx {
    #[must_use]
    pub fn new(seed: u64, verbose: bool) -> Self {
        Self {
            seed,
            content: Content::builtin(),
            verbose,
        }
    }

    #[must_use]
    pub fn rng(&self) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(self.seed)
    }

    #[must_use]
    pub fn epoch(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(EPOCH_SECONDS, 0).unwrap_or_default()
    }
}

pub type ScenarioCheck = fn(&ScenarioCtx) -> Result<()>;

// Logic test scenario
#[derive(Clone)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    check: ScenarioCheck,
}

impl TestScenario {
    #[must_use]
    pub const fn new(
        key: &'static str,
        name: &'static str,
        description: &'static str,
        check: ScenarioCheck,
    ) -> Self {
        Self {
            key,
            name,
            description,
            check,
        }
    }

    /// Run the check once against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the first property violation the check observed.
    pub fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        (self.check)(ctx)
    }
}

impl std::fmt::Debug for TestScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestScenario")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[must_use]
pub fn catalog() -> Vec<TestScenario> {
    let mut scenarios = queue::queue_scenarios();
    scenarios.extend(items::item_scenarios());
    scenarios
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    catalog()
        .into_iter()
        .map(|scenario| (scenario.key, scenario.description))
        .collect()
}

#[must_use]
pub fn scenario_keys() -> Vec<&'static str> {
    catalog().into_iter().map(|scenario| scenario.key).collect()
}

#[must_use]
pub fn get_scenario(key: &str) -> Option<TestScenario> {
    catalog()
        .into_iter()
        .find(|scenario| scenario.key.eq_ignore_ascii_case(key) || scenario.name == key)
}
