use anyhow::{Context, Result, bail};
use idleforge_game::constants::DEFAULT_LOOT_SECRET;
use idleforge_game::derive_stream_seed;
use std::collections::HashSet;

const PLAYER_SEED_DOMAIN: &[u8] = b"idleforge.tester.player";
const MAX_RANGE_LEN: u64 = 10_000;

/// Seed metadata used for logic runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    /// Player id the seed was derived from, when given by name.
    pub player: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub const fn from_numeric(seed: u64) -> Self {
        Self { seed, player: None }
    }

    #[must_use]
    pub fn from_player(player: &str) -> Self {
        Self {
            seed: derive_stream_seed(DEFAULT_LOOT_SECRET, PLAYER_SEED_DOMAIN, &[player.as_bytes()]),
            player: Some(player.to_string()),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match &self.player {
            Some(player) => format!("{} ({player})", self.seed),
            None => self.seed.to_string(),
        }
    }
}

/// Resolve a list of CLI seed arguments into canonical seed metadata.
///
/// Supports decimal or `0x` hex integers, inclusive ranges such as `1..8`,
/// and `player:<id>` which derives the seed a player id would map to.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Some(player) = token.strip_prefix("player:") {
            if player.is_empty() {
                bail!("Empty player id in seed token: {token}");
            }
            pending.push(SeedInfo::from_player(player));
            continue;
        }

        if let Some((start, end)) = token.split_once("..") {
            let start = parse_number(start)?;
            let end = parse_number(end.trim_start_matches('='))?;
            if end < start || end - start >= MAX_RANGE_LEN {
                bail!("Seed range {token} must be ascending and under {MAX_RANGE_LEN} seeds");
            }
            pending.extend((start..=end).map(SeedInfo::from_numeric));
            continue;
        }

        pending.push(SeedInfo::from_numeric(parse_number(token)?));
    }

    let mut seen = HashSet::new();
    let mut deduped: Vec<SeedInfo> = pending
        .into_iter()
        .filter(|info| seen.insert(info.seed))
        .collect();

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(1337));
    }

    Ok(deduped)
}

fn parse_number(token: &str) -> Result<u64> {
    let token = token.trim();
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .with_context(|| format!("Unrecognized hex seed: {token}"));
    }
    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }
    token
        .parse::<u64>()
        .with_context(|| format!("Unrecognized seed token: {token}"))
}
