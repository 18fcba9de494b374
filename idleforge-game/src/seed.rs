//! Domain-separated RNG streams.
//!
//! Each poll draws loot from a `ChaCha20Rng` keyed by the engine secret, the
//! player and the queue's persisted start time, so replaying a poll from the
//! same persisted state rolls the same loot.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;

use crate::constants::{LOOT_STREAM_DOMAIN, REFORGE_STREAM_DOMAIN};

/// First eight bytes of HMAC-SHA256(`secret`, `domain` ‖ `parts`).
#[must_use]
pub fn derive_stream_seed(secret: u64, domain: &[u8], parts: &[&[u8]]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&secret.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain);
    for part in parts {
        // length prefix keeps ("ab","c") and ("a","bc") apart
        mac.update(&u64::try_from(part.len()).unwrap_or(u64::MAX).to_le_bytes());
        mac.update(part);
    }
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

fn started_at_bytes(started_at: Option<DateTime<Utc>>) -> [u8; 8] {
    started_at
        .map_or(i64::MIN, |t| t.timestamp_millis())
        .to_le_bytes()
}

/// Loot stream for one poll of `player_id`'s queue.
#[must_use]
pub fn poll_rng(secret: u64, player_id: &str, started_at: Option<DateTime<Utc>>) -> ChaCha20Rng {
    let started = started_at_bytes(started_at);
    ChaCha20Rng::seed_from_u64(derive_stream_seed(
        secret,
        LOOT_STREAM_DOMAIN,
        &[player_id.as_bytes(), started.as_slice()],
    ))
}

/// Reforge stream for a player action keyed by `nonce`.
#[must_use]
pub fn reforge_rng(secret: u64, player_id: &str, nonce: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(derive_stream_seed(
        secret,
        REFORGE_STREAM_DOMAIN,
        &[player_id.as_bytes(), nonce.to_le_bytes().as_slice()],
    ))
}
