//! Centralized tuning constants for Idleforge game logic.
//!
//! These values shape deterministic engine math. Content (items, actions,
//! reforge tables) lives in JSON assets; anything here is only adjustable via
//! reviewed code changes.

// Enhancement ---------------------------------------------------------------
/// Hard ceiling for accumulated stars on a single item.
pub const STAR_CAP: u32 = 35;
/// Reforge group whose items accept any enchantment regardless of `applies_to`.
pub const ENCHANTED_BOOK_GROUP: &str = "Enchanted Book";

// Modifier priorities --------------------------------------------------------
pub(crate) const PRIORITY_DEFAULT: i32 = 0;
pub(crate) const PRIORITY_SPECIAL: i32 = 10;
pub(crate) const PRIORITY_ENHANCER: i32 = 10;
pub(crate) const PRIORITY_STARS: i32 = 20;

// Queue ---------------------------------------------------------------------
/// Default upper bound on repetitions drained by a single poll.
pub const DEFAULT_MAX_COMPLETIONS_PER_POLL: u32 = 10_000;
/// Default secret mixed into derived loot streams.
pub const DEFAULT_LOOT_SECRET: u64 = 0x1D1E_F0E6_5EED_0001;

// Loot stream domains ---------------------------------------------------------
pub(crate) const LOOT_STREAM_DOMAIN: &[u8] = b"idleforge.loot";
pub(crate) const REFORGE_STREAM_DOMAIN: &[u8] = b"idleforge.reforge";
