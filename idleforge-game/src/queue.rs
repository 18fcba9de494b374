//! Lazy action-queue processing.
//!
//! A queue is never ticked. Each poll replays the persisted
//! `{queue, started_at}` against the wall-clock time elapsed since the head
//! entry started, completes every repetition that fits, and returns the
//! residual queue with its new start time. Recomputing a poll from the same
//! persisted state and the same loot stream yields the same result.
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

use crate::actions::{ActionCatalog, ActionError, complete_action};
use crate::catalog::{ItemCatalog, ItemInstance};
use crate::inventory::{Inventory, InventoryError, remove_items};
use crate::numbers::delta_ratio;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error(transparent)]
    UnknownAction(#[from] ActionError),
    #[error("cannot queue zero repetitions of `{0}`")]
    ZeroAmount(String),
    #[error("insufficient inputs: {0}")]
    InsufficientInputs(#[from] InventoryError),
    #[error("queue entry for `{0}` cannot hold that many repetitions")]
    TooManyRepetitions(String),
}

/// One action type with its remaining repetitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub action_id: String,
    pub amount: u32,
}

impl QueueEntry {
    #[must_use]
    pub fn new(action_id: impl Into<String>, amount: u32) -> Self {
        Self {
            action_id: action_id.into(),
            amount,
        }
    }
}

/// Persisted queue. `started_at` is the start of the head entry's current
/// repetition, or `None` while idle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    #[serde(default)]
    pub queue: Vec<QueueEntry>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl QueueState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Repetitions still queued for `action_id` across every entry.
    #[must_use]
    pub fn remaining(&self, action_id: &str) -> u64 {
        self.queue
            .iter()
            .filter(|entry| entry.action_id == action_id)
            .map(|entry| u64::from(entry.amount))
            .sum()
    }
}

/// Repetitions of one queue entry finished during a poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub action_id: String,
    pub amount_completed: u32,
    pub outputs: Vec<ItemInstance>,
    pub xp: u64,
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOutcome {
    pub queue: Vec<QueueEntry>,
    pub current_action_started_at: Option<DateTime<Utc>>,
    pub completed: Vec<Completion>,
    /// Fraction of the head repetition already elapsed.
    pub progress: Option<f64>,
    /// Time until the head repetition finishes.
    pub next_poll_in: Option<TimeDelta>,
    /// Entries dropped because their action no longer exists.
    pub skipped: Vec<QueueEntry>,
    /// `now` was earlier than `started_at`; elapsed was clamped to zero.
    pub clock_skew: bool,
    /// The per-poll completion cap stopped processing early.
    pub capped: bool,
}

impl QueueOutcome {
    /// Residual state to persist.
    #[must_use]
    pub fn state(&self) -> QueueState {
        QueueState {
            queue: self.queue.clone(),
            started_at: self.current_action_started_at,
        }
    }

    /// Every produced item, in completion order.
    pub fn outputs(&self) -> impl Iterator<Item = &ItemInstance> {
        self.completed.iter().flat_map(|c| c.outputs.iter())
    }

    /// Repetitions completed for `action_id`.
    #[must_use]
    pub fn completed_count(&self, action_id: &str) -> u64 {
        self.completed
            .iter()
            .filter(|c| c.action_id == action_id)
            .map(|c| u64::from(c.amount_completed))
            .sum()
    }

    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.completed.iter().map(|c| c.xp).sum()
    }
}

/// Replay `state` up to `now`.
///
/// Unknown action ids are dropped into [`QueueOutcome::skipped`]. At most
/// `max_completions` repetitions are completed; the rest stay queued with
/// `started_at` advanced only by the time actually consumed.
pub fn process_queue_until_now<R: Rng + ?Sized>(
    actions: &ActionCatalog,
    items: &ItemCatalog,
    state: QueueState,
    now: DateTime<Utc>,
    rng: &mut R,
    max_completions: u32,
) -> QueueOutcome {
    let mut queue: VecDeque<QueueEntry> = state.queue.into();
    let mut outcome = QueueOutcome {
        queue: Vec::new(),
        current_action_started_at: None,
        completed: Vec::new(),
        progress: None,
        next_poll_in: None,
        skipped: Vec::new(),
        clock_skew: false,
        capped: false,
    };
    if queue.is_empty() {
        return outcome;
    }

    let started_at = state.started_at.unwrap_or(now);
    let mut elapsed = now - started_at;
    if elapsed < TimeDelta::zero() {
        log::warn!(
            "queue started_at {started_at} is after now {now}; treating elapsed time as zero"
        );
        elapsed = TimeDelta::zero();
        outcome.clock_skew = true;
    }

    let mut consumed = TimeDelta::zero();
    let mut done = 0_u32;
    let mut head_duration = None;
    while let Some(head) = queue.front_mut() {
        let action = match actions.get(&head.action_id) {
            Ok(action) => action,
            Err(err) => {
                log::warn!("dropping queue entry: {err}");
                outcome.skipped.extend(queue.pop_front());
                continue;
            }
        };
        if head.amount == 0 {
            queue.pop_front();
            continue;
        }

        let duration = action.duration();
        let mut completion = Completion {
            action_id: action.id.clone(),
            amount_completed: 0,
            outputs: Vec::new(),
            xp: 0,
        };
        while head.amount > 0 && consumed + duration <= elapsed {
            if done >= max_completions {
                outcome.capped = true;
                break;
            }
            completion.outputs.extend(complete_action(action, items, rng));
            completion.amount_completed += 1;
            completion.xp += action.xp();
            head.amount -= 1;
            consumed += duration;
            done += 1;
        }
        let drained = head.amount == 0;
        if completion.amount_completed > 0 {
            outcome.completed.push(completion);
        }
        if drained {
            queue.pop_front();
            continue;
        }
        head_duration = Some(duration);
        break;
    }

    outcome.queue = queue.into();
    if let Some(duration) = head_duration {
        let into_head = elapsed - consumed;
        outcome.current_action_started_at = Some(started_at + consumed);
        outcome.progress = Some(delta_ratio(into_head, duration));
        outcome.next_poll_in = Some(if outcome.capped {
            TimeDelta::zero()
        } else {
            duration - into_head
        });
    }

    log::debug!(
        "queue poll: {done} completions, {} entries remain, {} skipped{}",
        outcome.queue.len(),
        outcome.skipped.len(),
        if outcome.capped { ", capped" } else { "" }
    );
    outcome
}

/// Queue `amount` repetitions of `action_id`, charging the inputs for every
/// repetition from `inventory` up front.
///
/// A request for the same action as the tail entry extends that entry. An
/// idle queue starts at `now`.
///
/// # Errors
///
/// Returns [`QueueError::UnknownAction`], [`QueueError::ZeroAmount`],
/// [`QueueError::TooManyRepetitions`] or [`QueueError::InsufficientInputs`];
/// neither argument is modified.
pub fn enqueue_action(
    state: &QueueState,
    inventory: &Inventory,
    actions: &ActionCatalog,
    action_id: &str,
    amount: u32,
    now: DateTime<Utc>,
) -> Result<(QueueState, Inventory), QueueError> {
    let action = actions.get(action_id)?;
    if amount == 0 {
        return Err(QueueError::ZeroAmount(action_id.to_string()));
    }

    let mut next = state.clone();
    match next.queue.last_mut() {
        Some(tail) if tail.action_id == action_id => {
            tail.amount = tail
                .amount
                .checked_add(amount)
                .ok_or_else(|| QueueError::TooManyRepetitions(action_id.to_string()))?;
        }
        _ => next.queue.push(QueueEntry::new(action_id, amount)),
    }

    let mut charged = inventory.clone();
    for (input, per_repetition) in action.inputs.iter() {
        charged = remove_items(
            charged,
            input,
            u64::from(per_repetition) * u64::from(amount),
        )?;
    }
    if state.is_idle() {
        next.started_at = Some(now);
    }
    Ok((next, charged))
}

/// Idle queue state.
#[must_use]
pub fn clear_queue() -> QueueState {
    QueueState::default()
}
