use chrono::{DateTime, TimeDelta, Utc};
use idleforge_game::{
    Content, QueueEntry, QueueOutcome, QueueState, poll_rng, process_queue_until_now,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;

const CAP: u32 = 10_000;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
}

fn poll(state: QueueState, now: DateTime<Utc>) -> QueueOutcome {
    let content = Content::builtin();
    let mut rng = poll_rng(7, "tester", state.started_at);
    process_queue_until_now(&content.actions, &content.items, state, now, &mut rng, CAP)
}

fn mixed_queue() -> QueueState {
    QueueState {
        queue: vec![
            QueueEntry::new("iron_ore_mine", 4),
            QueueEntry::new("coal_mine", 3),
            QueueEntry::new("iron_bar_smelt", 2),
            QueueEntry::new("iron_ore_mine", 2),
        ],
        started_at: Some(t0()),
    }
}

fn queued_totals(state: &QueueState) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for entry in &state.queue {
        *totals.entry(entry.action_id.clone()).or_default() += u64::from(entry.amount);
    }
    totals
}

fn completed_totals(outcome: &QueueOutcome) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for completion in &outcome.completed {
        *totals.entry(completion.action_id.clone()).or_default() +=
            u64::from(completion.amount_completed);
    }
    totals
}

#[test]
fn twelve_seconds_of_five_second_mining() {
    let state = QueueState {
        queue: vec![QueueEntry::new("iron_ore_mine", 3)],
        started_at: Some(t0()),
    };
    let outcome = poll(state, t0() + TimeDelta::seconds(12));
    assert_eq!(outcome.completed.len(), 1);
    assert_eq!(outcome.completed[0].amount_completed, 2);
    assert_eq!(outcome.queue, vec![QueueEntry::new("iron_ore_mine", 1)]);
    assert_eq!(
        outcome.current_action_started_at,
        Some(t0() + TimeDelta::seconds(10))
    );
    assert_eq!(outcome.next_poll_in, Some(TimeDelta::seconds(3)));
}

#[test]
fn zero_elapsed_returns_queue_untouched() {
    let outcome = poll(mixed_queue(), t0());
    assert!(outcome.completed.is_empty());
    assert_eq!(outcome.queue, mixed_queue().queue);
    assert_eq!(outcome.current_action_started_at, Some(t0()));
}

#[test]
fn repetitions_are_conserved_for_any_elapsed_time() {
    let queued = queued_totals(&mixed_queue());
    for seconds in 0..=120 {
        let outcome = poll(mixed_queue(), t0() + TimeDelta::seconds(seconds));
        let completed = completed_totals(&outcome);
        let remaining = queued_totals(&outcome.state());
        for (action, total) in &queued {
            let done = completed.get(action).copied().unwrap_or(0);
            let left = remaining.get(action).copied().unwrap_or(0);
            assert_eq!(done + left, *total, "{action} at +{seconds}s");
        }
    }
}

#[test]
fn split_polls_match_a_single_poll() {
    let end = t0() + TimeDelta::seconds(50);
    let single = poll(mixed_queue(), end);
    assert_eq!(single.queue, vec![QueueEntry::new("iron_ore_mine", 2)]);
    for split in [1, 4, 5, 9, 23, 32, 40, 47, 49] {
        let first = poll(mixed_queue(), t0() + TimeDelta::seconds(split));
        let second = poll(first.state(), end);
        let mut combined = completed_totals(&first);
        for (action, count) in completed_totals(&second) {
            *combined.entry(action).or_default() += count;
        }
        assert_eq!(combined, completed_totals(&single), "split at +{split}s");
        assert_eq!(second.state(), single.state(), "split at +{split}s");
    }
}

#[test]
fn outputs_follow_each_repetition() {
    let outcome = poll(mixed_queue(), t0() + TimeDelta::hours(1));
    assert!(outcome.queue.is_empty());
    assert_eq!(outcome.current_action_started_at, None);
    let ore = outcome
        .outputs()
        .filter(|item| item.catalog_id == "iron_ore")
        .count();
    assert_eq!(ore, 6);
    let bars = outcome
        .outputs()
        .filter(|item| item.catalog_id == "iron_bar")
        .count();
    assert_eq!(bars, 2);
    assert_eq!(outcome.total_xp(), 6 * 5 + 3 * 4 + 2 * 12);
}

#[test]
fn same_persisted_state_rolls_same_loot() {
    let state = QueueState {
        queue: vec![QueueEntry::new("coal_mine", 50)],
        started_at: Some(t0()),
    };
    let now = t0() + TimeDelta::seconds(150);
    let count = |outcome: &QueueOutcome| outcome.outputs().count();
    assert_eq!(count(&poll(state.clone(), now)), count(&poll(state, now)));
}

#[test]
fn stale_entries_heal_without_blocking_the_queue() {
    let state = QueueState {
        queue: vec![
            QueueEntry::new("iron_ore_mine", 1),
            QueueEntry::new("retired_action", 9),
            QueueEntry::new("coal_mine", 1),
        ],
        started_at: Some(t0()),
    };
    let outcome = poll(state, t0() + TimeDelta::seconds(9));
    assert_eq!(outcome.skipped, vec![QueueEntry::new("retired_action", 9)]);
    assert_eq!(outcome.completed_count("iron_ore_mine"), 1);
    assert_eq!(outcome.completed_count("coal_mine"), 1);
    assert!(outcome.queue.is_empty());
}

#[test]
fn injected_rng_is_honoured() {
    let content = Content::builtin();
    let state = QueueState {
        queue: vec![QueueEntry::new("coal_mine", 20)],
        started_at: Some(t0()),
    };
    let now = t0() + TimeDelta::seconds(80);
    let run = |seed: u64| {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        process_queue_until_now(
            &content.actions,
            &content.items,
            state.clone(),
            now,
            &mut rng,
            CAP,
        )
        .outputs()
        .count()
    };
    assert_eq!(run(11), run(11));
    assert!((20..=40).contains(&run(12)));
}
