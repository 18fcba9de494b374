use anyhow::{Context, Result, ensure};
use chrono::{DateTime, TimeDelta, Utc};
use idleforge_game::constants::DEFAULT_MAX_COMPLETIONS_PER_POLL;
use idleforge_game::{
    Inventory, QueueEntry, QueueError, QueueOutcome, QueueState, complete_action, enqueue_action,
    poll_rng, process_queue_until_now, try_stack_item_in_inventory,
};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

use super::{ScenarioCtx, TestScenario};

const TESTER_PLAYER: &str = "tester";
const LOOT_SAMPLES: u32 = 2_000;

pub fn queue_scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::new(
            "smoke",
            "Smoke",
            "Builtin content loads and a short mining queue completes on schedule",
            smoke,
        ),
        TestScenario::new(
            "queue-conservation",
            "Queue Conservation",
            "Completed plus remaining repetitions always equal what was queued",
            queue_conservation,
        ),
        TestScenario::new(
            "split-poll",
            "Split Poll",
            "Polling twice reaches the same state as polling once",
            split_poll,
        ),
        TestScenario::new(
            "zero-elapsed",
            "Zero Elapsed",
            "Polling at or before the start time changes nothing",
            zero_elapsed,
        ),
        TestScenario::new(
            "stale-queue",
            "Stale Queue",
            "Entries for removed actions are skipped without stalling the queue",
            stale_queue,
        ),
        TestScenario::new(
            "loot-rate",
            "Loot Rate",
            "Ranged and guaranteed outputs match their configured rates",
            loot_rate,
        ),
        TestScenario::new(
            "enqueue-charging",
            "Enqueue Charging",
            "Enqueueing charges every repetition's inputs up front or nothing at all",
            enqueue_charging,
        ),
    ]
}

fn poll(ctx: &ScenarioCtx, state: QueueState, now: DateTime<Utc>) -> QueueOutcome {
    let mut rng = poll_rng(ctx.seed, TESTER_PLAYER, state.started_at);
    process_queue_until_now(
        &ctx.content.actions,
        &ctx.content.items,
        state,
        now,
        &mut rng,
        DEFAULT_MAX_COMPLETIONS_PER_POLL,
    )
}

fn random_queue(ctx: &ScenarioCtx, rng: &mut impl Rng) -> Result<QueueState> {
    let actions = ctx.content.actions.sorted();
    let len = rng.gen_range(1..=6);
    let mut queue = Vec::with_capacity(len);
    for _ in 0..len {
        let action = actions.choose(rng).context("builtin content has no actions")?;
        queue.push(QueueEntry::new(action.id.clone(), rng.gen_range(1..=5)));
    }
    Ok(QueueState {
        queue,
        started_at: Some(ctx.epoch()),
    })
}

/// Wall-clock time needed to drain every known entry of `state`.
fn queue_span(ctx: &ScenarioCtx, state: &QueueState) -> Result<TimeDelta> {
    let mut span = TimeDelta::zero();
    for entry in &state.queue {
        let Ok(action) = ctx.content.actions.get(&entry.action_id) else {
            continue;
        };
        let repetitions = i32::try_from(entry.amount).context("queue amount overflow")?;
        span += action.duration() * repetitions;
    }
    Ok(span)
}

fn queued_totals(queue: &[QueueEntry]) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for entry in queue {
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

fn smoke(ctx: &ScenarioCtx) -> Result<()> {
    ensure!(!ctx.content.items.is_empty(), "item catalog is empty");
    ensure!(!ctx.content.actions.is_empty(), "action catalog is empty");

    let t0 = ctx.epoch();
    let (state, inventory) = enqueue_action(
        &QueueState::default(),
        &Inventory::new(),
        &ctx.content.actions,
        "iron_ore_mine",
        3,
        t0,
    )?;
    ensure!(inventory.is_empty(), "mining should not charge inputs");
    ensure!(state.started_at == Some(t0), "idle queue should start at now");

    let outcome = poll(ctx, state, t0 + TimeDelta::seconds(12));
    ensure!(
        outcome.completed_count("iron_ore_mine") == 2,
        "expected 2 completions after 12s, got {}",
        outcome.completed_count("iron_ore_mine")
    );
    ensure!(
        outcome.queue == vec![QueueEntry::new("iron_ore_mine", 1)],
        "unexpected residual queue {:?}",
        outcome.queue
    );
    ensure!(
        outcome.current_action_started_at == Some(t0 + TimeDelta::seconds(10)),
        "head should restart at +10s"
    );
    ensure!(
        outcome.next_poll_in == Some(TimeDelta::seconds(3)),
        "next poll should be due in 3s, got {:?}",
        outcome.next_poll_in
    );
    if ctx.verbose {
        println!("     ↳ smoke produced {} items", outcome.outputs().count());
    }
    Ok(())
}

fn queue_conservation(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let state = random_queue(ctx, &mut rng)?;
    let span = queue_span(ctx, &state)?;
    let elapsed = rng.gen_range(0..=span.num_seconds() + 60);
    let now = ctx.epoch() + TimeDelta::seconds(elapsed);

    let queued = queued_totals(&state.queue);
    let outcome = poll(ctx, state, now);
    let completed = completed_totals(&outcome);
    let remaining = queued_totals(&outcome.queue);
    for (action, total) in &queued {
        let done = completed.get(action).copied().unwrap_or(0);
        let left = remaining.get(action).copied().unwrap_or(0);
        ensure!(
            done + left == *total,
            "{action}: {done} done + {left} left != {total} queued at +{elapsed}s"
        );
    }

    if outcome.queue.is_empty() {
        ensure!(
            outcome.current_action_started_at.is_none(),
            "drained queue should be idle"
        );
    } else {
        let started = outcome
            .current_action_started_at
            .context("busy queue lost its start time")?;
        ensure!(started <= now, "head started in the future");
        let progress = outcome.progress.unwrap_or(-1.0);
        ensure!(
            (0.0..1.0).contains(&progress),
            "head progress {progress} out of range"
        );
        ensure!(
            outcome.next_poll_in.is_some_and(|wait| wait > TimeDelta::zero()),
            "next poll must be in the future"
        );
    }
    Ok(())
}

fn split_poll(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let state = random_queue(ctx, &mut rng)?;
    let span = queue_span(ctx, &state)?.num_seconds();
    let end_offset = rng.gen_range(0..=span + 30);
    let split = rng.gen_range(0..=end_offset);
    let end = ctx.epoch() + TimeDelta::seconds(end_offset);

    let single = poll(ctx, state.clone(), end);
    let first = poll(ctx, state, ctx.epoch() + TimeDelta::seconds(split));
    let second = poll(ctx, first.state(), end);

    let mut combined = completed_totals(&first);
    for (action, count) in completed_totals(&second) {
        *combined.entry(action).or_default() += count;
    }
    ensure!(
        combined == completed_totals(&single),
        "split at +{split}s of +{end_offset}s completed {combined:?}, single poll {:?}",
        completed_totals(&single)
    );
    ensure!(
        second.state() == single.state(),
        "split at +{split}s of +{end_offset}s diverged: {:?} vs {:?}",
        second.state(),
        single.state()
    );
    Ok(())
}

fn zero_elapsed(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let state = random_queue(ctx, &mut rng)?;

    let outcome = poll(ctx, state.clone(), ctx.epoch());
    ensure!(outcome.completed.is_empty(), "nothing should complete at +0s");
    ensure!(outcome.state() == state, "state changed at +0s");
    ensure!(!outcome.clock_skew, "no skew expected at +0s");

    let skew = rng.gen_range(1..=3_600);
    let outcome = poll(ctx, state.clone(), ctx.epoch() - TimeDelta::seconds(skew));
    ensure!(outcome.clock_skew, "expected clock skew at -{skew}s");
    ensure!(outcome.completed.is_empty(), "nothing should complete at -{skew}s");
    ensure!(outcome.state() == state, "state changed at -{skew}s");
    Ok(())
}

fn stale_queue(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let mut state = random_queue(ctx, &mut rng)?;
    let known = queued_totals(&state.queue);
    let stale = QueueEntry::new("retired_action", rng.gen_range(1..=9));
    let position = rng.gen_range(0..=state.queue.len());
    state.queue.insert(position, stale.clone());

    let span = queue_span(ctx, &state)?;
    let outcome = poll(ctx, state, ctx.epoch() + span);
    ensure!(
        outcome.skipped == vec![stale],
        "expected the retired entry to be skipped, got {:?}",
        outcome.skipped
    );
    ensure!(outcome.queue.is_empty(), "queue should drain after its span");
    ensure!(
        completed_totals(&outcome) == known,
        "known entries did not all complete"
    );
    Ok(())
}

fn loot_rate(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let coal = ctx.content.actions.get("coal_mine")?;
    let ore = ctx.content.actions.get("iron_ore_mine")?;

    let mut coal_total = 0u32;
    for _ in 0..LOOT_SAMPLES {
        let batch = complete_action(coal, &ctx.content.items, &mut rng);
        ensure!(
            (1..=2).contains(&batch.len()),
            "coal batch of {} items",
            batch.len()
        );
        coal_total += u32::try_from(batch.len())?;

        let mined = complete_action(ore, &ctx.content.items, &mut rng);
        let ore_count = mined
            .iter()
            .filter(|item| item.catalog_id == "iron_ore")
            .count();
        ensure!(ore_count == 1, "ore is guaranteed once per repetition");
    }
    let mean = f64::from(coal_total) / f64::from(LOOT_SAMPLES);
    ensure!(
        (mean - 1.5).abs() <= 0.1,
        "coal mean {mean:.3} drifted from 1.5"
    );

    let state = QueueState {
        queue: vec![QueueEntry::new("coal_mine", 25)],
        started_at: Some(ctx.epoch()),
    };
    let now = ctx.epoch() + TimeDelta::seconds(100);
    let first: Vec<String> = poll(ctx, state.clone(), now)
        .outputs()
        .map(|item| item.catalog_id.clone())
        .collect();
    let replay: Vec<String> = poll(ctx, state, now)
        .outputs()
        .map(|item| item.catalog_id.clone())
        .collect();
    ensure!(first == replay, "replayed poll rolled different loot");
    Ok(())
}

fn enqueue_charging(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let items = &ctx.content.items;
    let ore_held: u32 = rng.gen_range(0..=20);
    let coal_held: u32 = rng.gen_range(0..=10);
    let repetitions: u32 = rng.gen_range(1..=8);
    let mut inventory = Inventory::new();
    if ore_held > 0 {
        inventory = try_stack_item_in_inventory(
            items.instantiate("iron_ore")?.with_amount(ore_held),
            inventory,
        );
    }
    if coal_held > 0 {
        inventory =
            try_stack_item_in_inventory(items.instantiate("coal")?.with_amount(coal_held), inventory);
    }

    let affordable = ore_held >= 2 * repetitions && coal_held >= repetitions;
    let result = enqueue_action(
        &QueueState::default(),
        &inventory,
        &ctx.content.actions,
        "iron_bar_smelt",
        repetitions,
        ctx.epoch(),
    );
    match result {
        Ok((state, charged)) => {
            ensure!(
                affordable,
                "charged {repetitions} smelts from {ore_held} ore and {coal_held} coal"
            );
            ensure!(
                charged.count_items("iron_ore") == u64::from(ore_held - 2 * repetitions),
                "ore not charged per repetition"
            );
            ensure!(
                charged.count_items("coal") == u64::from(coal_held - repetitions),
                "coal not charged per repetition"
            );
            ensure!(
                state.remaining("iron_bar_smelt") == u64::from(repetitions),
                "queue does not hold {repetitions} smelts"
            );
        }
        Err(QueueError::InsufficientInputs(_)) => {
            ensure!(
                !affordable,
                "rejected an affordable enqueue of {repetitions} smelts"
            );
            ensure!(
                inventory.count_items("iron_ore") == u64::from(ore_held),
                "failed enqueue touched the inventory"
            );
        }
        Err(other) => return Err(other.into()),
    }
    Ok(())
}
