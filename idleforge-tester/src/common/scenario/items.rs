use anyhow::{Context, Result, ensure};
use idleforge_game::constants::STAR_CAP;
use idleforge_game::{
    Inventory, ItemInstance, encode_db_item, enhance_in_inventory, item_fingerprint,
    load_db_item, preview_enhance_item, reforge_item, remove_items, try_stack_item_in_inventory,
};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;

use super::{ScenarioCtx, TestScenario};

const ENHANCERS: [&str; 3] = ["star_shard", "whetstone", "polishing_cloth"];

pub fn item_scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::new(
            "codec-roundtrip",
            "Codec Round Trip",
            "Customized items persist as their delta and reload identically",
            codec_roundtrip,
        ),
        TestScenario::new(
            "stacking-conservation",
            "Stacking Conservation",
            "Deposits and withdrawals keep unit counts and stack caps intact",
            stacking_conservation,
        ),
        TestScenario::new(
            "star-cap",
            "Star Cap",
            "Repeated star enhancement saturates at the cap",
            star_cap,
        ),
    ]
}

fn customized_item(ctx: &ScenarioCtx, rng: &mut impl Rng) -> Result<ItemInstance> {
    let items = &ctx.content.items;
    let ids = items.ids();
    let id = ids.choose(rng).context("builtin content has no items")?;
    let mut item = items.instantiate(id)?;

    if let Some(group) = item.reforge_group()
        && !ctx.content.reforges.options(group).is_empty()
        && rng.gen_bool(0.5)
    {
        item = reforge_item(&item, &ctx.content.reforges, rng)?;
    }
    for _ in 0..rng.gen_range(0..=4) {
        let Some(enhancer) = ENHANCERS.choose(rng) else {
            continue;
        };
        if let Ok(enhanced) = preview_enhance_item(&item, &items.instantiate(enhancer)?) {
            item = enhanced;
        }
    }
    if let Some(cap) = item.stackable().map(|stack| stack.stack) {
        item = item.with_amount(rng.gen_range(1..=cap.max(1)));
    }
    Ok(item)
}

fn codec_roundtrip(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let item = customized_item(ctx, &mut rng)?;

    let db = encode_db_item(&item, ctx.content)?;
    let loaded = load_db_item(&db, ctx.content)?;
    ensure!(
        loaded.modifier_hashes() == item.modifier_hashes(),
        "{} reloaded as {:?}, expected {:?}",
        item.catalog_id,
        loaded.modifier_hashes(),
        item.modifier_hashes()
    );
    ensure!(
        item_fingerprint(&loaded) == item_fingerprint(&item),
        "{} fingerprint changed across reload",
        item.catalog_id
    );

    let defaults = ctx.content.items.get(&item.catalog_id)?.default_hashes();
    let stored: BTreeSet<String> = db.modifiers.iter().cloned().collect();
    ensure!(
        stored.is_disjoint(&defaults),
        "{} persisted catalog defaults {:?}",
        item.catalog_id,
        stored.intersection(&defaults).collect::<Vec<_>>()
    );

    let again = encode_db_item(&loaded, ctx.content)?;
    let restored: BTreeSet<String> = again.modifiers.into_iter().collect();
    ensure!(restored == stored, "{} re-encoded differently", item.catalog_id);
    Ok(())
}

fn assert_caps(inventory: &Inventory) -> Result<()> {
    for item in inventory.items() {
        if let Some(stack) = item.stackable() {
            ensure!(
                stack.amount > 0 && stack.amount <= stack.stack,
                "{} holds {} of {}",
                item.catalog_id,
                stack.amount,
                stack.stack
            );
        }
    }
    Ok(())
}

fn stacking_conservation(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let items = &ctx.content.items;
    let mut inventory = Inventory::new();
    inventory = try_stack_item_in_inventory(items.instantiate("iron_sword")?, inventory);
    let mut held = 0u64;

    for _ in 0..rng.gen_range(10..=60) {
        let amount: u32 = rng.gen_range(1..=150);
        if rng.gen_bool(0.6) {
            let ore = items.instantiate("iron_ore")?.with_amount(amount);
            inventory = try_stack_item_in_inventory(ore, inventory);
            held += u64::from(amount);
        } else {
            match remove_items(inventory.clone(), "iron_ore", u64::from(amount)) {
                Ok(next) => {
                    inventory = next;
                    held -= u64::from(amount);
                }
                Err(err) => ensure!(
                    u64::from(amount) > held,
                    "withdrawal of {amount} from {held} rejected: {err}"
                ),
            }
        }
        assert_caps(&inventory)?;
        ensure!(
            inventory.count_items("iron_ore") == held,
            "inventory holds {} ore, expected {held}",
            inventory.count_items("iron_ore")
        );
        ensure!(
            inventory.count_items("iron_sword") == 1,
            "non-stackable item disturbed by ore movement"
        );
    }
    Ok(())
}

fn star_cap(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let items = &ctx.content.items;
    let applications: u32 = rng.gen_range(1..=STAR_CAP * 2);

    let sword = items.instantiate("iron_sword")?;
    let sword_uid = sword.uid;
    let mut inventory = Inventory::from_items(vec![sword]);
    for _ in 0..applications {
        let shard = items.instantiate("star_shard")?;
        let shard_uid = shard.uid;
        let mut entries = inventory.into_items();
        entries.push(shard);
        inventory = enhance_in_inventory(Inventory::from_items(entries), sword_uid, shard_uid)?;
    }

    let stars = inventory.get(sword_uid).context("sword vanished")?.stars();
    ensure!(
        stars == applications.min(STAR_CAP),
        "{applications} shards gave {stars} stars"
    );
    ensure!(
        inventory.count_items("star_shard") == 0,
        "every application consumes one shard"
    );

    let ore = items.instantiate("iron_ore")?;
    ensure!(
        preview_enhance_item(&ore, &items.instantiate("star_shard")?).is_err(),
        "ore accepted a star shard"
    );
    Ok(())
}
