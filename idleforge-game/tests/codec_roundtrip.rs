use idleforge_game::modifiers::{Enchant, Enchantment, Reforge, StatDelta, Stars};
use idleforge_game::{
    Content, DbItem, Inventory, ItemInstance, Modifier, ModifierKind, encode_db_item,
    encode_inventory, enhance_in_inventory, item_fingerprint, load_db_item, load_inventory,
    reforge_item,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use smallvec::smallvec;

fn content() -> &'static Content {
    Content::builtin()
}

fn hydrate(id: &str) -> ItemInstance {
    content().items.instantiate(id).expect("builtin item")
}

fn assert_stable(db: &DbItem) {
    let first = load_db_item(db, content()).expect("loads");
    let encoded = encode_db_item(&first, content()).expect("encodes");
    let second = load_db_item(&encoded, content()).expect("reloads");
    assert_eq!(first.modifier_hashes(), second.modifier_hashes(), "{db:?}");
    assert_eq!(item_fingerprint(&first), item_fingerprint(&second));
}

#[test]
fn every_catalog_item_round_trips_untouched() {
    for id in content().items.ids() {
        assert_stable(&DbItem {
            id: id.to_string(),
            modifiers: Vec::new(),
        });
    }
}

#[test]
fn customized_items_round_trip() {
    let registry = &content().registry;
    let records = [
        DbItem {
            id: "iron_sword".to_string(),
            modifiers: vec![
                registry.hash(&Modifier::Stars(Stars { count: 12 })),
                registry.hash(&Modifier::Reforge(Reforge {
                    reforge_name: "Heavy".to_string(),
                    stats: vec![StatDelta::new("speed", -0.2), StatDelta::new("damage", 5.0)],
                })),
            ],
        },
        DbItem {
            id: "ancient_sword".to_string(),
            modifiers: vec![registry.hash(&Modifier::Enchantment(Enchantment {
                enchants: vec![Enchant {
                    name: "Smite".to_string(),
                    level: 4,
                    max_level: 5,
                    applies_to: smallvec!["Sword".to_string()],
                }],
            }))],
        },
        DbItem {
            id: "iron_ore".to_string(),
            modifiers: vec![r#"stackable:{"stack":64,"amount":63}"#.to_string()],
        },
    ];
    for record in &records {
        assert_stable(record);
    }
}

#[test]
fn encoding_stores_only_the_delta() {
    let sword = hydrate("iron_sword");
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let reforged = reforge_item(&sword, &content().reforges, &mut rng).expect("reforgeable");
    let db = encode_db_item(&reforged, content()).expect("encodes");
    assert_eq!(db.modifiers.len(), 1);
    assert!(db.modifiers[0].starts_with("reforge:"));

    let loaded = load_db_item(&db, content()).expect("loads");
    let kinds: Vec<ModifierKind> = loaded.modifiers.iter().map(Modifier::kind).collect();
    assert_eq!(
        kinds,
        vec![
            ModifierKind::Equippable,
            ModifierKind::Reforgeable,
            ModifierKind::Reforge
        ]
    );
}

#[test]
fn enhanced_inventory_survives_persistence() {
    let sword = hydrate("iron_sword");
    let shards = hydrate("star_shard").with_amount(3);
    let book = hydrate("smite_book");
    let (sword_uid, shard_uid, book_uid) = (sword.uid, shards.uid, book.uid);
    let inventory = Inventory::from_items(vec![sword, shards, book]);
    let inventory = enhance_in_inventory(inventory, sword_uid, shard_uid).expect("stars");
    let inventory = enhance_in_inventory(inventory, sword_uid, shard_uid).expect("stars");
    assert!(enhance_in_inventory(inventory.clone(), sword_uid, book_uid).is_err());

    let records = encode_inventory(&inventory, content()).expect("encodes");
    let (reloaded, issues) = load_inventory(&records, content());
    assert!(issues.is_empty());
    assert_eq!(reloaded.len(), inventory.len());
    for (before, after) in inventory.items().iter().zip(reloaded.items()) {
        assert_eq!(before.modifier_hashes(), after.modifier_hashes());
    }
    assert_eq!(reloaded.items()[0].stars(), 2);
    assert_eq!(reloaded.count_items("star_shard"), 1);
}

#[test]
fn reforge_amounts_are_stored_bit_exact() {
    let registry = &content().registry;
    let amount = -922.812_265_974_187_5;
    let record = DbItem {
        id: "iron_sword".to_string(),
        modifiers: vec![registry.hash(&Modifier::Reforge(Reforge {
            reforge_name: "Heavy".to_string(),
            stats: vec![StatDelta::new("damage", amount)],
        }))],
    };
    let loaded = load_db_item(&record, content()).expect("loads");
    let reforge = loaded
        .modifiers
        .iter()
        .find_map(|m| match m {
            Modifier::Reforge(reforge) => Some(reforge),
            _ => None,
        })
        .expect("reforge kept");
    assert_eq!(reforge.stats[0].amount.to_bits(), f64::to_bits(amount));

    let encoded = encode_db_item(&loaded, content()).expect("encodes");
    assert_eq!(encoded, record);
    assert_stable(&encoded);
}
