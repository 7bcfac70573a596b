/// Expansion integration tests — content loaded from disk, expanded end to end.

use curly_engine::core::engine::{CurlyEngine, EngineError};
use curly_engine::core::expansion::{Expansion, ExpansionError, MAX_TREE_ENTRIES};
use curly_engine::core::render::TextType;
use curly_engine::core::store::{ContentStore, LookupError};
use curly_engine::schema::entity::Entity;

const CONTENT_DIR: &str = "tests/fixtures/content";

fn build_engine(seed: u64) -> CurlyEngine {
    CurlyEngine::builder()
        .seed(seed)
        .content_dir(CONTENT_DIR)
        .build()
        .unwrap()
}

#[test]
fn content_loads_recursively() {
    let engine = build_engine(1);
    assert_eq!(engine.store().len(), 7);
    assert!(engine.store().get("copper_piece").is_some());
    assert!(engine.store().get("loot").unwrap().has_table());
}

#[test]
fn camp_without_rolling() {
    let mut engine = build_engine(5);
    let expansion = engine.expand("goblin_camp", true, false).unwrap();

    assert_eq!(expansion.tree.len(), 6);
    let entities: Vec<&str> = expansion.tree.iter().map(|n| n.entity.as_str()).collect();
    assert_eq!(
        entities,
        vec![
            "goblin_camp",
            "goblin",
            "goblin",
            "campfire",
            "copper_piece",
            "copper_piece"
        ]
    );

    // Goblins carry a dice quantity, so each is its own node.
    assert!(expansion.tree.get(1).unwrap().unique);
    assert!(expansion.tree.get(2).unwrap().unique);
    assert!(expansion.tree.get(1).unwrap().text.contains("{1d4 copper_piece}"));

    assert_eq!(expansion.non_unique.get("campfire").unwrap().count, 1);
    assert_eq!(expansion.non_unique.get("copper_piece").unwrap().count, 2);
    assert!(expansion.non_unique.get("goblin").is_none());
}

#[test]
fn camp_with_rolling() {
    let mut engine = build_engine(5);
    let expansion = engine.expand("goblin_camp", true, true).unwrap();

    let root = expansion.tree.get(0).unwrap();
    assert!(root.text.contains("1 goblin and 1 goblin sit by a 1 campfire."));

    let coins = expansion.non_unique.get("copper_piece").unwrap().count as usize;
    assert!((2..=8).contains(&coins));
    assert_eq!(expansion.tree.len(), 4 + coins);

    for goblin in expansion.tree.iter().filter(|n| n.entity == "goblin") {
        assert!(goblin.unique);
        assert!(!goblin.text.contains('{'));
        assert!(goblin.text.contains(" copper_piece."));
    }
}

#[test]
fn typeset_camp_matches_markdown_tree() {
    let mut engine = CurlyEngine::builder()
        .seed(5)
        .content_dir(CONTENT_DIR)
        .text_type(TextType::Typeset)
        .build()
        .unwrap();
    let typeset = engine.expand("goblin_camp", true, false).unwrap();
    let markdown = build_engine(5).expand("goblin_camp", true, false).unwrap();

    assert_eq!(typeset.tree.len(), 6);
    let entities =
        |e: &Expansion| -> Vec<String> { e.tree.iter().map(|n| n.entity.clone()).collect() };
    assert_eq!(entities(&typeset), entities(&markdown));

    let root = typeset.tree.get(0).unwrap();
    assert!(root.text.starts_with("\\textbf{\\large{Goblin Camp}}"));
    let goblin = typeset.tree.get(1).unwrap();
    assert!(goblin.text.contains("Carries 1d4 copper\\_piece."));
    assert_eq!(typeset.non_unique.get("copper_piece").unwrap().count, 2);
}

#[test]
fn large_literal_quantities_are_capped_or_rejected() {
    let mut engine = build_engine(1);
    let expansion = engine.expand("{20000 campfire}", false, false).unwrap();
    assert_eq!(expansion.tree.len(), MAX_TREE_ENTRIES);

    assert!(matches!(
        engine.expand("{99999999999 campfire}", false, false),
        Err(EngineError::Expansion(ExpansionError::Dice(_)))
    ));
}

#[test]
fn table_result_nests_placeholders() {
    let mut engine = build_engine(8);
    let expansion = engine.expand("{crossroads 1}", true, true).unwrap();
    let root = expansion.tree.get(0).unwrap();
    assert!(root
        .text
        .ends_with("Table Result:  \nA 1 goblin_camp by the milestone.\n"));
    assert!(!root.text.contains("| Roll |"));
    assert_eq!(expansion.tree.get(1).unwrap().entity, "goblin_camp");
}

#[test]
fn table_gap_uses_lower_outcome() {
    let mut engine = build_engine(8);
    let expansion = engine.expand("{crossroads 3}", false, true).unwrap();
    assert!(expansion
        .tree
        .get(0)
        .unwrap()
        .text
        .contains("An empty road."));
}

#[test]
fn table_outcome_quantities_expand() {
    let mut engine = build_engine(2);
    let expansion = engine.expand("{loot 2}", true, true).unwrap();
    assert!(expansion.tree.get(0).unwrap().text.contains("2 copper_piece"));
    assert_eq!(expansion.tree.len(), 3);

    let expansion = engine.expand("{loot 6}", true, true).unwrap();
    assert_eq!(expansion.tree.len(), 1);
    assert!(expansion
        .tree
        .get(0)
        .unwrap()
        .text
        .contains("Nothing of value."));
}

#[test]
fn evaluate_renders_tree() {
    let mut engine = build_engine(3);
    let text = engine.evaluate_one("goblin_camp", true, false).unwrap();
    assert!(text.starts_with("### Non Unique Entities:\n"));
    assert!(text.contains("\n1 campfire  \n\n#### Campfire  \n"));
    assert!(text.contains("\n2 copper_piece  \n\n#### Copper Piece  \n"));
    assert!(text.contains("### Unique Entities, Full Tree:\n\n#### Goblin Camp  \n"));
}

#[test]
fn evaluate_flat_entity_by_display_name() {
    let mut engine = build_engine(3);
    let text = engine.evaluate_one("Copper Piece", true, false).unwrap();
    assert_eq!(
        text,
        "#### Copper Piece  \n**Tags:** treasure  \n**Cost:** 1cp  \nA small dull coin.  \n"
    );
}

#[test]
fn evaluate_rolled_quantity_heading() {
    let mut engine = build_engine(3);
    let text = engine.evaluate_one("{1d4 goblin}", false, true).unwrap();
    let (count, rest) = text.split_once(' ').unwrap();
    assert!((1..=4).contains(&count.parse::<u32>().unwrap()));
    assert!(rest.starts_with("Goblin  \n#### Goblin  \n"));
    assert!(!rest.contains('{'));
}

#[test]
fn evaluate_bare_dice() {
    let mut engine = build_engine(3);
    let value: u32 = engine
        .evaluate_one("3d6+2", false, true)
        .unwrap()
        .parse()
        .unwrap();
    assert!((5..=20).contains(&value));
}

#[test]
fn same_seed_same_tree() {
    let mut a = build_engine(99);
    let mut b = build_engine(99);
    for token in ["goblin_camp", "loot", "crossroads"] {
        let left = a.expand(token, true, true).unwrap();
        let right = b.expand(token, true, true).unwrap();
        assert_eq!(left.tree, right.tree);
    }
}

#[test]
fn self_reference_stops_at_cap() {
    let mut store = ContentStore::load_from_dir(std::path::Path::new(CONTENT_DIR)).unwrap();
    store
        .insert("mirror", Entity::new("Mirror", "Reflects a {mirror}."))
        .unwrap();
    let mut engine = CurlyEngine::builder()
        .with_store(store)
        .build()
        .unwrap();
    let expansion = engine.expand("mirror", true, true).unwrap();
    assert_eq!(expansion.tree.len(), MAX_TREE_ENTRIES);
    assert_eq!(
        expansion.non_unique.get("mirror").unwrap().count as usize,
        MAX_TREE_ENTRIES - 1
    );
}

#[test]
fn unknown_and_ambiguous_names_fail() {
    let mut engine = build_engine(0);
    match engine.evaluate_one("dragon", true, true) {
        Err(EngineError::Expansion(ExpansionError::Lookup(LookupError::EntityNotFound(name)))) => {
            assert_eq!(name, "dragon")
        }
        other => panic!("expected a lookup failure, got {:?}", other),
    }

    let mut store = ContentStore::new();
    store.insert("a", Entity::new("Twin", "One.")).unwrap();
    store.insert("b", Entity::new("twin", "Two.")).unwrap();
    let mut engine = CurlyEngine::builder().with_store(store).build().unwrap();
    assert!(matches!(
        engine.evaluate_one("Twin", false, false),
        Err(EngineError::Expansion(ExpansionError::Lookup(
            LookupError::AmbiguousEntity { matches: 2, .. }
        )))
    ));
}

#[test]
fn multiple_tokens_rejected() {
    let mut engine = build_engine(0);
    assert!(matches!(
        engine.evaluate_one("{goblin} {campfire}", true, true),
        Err(EngineError::Expansion(ExpansionError::NotSingleToken(2)))
    ));
}
