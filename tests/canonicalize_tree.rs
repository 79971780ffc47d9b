//! Tree-level behavior through the public API: construction rules,
//! canonicalization rewrites, limits, cloning and the encoded layout.

use qtree::query::{
    canonicalize, encode, CanonicalizeError, Item, ItemFlags, ItemId, ItemSpec, ItemType,
    QueryError, QueryTree, StackReader,
};

/// Composite of `kind` holding one WORD per entry of `words`
fn composite(tree: &mut QueryTree, kind: Item, words: &[&str]) -> ItemId {
    let parent = tree.create(kind);
    for word in words {
        let child = tree.create(Item::word(*word));
        tree.add(parent, child).unwrap();
    }
    parent
}

fn rooted(tree: &mut QueryTree, id: ItemId) {
    tree.set_query_root(id).unwrap();
}

fn from_json(json: &str) -> QueryTree {
    ItemSpec::from_json(json).unwrap().build().unwrap()
}

#[test]
fn test_and_with_false_becomes_false() {
    let mut tree = QueryTree::new();
    let and = tree.create(Item::and());
    let f = tree.create(Item::false_item());
    let a = tree.create(Item::word("a"));
    tree.add(and, f).unwrap();
    tree.add(and, a).unwrap();
    rooted(&mut tree, and);

    canonicalize(&mut tree, None).unwrap();
    let root = tree.query_root().unwrap();
    assert_eq!(tree.item_type(root), Some(ItemType::False));
    assert_eq!(tree.tree_size(), 1);
}

#[test]
fn test_or_with_false_is_the_word_alone() {
    let mut tree = QueryTree::new();
    let or = tree.create(Item::or());
    let f = tree.create(Item::false_item());
    let a = tree.create(Item::word("a"));
    tree.add(or, f).unwrap();
    tree.add(or, a).unwrap();
    rooted(&mut tree, or);

    canonicalize(&mut tree, None).unwrap();
    assert_eq!(tree, QueryTree::with_root(Item::word("a")).unwrap());
}

#[test]
fn test_nested_and_is_flattened() {
    let mut tree = QueryTree::new();
    let outer = tree.create(Item::and());
    let inner = composite(&mut tree, Item::and(), &["a", "b"]);
    let c = tree.create(Item::word("c"));
    tree.add(outer, inner).unwrap();
    tree.add(outer, c).unwrap();
    rooted(&mut tree, outer);

    canonicalize(&mut tree, None).unwrap();
    let root = tree.query_root().unwrap();
    assert_eq!(tree.item_type(root), Some(ItemType::And));
    assert_eq!(tree.child_count(root), 3);
    assert_eq!(tree.to_string(), "AND a b c");
}

#[test]
fn test_equiv_keeps_first_of_duplicates() {
    let mut tree = QueryTree::new();
    let equiv = composite(&mut tree, Item::equiv(), &["x", "x"]);
    rooted(&mut tree, equiv);

    canonicalize(&mut tree, None).unwrap();
    let root = tree.query_root().unwrap();
    assert_eq!(tree.item_type(root), Some(ItemType::Equiv));
    assert_eq!(tree.child_count(root), 1);
    assert_eq!(tree.to_string(), "EQUIV x");
}

#[test]
fn test_canonicalize_is_idempotent() {
    let mut tree = from_json(
        r#"{"type": "rank", "children": [
            {"type": "and", "children": [
                {"type": "null"},
                {"type": "word", "word": "a"},
                {"type": "and", "children": [
                    {"type": "word", "word": "b"},
                    {"type": "or", "children": [{"type": "false"}, {"type": "word", "word": "c"}]}
                ]}
            ]},
            {"type": "word", "word": "b"},
            {"type": "equiv", "children": [
                {"type": "word", "word": "d"},
                {"type": "word", "word": "d"}
            ]}
        ]}"#,
    );

    canonicalize(&mut tree, Some(100)).unwrap();
    let once = tree.clone();
    canonicalize(&mut tree, Some(100)).unwrap();
    assert_eq!(tree, once);
    assert_eq!(tree.to_string(), "RANK (AND a b c) b (EQUIV d)");
}

#[test]
fn test_rank_terms_stop_being_ranked_in_the_match_branch() {
    let mut tree = from_json(
        r#"{"type": "rank", "children": [
            {"type": "and", "children": [
                {"type": "word", "word": "a"},
                {"type": "word", "word": "b"}
            ]},
            {"type": "word", "word": "b"}
        ]}"#,
    );
    canonicalize(&mut tree, None).unwrap();

    let rank = tree.query_root().unwrap();
    let and = tree.child(rank, 0).unwrap();
    let a = tree.item(tree.child(and, 0).unwrap()).unwrap();
    let b = tree.item(tree.child(and, 1).unwrap()).unwrap();
    assert!(a.is_ranked());
    assert!(!b.is_ranked());
    assert!(!b.uses_position_data());

    let ranking_b = tree.item(tree.child(rank, 1).unwrap()).unwrap();
    assert!(ranking_b.is_ranked());
}

#[test]
fn test_inserting_an_ancestor_fails_without_mutation() {
    let mut tree = QueryTree::new();
    let and = tree.create(Item::and());
    let or = composite(&mut tree, Item::or(), &["a", "b"]);
    tree.add(and, or).unwrap();
    rooted(&mut tree, and);
    let before = tree.clone();

    let result = tree.add(or, and);
    assert_eq!(result, Err(QueryError::Cycle { parent: or, child: and }));
    assert_eq!(tree, before);
    assert_eq!(tree.parent(or), Some(and));
    assert_eq!(tree.child_count(or), 2);
}

#[test]
fn test_size_limit_names_limit_and_count() {
    let mut tree = QueryTree::new();
    let and = composite(&mut tree, Item::and(), &["a", "b", "c", "d"]);
    rooted(&mut tree, and);

    // 4 terms plus their AND
    let err = canonicalize(&mut tree, Some(3)).unwrap_err();
    assert_eq!(err, CanonicalizeError::TooManyItems { limit: 3, count: 5 });
    let message = err.to_string();
    assert!(message.contains("Configured limit: 3"));
    assert!(message.contains("Item count: 5"));

    assert!(canonicalize(&mut tree, Some(5)).is_ok());
}

#[test]
fn test_everything_removed_is_no_query() {
    let mut tree = from_json(
        r#"{"type": "or", "children": [
            {"type": "null"},
            {"type": "and", "children": [{"type": "null"}]}
        ]}"#,
    );
    let err = canonicalize(&mut tree, None).unwrap_err();
    assert_eq!(err, CanonicalizeError::NoQuery);
    assert_eq!(err.to_string(), "No query");
}

#[test]
fn test_connectivity_survives_cloning() {
    let mut tree = QueryTree::new();
    let and = composite(&mut tree, Item::and(), &["a", "b"]);
    rooted(&mut tree, and);
    let a = tree.child(and, 0).unwrap();
    let b = tree.child(and, 1).unwrap();
    tree.set_connectivity(b, a, 0.7).unwrap();

    let copy = tree.clone();
    let and2 = copy.query_root().unwrap();
    let a2 = copy.child(and2, 0).unwrap();
    let b2 = copy.child(and2, 1).unwrap();
    let edge = copy.connectivity(b2).unwrap();
    assert_eq!(edge.target, a2);
    assert_eq!(edge.weight, 0.7);
    assert_eq!(copy.connected_backlink(a2), Some(b2));
    assert_eq!(
        copy.item(a2).unwrap().unique_id(),
        tree.item(a).unwrap().unique_id()
    );
}

#[test]
fn test_default_word_layout() {
    let tree = QueryTree::with_root(Item::word("a")).unwrap();
    let mut buf = Vec::new();
    assert_eq!(encode(&tree, &mut buf).unwrap(), 1);
    // tag with no feature bits, empty index, word
    assert_eq!(buf, [0x04, 0x00, 0x01, b'a']);
}

#[test]
fn test_encoded_tree_reads_back_in_pre_order() {
    let mut tree = from_json(
        r#"{"type": "and", "children": [
            {"type": "word", "index": "title", "word": "rust", "weight": 200, "filter": true},
            {"type": "int", "index": "year", "expression": "[2020;2024]"}
        ]}"#,
    );
    canonicalize(&mut tree, None).unwrap();
    let mut buf = Vec::new();
    assert_eq!(encode(&tree, &mut buf).unwrap(), 3);

    let mut reader = StackReader::new(&buf);
    let and = reader.read_header().unwrap();
    assert_eq!(and.item_type, Some(ItemType::And));
    assert_eq!(reader.read_positive(), Some(2));

    let word = reader.read_header().unwrap();
    assert_eq!(word.item_type, Some(ItemType::Word));
    assert_eq!(word.weight, 200);
    assert_eq!(word.unique_id, None);
    assert!(word.flags.contains(ItemFlags::FILTER));
    assert_eq!(reader.read_string(), Some("title"));
    assert_eq!(reader.read_string(), Some("rust"));

    let int = reader.read_header().unwrap();
    assert_eq!(int.item_type, Some(ItemType::Int));
    assert_eq!(reader.read_string(), Some("year"));
    assert_eq!(reader.read_string(), Some("[2020;2024]"));
    assert!(reader.is_at_end());
}

#[test]
fn test_same_element_rejects_composites() {
    let mut tree = QueryTree::new();
    let same = tree.create(Item::same_element("people"));
    let or = composite(&mut tree, Item::or(), &["a"]);
    assert_eq!(
        tree.add(same, or),
        Err(QueryError::IllegalChild {
            parent: ItemType::SameElement,
            child: ItemType::Or,
        })
    );
    assert_eq!(tree.child_count(same), 0);
    assert_eq!(tree.parent(or), None);
}

#[test]
fn test_equiv_drops_repeated_phrase() {
    let mut tree = from_json(
        r#"{"type": "equiv", "children": [
            {"type": "phrase", "index": "f", "children": [
                {"type": "word", "word": "a"}, {"type": "word", "word": "b"}
            ]},
            {"type": "phrase", "index": "f", "children": [
                {"type": "word", "word": "a"}, {"type": "word", "word": "b"}
            ]}
        ]}"#,
    );
    canonicalize(&mut tree, None).unwrap();
    let root = tree.query_root().unwrap();
    assert_eq!(tree.child_count(root), 1);
    assert_eq!(tree.to_string(), r#"EQUIV f:"a b""#);
}

#[test]
fn test_inserting_positive_branch_replaces_true() {
    let mut tree = QueryTree::new();
    let not = tree.create(Item::not());
    let a = tree.create(Item::word("a"));
    let b = tree.create(Item::word("b"));
    tree.add(not, b).unwrap();
    tree.insert(not, 0, a).unwrap();
    rooted(&mut tree, not);

    canonicalize(&mut tree, None).unwrap();
    let root = tree.query_root().unwrap();
    assert_eq!(tree.children(root), &[a, b]);
    assert_eq!(tree.to_string(), "+a -b");
}
