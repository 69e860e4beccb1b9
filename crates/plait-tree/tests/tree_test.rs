use plait_tree::ThreadTree;

#[test]
fn first_append_creates_top_level_node() {
    let mut tree = ThreadTree::new();
    assert!(tree.is_empty());

    tree.append("msg1");

    assert!(!tree.is_empty());
    assert_eq!(tree.active_path(), vec!["msg1"]);
}

#[test]
fn second_append_nests_under_the_first() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");
    tree.append("msg2");

    assert_eq!(tree.active_path(), vec!["msg1", "msg2"]);
}

#[test]
fn appends_form_a_chain_in_call_order() {
    let mut tree = ThreadTree::new();
    for key in ["msg1", "msg2", "msg3", "msg4"] {
        tree.append(key);
    }

    assert_eq!(tree.active_path(), vec!["msg1", "msg2", "msg3", "msg4"]);
}

#[test]
fn append_preserves_inactive_siblings() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");
    tree.append("msg2");
    tree.branch("msg2a", "msg2");
    tree.append("msg3");
    tree.append("msg4");

    assert_eq!(tree.active_path(), vec!["msg1", "msg2a", "msg3", "msg4"]);
    // The replaced sibling is still in the tree, just off the active path.
    assert!(tree.contains("msg2"));
}

#[test]
fn branch_with_missing_sibling_is_a_no_op() {
    let mut tree = ThreadTree::new();
    tree.branch("variant1", "missing_sibling");
    assert!(tree.is_empty());

    tree.append("msg1");
    let before = tree.clone();
    tree.branch("variant1", "still_missing");
    assert_eq!(tree, before);
}

#[test]
fn branch_at_root_moves_root_active_pointer() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");
    tree.branch("variant1", "msg1");

    assert_eq!(tree.active_path(), vec!["variant1"]);
    assert!(tree.contains("msg1"));
}

#[test]
fn repeated_variants_accumulate_as_siblings() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");

    tree.branch("msg1vA", "msg1");
    assert_eq!(tree.active_path(), vec!["msg1vA"]);

    tree.branch("msg1vB", "msg1");
    assert_eq!(tree.active_path(), vec!["msg1vB"]);
    assert!(tree.contains("msg1"));
    assert!(tree.contains("msg1vA"));
}

#[test]
fn nested_branch_updates_only_the_immediate_parent() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");
    tree.append("msg2");

    tree.branch("msg2a", "msg2");
    assert_eq!(tree.active_path(), vec!["msg1", "msg2a"]);

    tree.branch("msg2b", "msg2");
    assert_eq!(tree.active_path(), vec!["msg1", "msg2b"]);
    assert!(tree.contains("msg2"));
    assert!(tree.contains("msg2a"));
}

#[test]
fn variant_of_a_variant_follows_the_latest() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");
    tree.append("msg2");
    tree.branch("variant_a", "msg2");
    tree.branch("variant_b", "variant_a");

    assert_eq!(tree.active_path(), vec!["msg1", "variant_b"]);
}

#[test]
fn active_path_is_empty_for_empty_tree() {
    let tree = ThreadTree::new();
    assert!(tree.active_path().is_empty());
}

#[test]
fn active_path_is_a_pure_read() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");
    tree.append("msg2");

    let before = tree.clone();
    let first = tree.active_path();
    let second = tree.active_path();
    assert_eq!(first, second);
    assert_eq!(tree, before);
}

#[test]
fn append_continues_below_a_fresh_variant() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");
    tree.append("msg2");
    tree.branch("msg2_variant", "msg2");
    tree.append("msg3");

    assert_eq!(tree.active_path(), vec!["msg1", "msg2_variant", "msg3"]);
}

#[test]
fn serde_round_trip_preserves_structure() {
    let mut tree = ThreadTree::new();
    tree.append("msg1");
    tree.append("msg2");
    tree.branch("msg2a", "msg2");
    tree.append("msg3");

    let json = serde_json::to_string(&tree).unwrap();
    let restored: ThreadTree = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, tree);
    assert_eq!(restored.active_path(), vec!["msg1", "msg2a", "msg3"]);
}
