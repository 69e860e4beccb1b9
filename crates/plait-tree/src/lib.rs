//! Branching message tree for chat threads.
//!
//! A thread's history is a tree of completion keys. At every level exactly
//! one child is "active" (or none, at a fresh leaf); the walk from the root
//! along active pointers is the active path — the ordered sequence of
//! completions the thread currently displays and sends to the model.
//! Variants (alternate continuations) live as siblings of the node they
//! replace and flip only their immediate parent's active pointer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A node in the thread tree.
///
/// `Leaf` is a terminal marker: a completion with no continuation yet.
/// `Branch` holds the continuations recorded under a completion, with
/// `active` naming the currently selected child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Leaf,
    Branch {
        children: BTreeMap<String, Node>,
        active: Option<String>,
    },
}

/// Persistent tree of completion keys with a single active path.
///
/// All operations tolerate structurally inconsistent input (missing keys,
/// dangling active pointers) by leaving the tree unchanged rather than
/// failing; reentrant callers hold stale keys routinely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadTree {
    children: BTreeMap<String, Node>,
    active: Option<String>,
}

impl ThreadTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether `key` exists anywhere in the tree.
    pub fn contains(&self, key: &str) -> bool {
        contains_in(&self.children, key)
    }

    /// Appends `new_key` at the end of the active path.
    ///
    /// Walks from the root along active pointers until reaching a true
    /// leaf, then attaches `new_key` below it and marks it active. After
    /// this call `active_path()` ends with `new_key`.
    pub fn append(&mut self, new_key: &str) {
        append_at(&mut self.children, &mut self.active, new_key);
    }

    /// Inserts `new_key` as a variant alongside `sibling_key`.
    ///
    /// The parent level containing `sibling_key` is located (top level
    /// first, then depth-first) and its active pointer moves to `new_key`.
    /// Active-ness does not propagate past that immediate parent: switching
    /// a variant deep in the tree leaves every ancestor pointer untouched.
    /// A missing `sibling_key` leaves the tree unchanged.
    pub fn branch(&mut self, new_key: &str, sibling_key: &str) {
        if self.children.contains_key(sibling_key) {
            self.children.insert(new_key.to_string(), Node::Leaf);
            self.active = Some(new_key.to_string());
            return;
        }
        if !branch_in(&mut self.children, new_key, sibling_key) {
            tracing::debug!(sibling = sibling_key, "variant sibling not found; tree unchanged");
        }
    }

    /// The ordered sequence of keys from the root to the active leaf.
    ///
    /// Pure read; stops at a terminal marker, an absent pointer, or a
    /// pointer naming a missing child.
    pub fn active_path(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut children = &self.children;
        let mut active = self.active.as_ref();
        while let Some(key) = active {
            match children.get(key) {
                Some(Node::Branch { children: sub, active: sub_active }) => {
                    out.push(key.clone());
                    children = sub;
                    active = sub_active.as_ref();
                }
                Some(Node::Leaf) => {
                    out.push(key.clone());
                    break;
                }
                None => break,
            }
        }
        out
    }
}

fn append_at(children: &mut BTreeMap<String, Node>, active: &mut Option<String>, new_key: &str) {
    if let Some(key) = active.clone() {
        match children.get_mut(&key) {
            Some(Node::Branch { children: sub, active: sub_active }) => {
                return append_at(sub, sub_active, new_key);
            }
            Some(node @ Node::Leaf) => {
                // The active child is a terminal marker: attach below it.
                let mut sub = BTreeMap::new();
                sub.insert(new_key.to_string(), Node::Leaf);
                *node = Node::Branch {
                    children: sub,
                    active: Some(new_key.to_string()),
                };
                return;
            }
            None => {
                // Dangling pointer; attach at this level instead.
                tracing::debug!(active = %key, "active pointer names a missing child");
            }
        }
    }
    children.insert(new_key.to_string(), Node::Leaf);
    *active = Some(new_key.to_string());
}

fn branch_in(children: &mut BTreeMap<String, Node>, new_key: &str, sibling_key: &str) -> bool {
    for node in children.values_mut() {
        if let Node::Branch { children: sub, active } = node {
            if sub.contains_key(sibling_key) {
                sub.insert(new_key.to_string(), Node::Leaf);
                *active = Some(new_key.to_string());
                return true;
            }
            if branch_in(sub, new_key, sibling_key) {
                return true;
            }
        }
    }
    false
}

fn contains_in(children: &BTreeMap<String, Node>, key: &str) -> bool {
    if children.contains_key(key) {
        return true;
    }
    children.values().any(|node| match node {
        Node::Branch { children: sub, .. } => contains_in(sub, key),
        Node::Leaf => false,
    })
}
