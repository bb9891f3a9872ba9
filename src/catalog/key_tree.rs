//! Namespace tree over the flat key set.
//!
//! Each key string is a path of dot-separated segments. Intermediate segments
//! are namespaces, the final segment is a leaf holding the key record. A node
//! is never both: no key may be a strict dot-prefix of another key.

use crate::model::Key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// One node of the namespace tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Leaf { key: Key },
    Namespace { children: BTreeMap<String, TreeNode> },
}

/// Which way a candidate key collides with the existing tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The full path already ends in a leaf
    DuplicateKey,
    /// A strict prefix of the candidate is an existing leaf
    NestedUnderLeaf,
    /// The candidate path is an existing namespace
    ParentOfExisting,
}

/// A failed insertability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConflict {
    pub kind: ConflictKind,

    /// The existing key the candidate collides with
    pub conflicting_key: String,
}

impl KeyConflict {
    fn new(kind: ConflictKind, conflicting_key: &str) -> Self {
        Self {
            kind,
            conflicting_key: conflicting_key.to_string(),
        }
    }
}

/// Bulk-export shape: nested segment mapping whose leaves hold the full key string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportNode {
    Key(String),
    Namespace(BTreeMap<String, ExportNode>),
}

/// Top level of an exported key tree.
pub type ExportTree = BTreeMap<String, ExportNode>;

/// Prefix tree of keys. Each level is ordered by segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTree {
    root: BTreeMap<String, TreeNode>,
    len: usize,
}

impl KeyTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a key set.
    ///
    /// Keys are inserted in lexicographic order so the result does not depend
    /// on input order. A key that collides with one already inserted is
    /// skipped with a warning; use [`KeyTree::try_build`] to reject instead.
    pub fn build<'a>(keys: impl IntoIterator<Item = &'a Key>) -> Self {
        let mut sorted: Vec<&Key> = keys.into_iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        let mut tree = Self::new();
        for key in sorted {
            if let Err(conflict) = tree.insert(key.clone()) {
                warn!(
                    "Skipping key '{}' while building tree: {:?} with '{}'",
                    key.key, conflict.kind, conflict.conflicting_key
                );
            }
        }
        tree
    }

    /// Build a tree, failing on the first collision with the rejected key string.
    pub fn try_build(keys: impl IntoIterator<Item = Key>) -> Result<Self, (String, KeyConflict)> {
        let mut sorted: Vec<Key> = keys.into_iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        let mut tree = Self::new();
        for key in sorted {
            let candidate = key.key.clone();
            tree.insert(key).map_err(|conflict| (candidate, conflict))?;
        }
        Ok(tree)
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Top-level nodes.
    pub fn root(&self) -> &BTreeMap<String, TreeNode> {
        &self.root
    }

    /// Check whether `candidate` can be added as a new leaf.
    pub fn check_insertable(&self, candidate: &str) -> Result<(), KeyConflict> {
        self.check_insertable_excluding(candidate, None)
    }

    /// Like [`KeyTree::check_insertable`], but behaves as if the leaf
    /// `excluded` were absent. Used when renaming a key.
    pub fn check_insertable_excluding(
        &self,
        candidate: &str,
        excluded: Option<&str>,
    ) -> Result<(), KeyConflict> {
        let segments: Vec<&str> = candidate.split('.').collect();
        let mut level = &self.root;

        for (index, segment) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();

            match level.get(*segment) {
                None => return Ok(()),
                Some(TreeNode::Leaf { key }) => {
                    // Nothing can live below the excluded leaf
                    if excluded == Some(key.key.as_str()) {
                        return Ok(());
                    }
                    let kind = if is_last {
                        ConflictKind::DuplicateKey
                    } else {
                        ConflictKind::NestedUnderLeaf
                    };
                    return Err(KeyConflict::new(kind, &key.key));
                }
                Some(TreeNode::Namespace { children }) => {
                    if is_last {
                        return match first_leaf_excluding(children, excluded) {
                            Some(existing) => Err(KeyConflict::new(
                                ConflictKind::ParentOfExisting,
                                &existing.key,
                            )),
                            None => Ok(()),
                        };
                    }
                    level = children;
                }
            }
        }

        Ok(())
    }

    /// Insert a key as a leaf, creating intermediate namespaces.
    pub fn insert(&mut self, key: Key) -> Result<(), KeyConflict> {
        self.check_insertable(&key.key)?;

        let segments: Vec<String> = key.segments().map(str::to_string).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };

        let mut level = &mut self.root;
        for segment in parents {
            let node = level
                .entry(segment.clone())
                .or_insert_with(|| TreeNode::Namespace {
                    children: BTreeMap::new(),
                });
            level = match node {
                TreeNode::Namespace { children } => children,
                TreeNode::Leaf { key: existing } => {
                    return Err(KeyConflict::new(
                        ConflictKind::NestedUnderLeaf,
                        &existing.key,
                    ))
                }
            };
        }

        level.insert(last.clone(), TreeNode::Leaf { key });
        self.len += 1;
        Ok(())
    }

    /// Remove the leaf at `path`, pruning namespaces left empty.
    pub fn remove(&mut self, path: &str) -> Option<Key> {
        let segments: Vec<&str> = path.split('.').collect();
        let removed = remove_in(&mut self.root, &segments)?;
        self.len -= 1;
        Some(removed)
    }

    /// Look up the leaf at `path`.
    pub fn get(&self, path: &str) -> Option<&Key> {
        let mut level = &self.root;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let node = level.get(segment)?;
            if segments.peek().is_none() {
                return match node {
                    TreeNode::Leaf { key } => Some(key),
                    TreeNode::Namespace { .. } => None,
                };
            }
            level = match node {
                TreeNode::Namespace { children } => children,
                TreeNode::Leaf { .. } => return None,
            };
        }

        None
    }

    /// Mutable lookup of the leaf at `path`.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Key> {
        let mut level = &mut self.root;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let node = level.get_mut(segment)?;
            if segments.peek().is_none() {
                return match node {
                    TreeNode::Leaf { key } => Some(key),
                    TreeNode::Namespace { .. } => None,
                };
            }
            level = match node {
                TreeNode::Namespace { children } => children,
                TreeNode::Leaf { .. } => return None,
            };
        }

        None
    }

    /// All leaves in namespace order: depth-first, siblings sorted by segment.
    ///
    /// This differs from plain string order wherever a segment sorts below
    /// `.`; `a.b` is listed before `a-b` because segment `a` precedes `a-b`.
    pub fn keys(&self) -> Vec<&Key> {
        let mut out = Vec::with_capacity(self.len);
        collect_leaves(&self.root, &mut out);
        out
    }

    /// Serialize into the nested segment -> (mapping | key string) export shape.
    pub fn export_flat(&self) -> ExportTree {
        export_level(&self.root)
    }
}

/// Check `candidate` against a plain key list.
pub fn check_insertable(candidate: &str, existing: &[Key]) -> Result<(), KeyConflict> {
    KeyTree::build(existing).check_insertable(candidate)
}

fn first_leaf_excluding<'a>(
    level: &'a BTreeMap<String, TreeNode>,
    excluded: Option<&str>,
) -> Option<&'a Key> {
    level.values().find_map(|node| match node {
        TreeNode::Leaf { key } if excluded == Some(key.key.as_str()) => None,
        TreeNode::Leaf { key } => Some(key),
        TreeNode::Namespace { children } => first_leaf_excluding(children, excluded),
    })
}

fn remove_in(level: &mut BTreeMap<String, TreeNode>, segments: &[&str]) -> Option<Key> {
    let (first, rest) = segments.split_first()?;

    if rest.is_empty() {
        if !matches!(level.get(*first), Some(TreeNode::Leaf { .. })) {
            return None;
        }
        return match level.remove(*first) {
            Some(TreeNode::Leaf { key }) => Some(key),
            _ => None,
        };
    }

    let removed = match level.get_mut(*first) {
        Some(TreeNode::Namespace { children }) => remove_in(children, rest),
        _ => None,
    }?;

    if matches!(level.get(*first), Some(TreeNode::Namespace { children }) if children.is_empty()) {
        level.remove(*first);
    }

    Some(removed)
}

fn collect_leaves<'a>(level: &'a BTreeMap<String, TreeNode>, out: &mut Vec<&'a Key>) {
    for node in level.values() {
        match node {
            TreeNode::Leaf { key } => out.push(key),
            TreeNode::Namespace { children } => collect_leaves(children, out),
        }
    }
}

fn export_level(level: &BTreeMap<String, TreeNode>) -> ExportTree {
    level
        .iter()
        .map(|(segment, node)| {
            let exported = match node {
                TreeNode::Leaf { key } => ExportNode::Key(key.key.clone()),
                TreeNode::Namespace { children } => ExportNode::Namespace(export_level(children)),
            };
            (segment.clone(), exported)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyId;
    use chrono::Utc;
    use proptest::prelude::*;

    // ==================== Helper Functions ====================

    fn key(path: &str) -> Key {
        Key {
            id: KeyId::new(),
            key: path.to_string(),
            description: None,
            created_at: Utc::now(),
            created_by: None,
        }
    }

    fn tree_of(paths: &[&str]) -> KeyTree {
        let keys: Vec<Key> = paths.iter().map(|p| key(p)).collect();
        KeyTree::try_build(keys).expect("fixture keys are consistent")
    }

    fn conflict(kind: ConflictKind, with: &str) -> Result<(), KeyConflict> {
        Err(KeyConflict::new(kind, with))
    }

    // ==================== Build Tests ====================

    #[test]
    fn test_build_creates_namespaces_and_leaves() {
        let tree = tree_of(&["a.b", "a.c", "d"]);

        assert_eq!(tree.len(), 3);
        assert!(matches!(tree.root().get("a"), Some(TreeNode::Namespace { .. })));
        assert!(matches!(tree.root().get("d"), Some(TreeNode::Leaf { .. })));
        assert_eq!(tree.get("a.b").map(|k| k.key.as_str()), Some("a.b"));
        assert!(tree.get("a").is_none());
    }

    #[test]
    fn test_build_is_independent_of_input_order() {
        let forward = vec![key("x.y.z"), key("x.w"), key("b")];
        let mut backward = forward.clone();
        backward.reverse();

        assert_eq!(KeyTree::build(&forward), KeyTree::build(&backward));
    }

    #[test]
    fn test_build_skips_conflicting_keys() {
        let keys = vec![key("a"), key("a.b"), key("c")];
        let tree = KeyTree::build(&keys);

        assert_eq!(tree.len(), 2);
        assert!(tree.get("a").is_some());
        assert!(tree.get("a.b").is_none());
    }

    #[test]
    fn test_try_build_reports_rejected_key() {
        let err = KeyTree::try_build(vec![key("a.b"), key("a")]).unwrap_err();
        assert_eq!(err.0, "a.b");
        assert_eq!(err.1.kind, ConflictKind::NestedUnderLeaf);
        assert_eq!(err.1.conflicting_key, "a");
    }

    #[test]
    fn test_keys_are_listed_in_namespace_order() {
        let tree = tree_of(&["b.a", "a.z", "a.b.c", "c"]);
        let listed: Vec<&str> = tree.keys().iter().map(|k| k.key.as_str()).collect();
        assert_eq!(listed, vec!["a.b.c", "a.z", "b.a", "c"]);
    }

    #[test]
    fn test_namespace_order_groups_by_segment() {
        // Plain string order would put "a-b" first ('-' sorts below '.')
        let tree = tree_of(&["a-b", "a.b"]);
        let listed: Vec<&str> = tree.keys().iter().map(|k| k.key.as_str()).collect();
        assert_eq!(listed, vec!["a.b", "a-b"]);
    }

    #[test]
    fn test_insert_places_leaf_under_each_segment() {
        let mut tree = KeyTree::new();
        tree.insert(key("greeting.hello.world")).expect("insert");

        let Some(TreeNode::Namespace { children }) = tree.root().get("greeting") else {
            panic!("expected namespace 'greeting'");
        };
        let Some(TreeNode::Namespace { children }) = children.get("hello") else {
            panic!("expected namespace 'hello'");
        };
        assert!(matches!(children.get("world"), Some(TreeNode::Leaf { .. })));
    }

    // ==================== Insertability Tests ====================

    #[test]
    fn test_insertable_into_empty_tree() {
        assert_eq!(KeyTree::new().check_insertable("a.b.c"), Ok(()));
    }

    #[test]
    fn test_duplicate_key() {
        let tree = tree_of(&["greeting.hello"]);
        assert_eq!(
            tree.check_insertable("greeting.hello"),
            conflict(ConflictKind::DuplicateKey, "greeting.hello")
        );
    }

    #[test]
    fn test_nested_under_leaf() {
        let tree = tree_of(&["greeting"]);
        assert_eq!(
            tree.check_insertable("greeting.hello"),
            conflict(ConflictKind::NestedUnderLeaf, "greeting")
        );
    }

    #[test]
    fn test_parent_of_existing() {
        let tree = tree_of(&["greeting.hello.world"]);
        assert_eq!(
            tree.check_insertable("greeting"),
            conflict(ConflictKind::ParentOfExisting, "greeting.hello.world")
        );
        assert_eq!(
            tree.check_insertable("greeting.hello"),
            conflict(ConflictKind::ParentOfExisting, "greeting.hello.world")
        );
    }

    #[test]
    fn test_sibling_is_insertable() {
        let tree = tree_of(&["greeting.hello"]);
        assert_eq!(tree.check_insertable("greeting.bye"), Ok(()));
        assert_eq!(tree.check_insertable("greetings"), Ok(()));
    }

    #[test]
    fn test_excluding_self_allows_rename_within_own_path() {
        let tree = tree_of(&["a.b.c"]);
        // a.b.c -> a.b only collides with itself
        assert_eq!(tree.check_insertable_excluding("a.b", Some("a.b.c")), Ok(()));

        let tree = tree_of(&["a"]);
        // a -> a.b is nested under itself only
        assert_eq!(tree.check_insertable_excluding("a.b", Some("a")), Ok(()));
    }

    #[test]
    fn test_excluding_self_still_sees_other_keys() {
        let tree = tree_of(&["a.b", "a.c"]);
        assert_eq!(
            tree.check_insertable_excluding("a.c", Some("a.b")),
            conflict(ConflictKind::DuplicateKey, "a.c")
        );
        assert_eq!(
            tree.check_insertable_excluding("a", Some("a.b")),
            conflict(ConflictKind::ParentOfExisting, "a.c")
        );
    }

    #[test]
    fn test_check_insertable_against_key_list() {
        let existing = vec![key("a.b"), key("d")];
        assert!(check_insertable("a.c", &existing).is_ok());
        assert_eq!(
            check_insertable("d.e", &existing),
            conflict(ConflictKind::NestedUnderLeaf, "d")
        );
    }

    // ==================== Insert / Remove Tests ====================

    #[test]
    fn test_insert_rejects_conflicts() {
        let mut tree = tree_of(&["a.b"]);
        let err = tree.insert(key("a")).unwrap_err();
        assert_eq!(err.kind, ConflictKind::ParentOfExisting);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_remove_prunes_empty_namespaces() {
        let mut tree = tree_of(&["a.b.c", "d"]);

        let removed = tree.remove("a.b.c").expect("leaf exists");
        assert_eq!(removed.key, "a.b.c");
        assert_eq!(tree.len(), 1);
        assert!(tree.root().get("a").is_none());

        // "a" is free again, both as leaf and namespace
        assert_eq!(tree.check_insertable("a"), Ok(()));
    }

    #[test]
    fn test_remove_keeps_non_empty_namespaces() {
        let mut tree = tree_of(&["a.b", "a.c"]);
        tree.remove("a.b");
        assert!(tree.get("a.c").is_some());
        assert!(matches!(tree.root().get("a"), Some(TreeNode::Namespace { .. })));
    }

    #[test]
    fn test_remove_namespace_path_is_noop() {
        let mut tree = tree_of(&["a.b"]);
        assert!(tree.remove("a").is_none());
        assert!(tree.remove("x.y").is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_get_mut_updates_leaf() {
        let mut tree = tree_of(&["a.b"]);
        tree.get_mut("a.b").expect("leaf").description = Some("desc".to_string());
        assert_eq!(
            tree.get("a.b").and_then(|k| k.description.clone()),
            Some("desc".to_string())
        );
        assert!(tree.get_mut("a").is_none());
    }

    // ==================== Export Tests ====================

    #[test]
    fn test_export_flat_round_trip() {
        let tree = tree_of(&["a.b", "a.c", "d"]);
        let exported = serde_json::to_value(tree.export_flat()).expect("serialize");

        assert_eq!(
            exported,
            serde_json::json!({"a": {"b": "a.b", "c": "a.c"}, "d": "d"})
        );
    }

    #[test]
    fn test_export_node_deserializes() {
        let json = serde_json::json!({"a": {"b": "a.b"}, "d": "d"});
        let tree: ExportTree = serde_json::from_value(json).expect("deserialize");
        assert_eq!(tree.get("d"), Some(&ExportNode::Key("d".to_string())));
    }

    // ==================== Property Tests ====================

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 1..4)
            .prop_map(|segments| segments.join("."))
    }

    fn is_strict_prefix(prefix: &str, of: &str) -> bool {
        of.len() > prefix.len() && of.starts_with(prefix) && of[prefix.len()..].starts_with('.')
    }

    proptest! {
        #[test]
        fn prop_insertable_iff_no_prefix_relation(
            candidates in prop::collection::vec(path_strategy(), 0..12),
            probe in path_strategy(),
        ) {
            let mut tree = KeyTree::new();
            for candidate in &candidates {
                let _ = tree.insert(key(candidate));
            }
            let existing: Vec<String> = tree.keys().iter().map(|k| k.key.clone()).collect();

            let expected_ok = existing.iter().all(|e| {
                e != &probe && !is_strict_prefix(e, &probe) && !is_strict_prefix(&probe, e)
            });

            prop_assert_eq!(tree.check_insertable(&probe).is_ok(), expected_ok);
        }

        #[test]
        fn prop_prefix_pairs_never_coexist(
            parent in path_strategy(),
            suffix in path_strategy(),
        ) {
            let child = format!("{}.{}", parent, suffix);

            let mut tree = KeyTree::new();
            tree.insert(key(&child)).expect("empty tree accepts");
            let err = tree.insert(key(&parent)).unwrap_err();
            prop_assert_eq!(err.kind, ConflictKind::ParentOfExisting);

            let mut tree = KeyTree::new();
            tree.insert(key(&parent)).expect("empty tree accepts");
            let err = tree.insert(key(&child)).unwrap_err();
            prop_assert_eq!(err.kind, ConflictKind::NestedUnderLeaf);
        }

        #[test]
        fn prop_tree_never_holds_prefix_pairs(
            candidates in prop::collection::vec(path_strategy(), 0..16),
        ) {
            let keys: Vec<Key> = candidates.iter().map(|c| key(c)).collect();
            let tree = KeyTree::build(&keys);
            let listed: Vec<&str> = tree.keys().iter().map(|k| k.key.as_str()).collect();

            for a in &listed {
                for b in &listed {
                    prop_assert!(!is_strict_prefix(a, b));
                }
            }
            prop_assert_eq!(listed.len(), tree.len());
        }
    }
}
