//! Parent/child forest over the flat language set.
//!
//! A language has at most one parent. Cycles cannot be created through the
//! command processor: a parent must exist when referenced and a reparent onto
//! one's own descendant is rejected.

use crate::error::CommandError;
use crate::model::{Language, LanguageId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::str::FromStr;

/// What happens to the descendants of a deleted language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Delete every descendant along with the language
    #[default]
    Cascade,
    /// Keep descendants; every descendant becomes a root
    Orphan,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(Self::Cascade),
            "orphan" => Ok(Self::Orphan),
            other => Err(format!(
                "unknown language delete policy '{}' (expected 'cascade' or 'orphan')",
                other
            )),
        }
    }
}

/// Languages removed vs. reparented to no parent by a deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadePlan {
    /// Includes the deleted language itself, first
    pub to_delete: Vec<LanguageId>,
    pub to_orphan: Vec<LanguageId>,
}

/// A language with its children, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageNode {
    #[serde(flatten)]
    pub language: Language,

    pub children: Vec<LanguageNode>,
}

/// Group languages by parent. Languages with no parent or an unresolved
/// parent are roots; siblings are ordered by id.
pub fn build_forest<'a>(languages: impl IntoIterator<Item = &'a Language>) -> Vec<LanguageNode> {
    let mut by_id: BTreeMap<&LanguageId, &Language> = BTreeMap::new();
    for language in languages {
        by_id.insert(&language.id, language);
    }

    let mut children: BTreeMap<&LanguageId, Vec<&Language>> = BTreeMap::new();
    let mut roots: Vec<&Language> = Vec::new();
    for language in by_id.values() {
        match &language.parent_id {
            Some(parent) if by_id.contains_key(parent) => {
                children.entry(parent).or_default().push(language)
            }
            _ => roots.push(language),
        }
    }

    let mut visited: BTreeSet<&LanguageId> = BTreeSet::new();
    let mut forest: Vec<LanguageNode> = roots
        .into_iter()
        .map(|root| build_node(root, &children, &mut visited))
        .collect();

    // Members of a parent cycle are unreachable from any root; surface them as roots
    for language in by_id.values() {
        if !visited.contains(&language.id) {
            forest.push(build_node(language, &children, &mut visited));
        }
    }

    forest
}

fn build_node<'a>(
    language: &'a Language,
    children: &BTreeMap<&LanguageId, Vec<&'a Language>>,
    visited: &mut BTreeSet<&'a LanguageId>,
) -> LanguageNode {
    visited.insert(&language.id);

    let mut nodes = Vec::new();
    if let Some(direct) = children.get(&language.id) {
        for child in direct {
            if !visited.contains(&child.id) {
                nodes.push(build_node(child, children, visited));
            }
        }
    }

    LanguageNode {
        language: language.clone(),
        children: nodes,
    }
}

/// A parent reference, if present, must name an existing language.
pub fn validate_parent(
    candidate: Option<&LanguageId>,
    languages: &BTreeMap<LanguageId, Language>,
) -> Result<(), CommandError> {
    match candidate {
        Some(parent_id) if !languages.contains_key(parent_id) => Err(CommandError::UnknownParent {
            parent_id: parent_id.clone(),
        }),
        _ => Ok(()),
    }
}

/// Direct children of `id`, ordered by id.
pub fn children_of(id: &LanguageId, languages: &BTreeMap<LanguageId, Language>) -> Vec<LanguageId> {
    languages
        .values()
        .filter(|language| language.parent_id.as_ref() == Some(id))
        .map(|language| language.id.clone())
        .collect()
}

/// All descendants of `id` in breadth-first order, `id` excluded.
pub fn descendants(id: &LanguageId, languages: &BTreeMap<LanguageId, Language>) -> Vec<LanguageId> {
    let mut seen: BTreeSet<LanguageId> = BTreeSet::new();
    seen.insert(id.clone());

    let mut queue: VecDeque<LanguageId> = VecDeque::from([id.clone()]);
    let mut out = Vec::new();

    while let Some(current) = queue.pop_front() {
        for child in children_of(&current, languages) {
            if seen.insert(child.clone()) {
                out.push(child.clone());
                queue.push_back(child);
            }
        }
    }

    out
}

/// Parent chain of `id`, nearest first. Stops at a missing parent or a cycle.
pub fn ancestors(id: &LanguageId, languages: &BTreeMap<LanguageId, Language>) -> Vec<LanguageId> {
    let mut seen: BTreeSet<&LanguageId> = BTreeSet::from([id]);
    let mut out = Vec::new();

    let mut current = languages.get(id).and_then(|l| l.parent_id.as_ref());
    while let Some(parent_id) = current {
        let Some(parent) = languages.get(parent_id) else {
            break;
        };
        if !seen.insert(&parent.id) {
            break;
        }
        out.push(parent.id.clone());
        current = parent.parent_id.as_ref();
    }

    out
}

/// Whether making `new_parent` the parent of `id` would close a cycle.
pub fn would_create_cycle(
    id: &LanguageId,
    new_parent: &LanguageId,
    languages: &BTreeMap<LanguageId, Language>,
) -> bool {
    new_parent == id || ancestors(new_parent, languages).contains(id)
}

/// Decide which languages a deletion of `id` removes or orphans.
pub fn delete_cascade_plan(
    id: &LanguageId,
    languages: &BTreeMap<LanguageId, Language>,
    policy: DeletePolicy,
) -> CascadePlan {
    let mut to_delete = vec![id.clone()];

    match policy {
        DeletePolicy::Cascade => {
            to_delete.extend(descendants(id, languages));
            CascadePlan {
                to_delete,
                to_orphan: Vec::new(),
            }
        }
        DeletePolicy::Orphan => CascadePlan {
            to_delete,
            to_orphan: descendants(id, languages),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // ==================== Helper Functions ====================

    fn language(id: &str, parent: Option<&str>) -> Language {
        Language {
            id: LanguageId::from(id),
            name: id.to_uppercase(),
            parent_id: parent.map(LanguageId::from),
            created_at: Utc::now(),
            created_by: None,
        }
    }

    /// en
    /// ├── en-GB
    /// │   └── en-IE
    /// └── en-US
    /// fr
    fn fixture() -> BTreeMap<LanguageId, Language> {
        [
            language("en", None),
            language("en-GB", Some("en")),
            language("en-IE", Some("en-GB")),
            language("en-US", Some("en")),
            language("fr", None),
        ]
        .into_iter()
        .map(|l| (l.id.clone(), l))
        .collect()
    }

    fn ids(values: &[&str]) -> Vec<LanguageId> {
        values.iter().map(|v| LanguageId::from(*v)).collect()
    }

    // ==================== Forest Tests ====================

    #[test]
    fn test_build_forest_groups_by_parent() {
        let languages = fixture();
        let forest = build_forest(languages.values());

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].language.id.as_str(), "en");
        assert_eq!(forest[1].language.id.as_str(), "fr");

        let en_children: Vec<&str> = forest[0]
            .children
            .iter()
            .map(|n| n.language.id.as_str())
            .collect();
        assert_eq!(en_children, vec!["en-GB", "en-US"]);
        assert_eq!(forest[0].children[0].children[0].language.id.as_str(), "en-IE");
    }

    #[test]
    fn test_unresolved_parent_becomes_root() {
        let languages = vec![language("de-AT", Some("de")), language("en", None)];
        let forest = build_forest(&languages);

        let roots: Vec<&str> = forest.iter().map(|n| n.language.id.as_str()).collect();
        assert_eq!(roots, vec!["de-AT", "en"]);
    }

    #[test]
    fn test_cycle_members_are_still_listed() {
        let languages = vec![language("a", Some("b")), language("b", Some("a"))];
        let forest = build_forest(&languages);

        let total: usize = forest.iter().map(|n| 1 + n.children.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_language_node_serializes_flat() {
        let languages = fixture();
        let forest = build_forest(languages.values());
        let json = serde_json::to_value(&forest[1]).expect("serialize");
        assert_eq!(json["id"], "fr");
        assert!(json["children"].as_array().expect("array").is_empty());
    }

    // ==================== Parent Validation Tests ====================

    #[test]
    fn test_validate_parent() {
        let languages = fixture();
        assert!(validate_parent(None, &languages).is_ok());
        assert!(validate_parent(Some(&LanguageId::from("en")), &languages).is_ok());
        assert_eq!(
            validate_parent(Some(&LanguageId::from("xx")), &languages),
            Err(CommandError::UnknownParent {
                parent_id: LanguageId::from("xx")
            })
        );
    }

    #[test]
    fn test_would_create_cycle() {
        let languages = fixture();
        let en = LanguageId::from("en");

        assert!(would_create_cycle(&en, &en, &languages));
        assert!(would_create_cycle(&en, &LanguageId::from("en-IE"), &languages));
        assert!(!would_create_cycle(&en, &LanguageId::from("fr"), &languages));
        assert!(!would_create_cycle(
            &LanguageId::from("en-IE"),
            &LanguageId::from("en-US"),
            &languages
        ));
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let languages = fixture();
        assert_eq!(
            ancestors(&LanguageId::from("en-IE"), &languages),
            ids(&["en-GB", "en"])
        );
        assert!(ancestors(&LanguageId::from("fr"), &languages).is_empty());
    }

    // ==================== Cascade Plan Tests ====================

    #[test]
    fn test_cascade_plan_deletes_all_descendants() {
        let languages = fixture();
        let plan = delete_cascade_plan(&LanguageId::from("en"), &languages, DeletePolicy::Cascade);

        assert_eq!(plan.to_delete, ids(&["en", "en-GB", "en-US", "en-IE"]));
        assert!(plan.to_orphan.is_empty());
    }

    #[test]
    fn test_orphan_plan_reaches_every_descendant() {
        let languages = fixture();
        let plan = delete_cascade_plan(&LanguageId::from("en"), &languages, DeletePolicy::Orphan);

        assert_eq!(plan.to_delete, ids(&["en"]));
        assert_eq!(plan.to_orphan, ids(&["en-GB", "en-US", "en-IE"]));
    }

    #[test]
    fn test_orphan_plan_for_mid_level_language() {
        let languages = fixture();
        let plan =
            delete_cascade_plan(&LanguageId::from("en-GB"), &languages, DeletePolicy::Orphan);

        assert_eq!(plan.to_delete, ids(&["en-GB"]));
        assert_eq!(plan.to_orphan, ids(&["en-IE"]));
    }

    #[test]
    fn test_plan_for_leaf_language() {
        let languages = fixture();
        for policy in [DeletePolicy::Cascade, DeletePolicy::Orphan] {
            let plan = delete_cascade_plan(&LanguageId::from("fr"), &languages, policy);
            assert_eq!(plan.to_delete, ids(&["fr"]));
            assert!(plan.to_orphan.is_empty());
        }
    }

    #[test]
    fn test_delete_policy_from_str() {
        assert_eq!("cascade".parse::<DeletePolicy>(), Ok(DeletePolicy::Cascade));
        assert_eq!(" Orphan ".parse::<DeletePolicy>(), Ok(DeletePolicy::Orphan));
        assert!("drop".parse::<DeletePolicy>().is_err());
        assert_eq!(DeletePolicy::default(), DeletePolicy::Cascade);
    }
}
