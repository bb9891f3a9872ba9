//! Read-only projections over the catalog.
//!
//! The free functions work on a borrowed [`Catalog`]; [`QueryService`] runs
//! them against a [`Store`] under its read lock.

use crate::catalog::key_tree::{ExportTree, TreeNode};
use crate::catalog::language_forest::{ancestors, build_forest, LanguageNode};
use crate::catalog::{translations_for, Catalog};
use crate::error::CommandError;
use crate::metrics::MetricsReport;
use crate::model::{
    Key, Language, LanguageId, Translation, TranslationRequest, TranslationRequestId,
};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the console needs on first load. Keys are in namespace order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseData {
    pub keys: Vec<Key>,
    pub languages: Vec<Language>,
}

/// One key opened for editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDetail {
    pub key: Key,
    pub translations: Vec<Translation>,
    pub languages: Vec<Language>,

    /// Pending translation requests for the key, oldest first
    #[serde(default)]
    pub requests: Vec<TranslationRequest>,
}

/// Flat key string -> value mapping for one language.
pub type LanguageExport = BTreeMap<String, String>;

pub fn base_data(catalog: &Catalog) -> BaseData {
    BaseData {
        keys: catalog.keys().into_iter().cloned().collect(),
        languages: catalog.languages().values().cloned().collect(),
    }
}

pub fn key_detail(catalog: &Catalog, key: &str) -> Result<KeyDetail, CommandError> {
    let (record, translations) =
        translations_for(catalog, key).ok_or_else(|| CommandError::NotFound {
            entity: "key",
            id: key.to_string(),
        })?;

    Ok(KeyDetail {
        key: record.clone(),
        translations: translations.into_iter().cloned().collect(),
        languages: catalog.languages().values().cloned().collect(),
        requests: catalog
            .requests_for_key(record.id)
            .into_iter()
            .cloned()
            .collect(),
    })
}

pub fn translation_request(
    catalog: &Catalog,
    id: TranslationRequestId,
) -> Result<TranslationRequest, CommandError> {
    catalog
        .translation_request(id)
        .cloned()
        .ok_or_else(|| CommandError::NotFound {
            entity: "translation request",
            id: id.to_string(),
        })
}

/// Keys whose string contains `term`, in namespace order.
pub fn search_keys(catalog: &Catalog, term: &str) -> Vec<Key> {
    let term = term.trim();
    if term.is_empty() {
        return Vec::new();
    }

    catalog
        .keys()
        .into_iter()
        .filter(|key| key.key.contains(term))
        .cloned()
        .collect()
}

/// Values of every key translated in `language_id`.
///
/// With `fallback`, keys missing in the language take the value of the
/// nearest ancestor language that has one.
pub fn export_by_language(
    catalog: &Catalog,
    language_id: &LanguageId,
    fallback: bool,
) -> Result<LanguageExport, CommandError> {
    if catalog.language(language_id).is_none() {
        return Err(CommandError::NotFound {
            entity: "language",
            id: language_id.to_string(),
        });
    }

    let mut chain = vec![language_id.clone()];
    if fallback {
        chain.extend(ancestors(language_id, catalog.languages()));
    }

    let translations = catalog.translations();
    let mut export = LanguageExport::new();
    for key in catalog.keys() {
        let value = chain
            .iter()
            .find_map(|language| translations.find_by_pair(key.id, language));
        if let Some(translation) = value {
            export.insert(key.key.clone(), translation.value.clone());
        }
    }
    Ok(export)
}

pub fn export_key_tree(catalog: &Catalog) -> ExportTree {
    catalog.key_tree().export_flat()
}

pub fn language_forest(catalog: &Catalog) -> Vec<LanguageNode> {
    build_forest(catalog.languages().values())
}

pub fn key_tree(catalog: &Catalog) -> BTreeMap<String, TreeNode> {
    catalog.key_tree().root().clone()
}

/// Query entry point bound to a store.
#[derive(Clone)]
pub struct QueryService {
    store: Store,
}

impl QueryService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn base_data(&self) -> Result<BaseData, CommandError> {
        self.store.read(base_data)
    }

    pub fn key_detail(&self, key: &str) -> Result<KeyDetail, CommandError> {
        self.store.read(|catalog| key_detail(catalog, key))?
    }

    pub fn translation_request(
        &self,
        id: TranslationRequestId,
    ) -> Result<TranslationRequest, CommandError> {
        self.store.read(|catalog| translation_request(catalog, id))?
    }

    pub fn search_keys(&self, term: &str) -> Result<Vec<Key>, CommandError> {
        self.store.read(|catalog| search_keys(catalog, term))
    }

    pub fn export_by_language(
        &self,
        language_id: &LanguageId,
        fallback: bool,
    ) -> Result<LanguageExport, CommandError> {
        self.store
            .read(|catalog| export_by_language(catalog, language_id, fallback))?
    }

    pub fn export_key_tree(&self) -> Result<ExportTree, CommandError> {
        self.store.read(export_key_tree)
    }

    pub fn language_forest(&self) -> Result<Vec<LanguageNode>, CommandError> {
        self.store.read(language_forest)
    }

    pub fn key_tree(&self) -> Result<BTreeMap<String, TreeNode>, CommandError> {
        self.store.read(key_tree)
    }

    pub fn metrics(&self) -> MetricsReport {
        self.store.metrics().report()
    }
}
