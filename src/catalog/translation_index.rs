//! Translation records keyed by their (key, language) identity.

use crate::model::{KeyId, LanguageId, Timestamp, Translation, TranslationId};
use std::collections::BTreeMap;

/// At most one translation per (key id, language id) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationIndex {
    records: BTreeMap<(KeyId, LanguageId), Translation>,
}

impl TranslationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Create or update the translation for a pair.
    ///
    /// An existing record keeps its id, creator and `created_at`; only the
    /// value and `updated_at` change. Returns the record and whether it was
    /// newly created.
    pub fn upsert(
        &mut self,
        key_id: KeyId,
        language_id: &LanguageId,
        value: &str,
        actor: Option<&str>,
        now: Timestamp,
    ) -> (Translation, bool) {
        let (translation, created) = self.preview_upsert(key_id, language_id, value, actor, now);
        self.restore(translation.clone());
        (translation, created)
    }

    /// The record [`TranslationIndex::upsert`] would store, without storing it.
    pub fn preview_upsert(
        &self,
        key_id: KeyId,
        language_id: &LanguageId,
        value: &str,
        actor: Option<&str>,
        now: Timestamp,
    ) -> (Translation, bool) {
        if let Some(existing) = self.records.get(&(key_id, language_id.clone())) {
            let mut updated = existing.clone();
            updated.value = value.to_string();
            updated.updated_at = now;
            return (updated, false);
        }

        let translation = Translation {
            id: TranslationId::new(),
            key_id,
            language_id: language_id.clone(),
            value: value.to_string(),
            created_at: now,
            updated_at: now,
            created_by: actor.map(str::to_string),
        };
        (translation, true)
    }

    /// Insert a record as-is, replacing any record for the same pair.
    pub fn restore(&mut self, translation: Translation) {
        self.records.insert(
            (translation.key_id, translation.language_id.clone()),
            translation,
        );
    }

    /// Translations of one key, ordered by language id.
    pub fn find_by_key(&self, key_id: KeyId) -> Vec<&Translation> {
        self.records
            .iter()
            .filter(|((k, _), _)| *k == key_id)
            .map(|(_, t)| t)
            .collect()
    }

    pub fn find_by_pair(&self, key_id: KeyId, language_id: &LanguageId) -> Option<&Translation> {
        self.records.get(&(key_id, language_id.clone()))
    }

    /// Translations in one language, in key id order.
    pub fn find_by_language(&self, language_id: &LanguageId) -> Vec<&Translation> {
        self.records
            .values()
            .filter(|t| &t.language_id == language_id)
            .collect()
    }

    pub fn remove_pair(&mut self, key_id: KeyId, language_id: &LanguageId) -> Option<Translation> {
        self.records.remove(&(key_id, language_id.clone()))
    }

    pub fn remove_by_id(&mut self, id: TranslationId) -> Option<Translation> {
        let pair = self
            .records
            .iter()
            .find(|(_, t)| t.id == id)
            .map(|(pair, _)| pair.clone())?;
        self.records.remove(&pair)
    }

    /// Drop every translation of a key.
    pub fn remove_key(&mut self, key_id: KeyId) -> Vec<TranslationId> {
        self.remove_where(|t| t.key_id == key_id)
    }

    /// Drop every translation in a language.
    pub fn remove_language(&mut self, language_id: &LanguageId) -> Vec<TranslationId> {
        self.remove_where(|t| &t.language_id == language_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Translation> {
        self.records.values()
    }

    fn remove_where(&mut self, predicate: impl Fn(&Translation) -> bool) -> Vec<TranslationId> {
        let mut removed = Vec::new();
        self.records.retain(|_, translation| {
            if predicate(translation) {
                removed.push(translation.id);
                false
            } else {
                true
            }
        });
        removed
    }
}
