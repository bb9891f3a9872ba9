//! The canonical catalog: keys, languages, translations and translation
//! requests, plus the command processor that is the only write path into them.
//!
//! A command is first planned against the current state. Planning validates
//! fully and yields the exact delta as a [`CommandOutcome`]; committing that
//! delta is the only mutation. A rejected command leaves the catalog
//! untouched, and a caller can persist the delta before committing it.

pub mod identifier;
pub mod key_tree;
pub mod language_forest;
pub mod translation_index;

use crate::command::{
    Command, CommandOutcome, CreateKey, CreateLanguage, CreateTranslationRequest, DeleteLanguage,
    DeleteTranslation, KeySelector, RenameKey, SetTranslation, UpdateKey, UpdateLanguage,
    UpdateTranslationRequest,
};
use crate::error::CommandError;
use crate::model::{
    Key, KeyId, Language, LanguageId, Timestamp, Translation, TranslationId, TranslationRequest,
    TranslationRequestId,
};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use identifier::{validate_key, validate_language_code, InvalidReason};
use key_tree::KeyTree;
use language_forest::{delete_cascade_plan, validate_parent, would_create_cycle, DeletePolicy};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;
use translation_index::TranslationIndex;

/// Who issued a command, when, and under which delete policy.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub actor: Option<String>,
    pub now: Timestamp,
    pub policy: DeletePolicy,
}

impl CommandContext {
    pub fn new(policy: DeletePolicy) -> Self {
        Self {
            actor: None,
            now: Utc::now(),
            policy,
        }
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }
}

/// Flat record set a catalog is stored as and rebuilt from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub keys: Vec<Key>,
    pub languages: Vec<Language>,
    pub translations: Vec<Translation>,
    pub requests: Vec<TranslationRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    keys: KeyTree,
    key_paths: HashMap<KeyId, String>,
    languages: BTreeMap<LanguageId, Language>,
    translations: TranslationIndex,
    requests: BTreeMap<TranslationRequestId, TranslationRequest>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Accessors ====================

    pub fn key_tree(&self) -> &KeyTree {
        &self.keys
    }

    /// All keys in namespace order (see [`KeyTree::keys`]).
    pub fn keys(&self) -> Vec<&Key> {
        self.keys.keys()
    }

    pub fn key_by_id(&self, id: KeyId) -> Option<&Key> {
        self.key_paths.get(&id).and_then(|path| self.keys.get(path))
    }

    pub fn key_by_path(&self, path: &str) -> Option<&Key> {
        self.keys.get(path)
    }

    pub fn languages(&self) -> &BTreeMap<LanguageId, Language> {
        &self.languages
    }

    pub fn language(&self, id: &LanguageId) -> Option<&Language> {
        self.languages.get(id)
    }

    pub fn translations(&self) -> &TranslationIndex {
        &self.translations
    }

    pub fn translation_request(&self, id: TranslationRequestId) -> Option<&TranslationRequest> {
        self.requests.get(&id)
    }

    /// Requests for one key, oldest first.
    pub fn requests_for_key(&self, key_id: KeyId) -> Vec<&TranslationRequest> {
        let mut found: Vec<&TranslationRequest> = self
            .requests
            .values()
            .filter(|request| request.key_id == key_id)
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        found
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    // ==================== Command Processing ====================

    /// Validate and apply one command atomically.
    pub fn apply(
        &mut self,
        command: Command,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        let outcome = self.plan(command, ctx)?;
        self.commit(&outcome)?;
        Ok(outcome)
    }

    /// Validate `command` and return the delta it would apply. Nothing is mutated.
    pub fn plan(
        &self,
        command: Command,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::CreateLanguage(payload) => self.create_language(payload, ctx),
            Command::UpdateLanguage(payload) => self.update_language(payload),
            Command::DeleteLanguage(payload) => self.delete_language(payload, ctx),
            Command::CreateKey(payload) => self.create_key(payload, ctx),
            Command::RenameKey(payload) => self.rename_key(payload),
            Command::UpdateKey(payload) => self.update_key(payload),
            Command::DeleteKey(selector) => self.delete_key(selector),
            Command::CreateTranslation(payload)
            | Command::UpdateTranslation(payload)
            | Command::Translate(payload) => self.translate(payload, ctx),
            Command::DeleteTranslation(payload) => self.delete_translation(payload),
            Command::CreateTranslationRequest(payload) => {
                self.create_translation_request(payload, ctx)
            }
            Command::UpdateTranslationRequest(payload) => {
                self.update_translation_request(payload, ctx)
            }
        }
    }

    /// Apply a delta returned by [`Catalog::plan`] on this same state.
    pub fn commit(&mut self, outcome: &CommandOutcome) -> Result<(), CommandError> {
        match outcome {
            CommandOutcome::LanguageCreated(language)
            | CommandOutcome::LanguageUpdated(language) => {
                self.languages.insert(language.id.clone(), language.clone());
            }
            CommandOutcome::LanguageDeleted {
                deleted, orphaned, ..
            } => {
                for id in deleted {
                    self.languages.remove(id);
                    self.translations.remove_language(id);
                    self.requests.retain(|_, request| &request.language_id != id);
                }
                for id in orphaned {
                    if let Some(language) = self.languages.get_mut(id) {
                        language.parent_id = None;
                    }
                }
            }
            CommandOutcome::KeyCreated(key) => {
                self.keys
                    .insert(key.clone())
                    .map_err(|conflict| CommandError::from_conflict(&key.key, conflict))?;
                self.key_paths.insert(key.id, key.key.clone());
            }
            CommandOutcome::KeyRenamed(key) => {
                let old_key = self
                    .key_paths
                    .get(&key.id)
                    .cloned()
                    .ok_or_else(|| key_not_found(Some(key.id), None))?;
                let previous = self
                    .keys
                    .remove(&old_key)
                    .ok_or_else(|| key_not_found(Some(key.id), None))?;
                if let Err(conflict) = self.keys.insert(key.clone()) {
                    self.keys
                        .insert(previous)
                        .map_err(|_| CommandError::Storage("key tree out of sync".to_string()))?;
                    return Err(CommandError::from_conflict(&key.key, conflict));
                }
                self.key_paths.insert(key.id, key.key.clone());
            }
            CommandOutcome::KeyUpdated(key) => {
                let record = self
                    .keys
                    .get_mut(&key.key)
                    .ok_or_else(|| key_not_found(Some(key.id), None))?;
                *record = key.clone();
            }
            CommandOutcome::KeyDeleted { id, .. } => {
                if let Some(path) = self.key_paths.remove(id) {
                    self.keys.remove(&path);
                }
                self.translations.remove_key(*id);
                self.requests.retain(|_, request| request.key_id != *id);
            }
            CommandOutcome::TranslationSaved { translation, .. } => {
                self.translations.restore(translation.clone());
            }
            CommandOutcome::TranslationDeleted { id } => {
                self.translations.remove_by_id(*id);
            }
            CommandOutcome::TranslationRequestCreated(request)
            | CommandOutcome::TranslationRequestUpdated(request) => {
                self.requests.insert(request.id, request.clone());
            }
        }
        Ok(())
    }

    fn create_language(
        &self,
        payload: CreateLanguage,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        let CreateLanguage {
            id,
            name,
            parent_id,
        } = payload;

        validate_code(&id)?;
        let name = required_name(&name)?;
        if self.languages.contains_key(&id) {
            return Err(CommandError::DuplicateLanguage { id });
        }
        let parent_id = non_empty(parent_id);
        validate_parent(parent_id.as_ref(), &self.languages)?;

        Ok(CommandOutcome::LanguageCreated(Language {
            id,
            name,
            parent_id,
            created_at: ctx.now,
            created_by: ctx.actor.clone(),
        }))
    }

    fn update_language(&self, payload: UpdateLanguage) -> Result<CommandOutcome, CommandError> {
        let UpdateLanguage {
            id,
            name,
            parent_id,
            clear_parent,
        } = payload;

        let mut language = self
            .languages
            .get(&id)
            .cloned()
            .ok_or_else(|| CommandError::NotFound {
                entity: "language",
                id: id.to_string(),
            })?;

        let name = name.as_deref().map(required_name).transpose()?;
        let parent_id = non_empty(parent_id);
        if clear_parent && parent_id.is_some() {
            return Err(CommandError::Validation(
                "parentId and clearParent are mutually exclusive".to_string(),
            ));
        }
        if name.is_none() && parent_id.is_none() && !clear_parent {
            return Err(CommandError::Validation("nothing to update".to_string()));
        }
        if let Some(parent) = &parent_id {
            validate_parent(Some(parent), &self.languages)?;
            if would_create_cycle(&id, parent, &self.languages) {
                return Err(CommandError::ParentCycle {
                    id,
                    parent_id: parent.clone(),
                });
            }
        }

        if let Some(name) = name {
            language.name = name;
        }
        if clear_parent {
            language.parent_id = None;
        } else if parent_id.is_some() {
            language.parent_id = parent_id;
        }
        Ok(CommandOutcome::LanguageUpdated(language))
    }

    fn delete_language(
        &self,
        payload: DeleteLanguage,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        let id = payload.id;
        if !self.languages.contains_key(&id) {
            return Err(CommandError::NotFound {
                entity: "language",
                id: id.to_string(),
            });
        }

        let plan = delete_cascade_plan(&id, &self.languages, ctx.policy);

        let mut removed_translations: Vec<TranslationId> = Vec::new();
        let mut removed_requests = Vec::new();
        for doomed in &plan.to_delete {
            removed_translations.extend(
                self.translations
                    .find_by_language(doomed)
                    .into_iter()
                    .map(|t| t.id),
            );
            removed_requests.extend(self.request_ids_where(|r| &r.language_id == doomed));
        }

        Ok(CommandOutcome::LanguageDeleted {
            deleted: plan.to_delete,
            orphaned: plan.to_orphan,
            removed_translations,
            removed_requests,
        })
    }

    fn create_key(
        &self,
        payload: CreateKey,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        let CreateKey { key, description } = payload;

        validate_key(&key).map_err(|reason| CommandError::InvalidKey {
            key: key.clone(),
            reason,
        })?;
        self.keys
            .check_insertable(&key)
            .map_err(|conflict| CommandError::from_conflict(&key, conflict))?;

        Ok(CommandOutcome::KeyCreated(Key {
            id: KeyId::new(),
            key,
            description: non_blank(description),
            created_at: ctx.now,
            created_by: ctx.actor.clone(),
        }))
    }

    fn rename_key(&self, payload: RenameKey) -> Result<CommandOutcome, CommandError> {
        let RenameKey { id, new_key } = payload;

        let current = self
            .key_by_id(id)
            .ok_or_else(|| key_not_found(Some(id), None))?;
        validate_key(&new_key).map_err(|reason| CommandError::InvalidKey {
            key: new_key.clone(),
            reason,
        })?;
        if new_key == current.key {
            return Err(CommandError::UnchangedName { key: new_key });
        }
        self.keys
            .check_insertable_excluding(&new_key, Some(&current.key))
            .map_err(|conflict| CommandError::from_conflict(&new_key, conflict))?;

        let mut record = current.clone();
        record.key = new_key;
        Ok(CommandOutcome::KeyRenamed(record))
    }

    fn update_key(&self, payload: UpdateKey) -> Result<CommandOutcome, CommandError> {
        let mut record = self
            .find_key(payload.id, payload.key.as_deref())?
            .cloned()
            .ok_or_else(|| key_not_found(payload.id, payload.key.as_deref()))?;

        record.description = non_blank(payload.description);
        Ok(CommandOutcome::KeyUpdated(record))
    }

    fn delete_key(&self, selector: KeySelector) -> Result<CommandOutcome, CommandError> {
        let id = self
            .find_key(selector.id, selector.key.as_deref())?
            .map(|key| key.id)
            .ok_or_else(|| key_not_found(selector.id, selector.key.as_deref()))?;

        Ok(CommandOutcome::KeyDeleted {
            id,
            removed_translations: self
                .translations
                .find_by_key(id)
                .into_iter()
                .map(|t| t.id)
                .collect(),
            removed_requests: self.request_ids_where(|r| r.key_id == id),
        })
    }

    fn translate(
        &self,
        payload: SetTranslation,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        let SetTranslation {
            lang,
            key_id,
            key,
            value,
        } = payload;

        let resolved = self.resolve_pair(key_id, key.as_deref(), &lang)?;
        let (translation, created) =
            self.translations
                .preview_upsert(resolved, &lang, &value, ctx.actor.as_deref(), ctx.now);
        Ok(CommandOutcome::TranslationSaved {
            translation,
            created,
        })
    }

    fn delete_translation(&self, payload: DeleteTranslation) -> Result<CommandOutcome, CommandError> {
        let DeleteTranslation { lang, key_id, key } = payload;
        let not_found = || CommandError::NotFound {
            entity: "translation",
            id: format!("{}/{}", key_label(key_id, key.as_deref()), lang),
        };

        let resolved = self
            .find_key(key_id, key.as_deref())?
            .map(|record| record.id)
            .ok_or_else(not_found)?;
        let existing = self
            .translations
            .find_by_pair(resolved, &lang)
            .ok_or_else(not_found)?;

        Ok(CommandOutcome::TranslationDeleted { id: existing.id })
    }

    fn create_translation_request(
        &self,
        payload: CreateTranslationRequest,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        let CreateTranslationRequest {
            lang,
            key_id,
            key,
            translation,
            comment,
        } = payload;

        let resolved = self.resolve_pair(key_id, key.as_deref(), &lang)?;
        let translation = required_translation(translation)?;

        Ok(CommandOutcome::TranslationRequestCreated(
            TranslationRequest {
                id: TranslationRequestId::new(),
                key_id: resolved,
                language_id: lang,
                translation,
                comment: non_blank(comment),
                created_at: ctx.now,
                updated_at: ctx.now,
                created_by: ctx.actor.clone(),
            },
        ))
    }

    /// A blank comment clears it; an omitted one is kept.
    fn update_translation_request(
        &self,
        payload: UpdateTranslationRequest,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        let UpdateTranslationRequest {
            id,
            translation,
            comment,
        } = payload;

        let mut request = self
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| CommandError::NotFound {
                entity: "translation request",
                id: id.to_string(),
            })?;

        if let Some(translation) = translation {
            request.translation = required_translation(translation)?;
        }
        if comment.is_some() {
            request.comment = non_blank(comment);
        }
        request.updated_at = ctx.now;
        Ok(CommandOutcome::TranslationRequestUpdated(request))
    }

    /// Resolve a key named by id or by key string. The id wins when both are given.
    fn find_key(&self, id: Option<KeyId>, key: Option<&str>) -> Result<Option<&Key>, CommandError> {
        match (id, key) {
            (Some(id), _) => Ok(self.key_by_id(id)),
            (None, Some(path)) => Ok(self.keys.get(path)),
            (None, None) => Err(CommandError::Validation(
                "a key id or key string is required".to_string(),
            )),
        }
    }

    /// Resolve the key of a (key, language) pair, both of which must exist.
    fn resolve_pair(
        &self,
        key_id: Option<KeyId>,
        key: Option<&str>,
        lang: &LanguageId,
    ) -> Result<KeyId, CommandError> {
        let resolved = self
            .find_key(key_id, key)?
            .map(|record| record.id)
            .ok_or_else(|| CommandError::UnknownKey {
                key: key_label(key_id, key),
            })?;
        if !self.languages.contains_key(lang) {
            return Err(CommandError::UnknownLanguage { id: lang.clone() });
        }
        Ok(resolved)
    }

    fn request_ids_where(
        &self,
        predicate: impl Fn(&TranslationRequest) -> bool,
    ) -> Vec<TranslationRequestId> {
        self.requests
            .values()
            .filter(|request| predicate(request))
            .map(|request| request.id)
            .collect()
    }

    // ==================== Snapshots ====================

    pub fn to_snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            keys: self.keys.keys().into_iter().cloned().collect(),
            languages: self.languages.values().cloned().collect(),
            translations: self.translations.iter().cloned().collect(),
            requests: self.requests.values().cloned().collect(),
        }
    }

    /// Rebuild a catalog from stored records, re-checking every invariant.
    ///
    /// Invalid or colliding keys are fatal. Dangling or cyclic language
    /// parents are cleared, and translations or requests referencing missing
    /// records are dropped, each with a warning.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self> {
        let mut key_paths = HashMap::with_capacity(snapshot.keys.len());
        for key in &snapshot.keys {
            validate_key(&key.key)
                .with_context(|| format!("Stored key '{}' is invalid", key.key))?;
            if key_paths.insert(key.id, key.key.clone()).is_some() {
                bail!("Stored key id {} appears more than once", key.id);
            }
        }
        let keys = KeyTree::try_build(snapshot.keys).map_err(|(candidate, conflict)| {
            anyhow::anyhow!(
                "Stored key '{}' collides with '{}' ({:?})",
                candidate,
                conflict.conflicting_key,
                conflict.kind
            )
        })?;

        let mut languages = BTreeMap::new();
        for language in snapshot.languages {
            validate_language_code(language.id.as_str())
                .with_context(|| format!("Stored language code '{}' is invalid", language.id))?;
            languages.insert(language.id.clone(), language);
        }
        reroot_broken_parents(&mut languages);

        let mut translations = TranslationIndex::new();
        for translation in snapshot.translations {
            if !key_paths.contains_key(&translation.key_id)
                || !languages.contains_key(&translation.language_id)
            {
                warn!(
                    "Dropping translation {} for missing key {} or language {}",
                    translation.id, translation.key_id, translation.language_id
                );
                continue;
            }
            translations.restore(translation);
        }

        let mut requests = BTreeMap::new();
        for request in snapshot.requests {
            if !key_paths.contains_key(&request.key_id)
                || !languages.contains_key(&request.language_id)
            {
                warn!(
                    "Dropping translation request {} for missing key {} or language {}",
                    request.id, request.key_id, request.language_id
                );
                continue;
            }
            requests.insert(request.id, request);
        }

        Ok(Self {
            keys,
            key_paths,
            languages,
            translations,
            requests,
        })
    }
}

/// Clear parents that are missing or that lead back into a cycle.
fn reroot_broken_parents(languages: &mut BTreeMap<LanguageId, Language>) {
    let ids: Vec<LanguageId> = languages.keys().cloned().collect();

    for id in ids {
        let Some(parent_id) = languages.get(&id).and_then(|l| l.parent_id.clone()) else {
            continue;
        };

        let dangling = !languages.contains_key(&parent_id);
        let cyclic = !dangling && parent_chain_returns_to(&id, languages);
        if dangling || cyclic {
            warn!(
                "Clearing parent '{}' of language '{}' ({})",
                parent_id,
                id,
                if dangling { "missing" } else { "cycle" }
            );
            if let Some(language) = languages.get_mut(&id) {
                language.parent_id = None;
            }
        }
    }
}

fn parent_chain_returns_to(id: &LanguageId, languages: &BTreeMap<LanguageId, Language>) -> bool {
    let mut current = languages.get(id).and_then(|l| l.parent_id.as_ref());
    let mut steps = 0;
    while let Some(parent_id) = current {
        if parent_id == id {
            return true;
        }
        steps += 1;
        if steps > languages.len() {
            return false;
        }
        current = languages.get(parent_id).and_then(|l| l.parent_id.as_ref());
    }
    false
}

fn validate_code(id: &LanguageId) -> Result<(), CommandError> {
    match validate_language_code(id.as_str()) {
        Ok(()) => Ok(()),
        Err(InvalidReason::Empty) => Err(CommandError::Validation(
            "language code must not be empty".to_string(),
        )),
        Err(reason) => Err(CommandError::InvalidLanguageCode {
            code: id.to_string(),
            reason,
        }),
    }
}

fn required_name(name: &str) -> Result<String, CommandError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CommandError::Validation(
            "language name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Clients send an empty string for "no parent".
fn non_empty(id: Option<LanguageId>) -> Option<LanguageId> {
    id.filter(|id| !id.as_str().trim().is_empty())
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.trim().is_empty())
}

fn required_translation(value: String) -> Result<String, CommandError> {
    if value.trim().is_empty() {
        return Err(CommandError::Validation(
            "translation must not be empty".to_string(),
        ));
    }
    Ok(value)
}

fn key_label(id: Option<KeyId>, key: Option<&str>) -> String {
    match (id, key) {
        (Some(id), _) => id.to_string(),
        (None, Some(key)) => key.to_string(),
        (None, None) => String::new(),
    }
}

fn key_not_found(id: Option<KeyId>, key: Option<&str>) -> CommandError {
    CommandError::NotFound {
        entity: "key",
        id: key_label(id, key),
    }
}

/// Translations of a key, for callers that hold only the key string.
pub fn translations_for<'a>(
    catalog: &'a Catalog,
    path: &str,
) -> Option<(&'a Key, Vec<&'a Translation>)> {
    let key = catalog.key_by_path(path)?;
    Some((key, catalog.translations.find_by_key(key.id)))
}
