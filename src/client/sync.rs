//! Local cache of server state, patched from confirmed command outcomes.
//!
//! The patch functions are pure: they take the old cache and an outcome and
//! return the new cache. [`SyncSession`] applies them only after the server
//! confirms a command, so a failed command never touches local state.

use super::api::{ApiClient, ClientError};
use super::messages::user_message;
use crate::command::{Command, CommandOutcome};
use crate::model::{
    Key, KeyId, Language, LanguageId, Translation, TranslationId, TranslationRequest,
    TranslationRequestId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Client-side projection of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCache {
    pub keys: Vec<Key>,
    pub languages: Vec<Language>,

    /// Translations of the key currently open for editing
    pub translations: Vec<Translation>,

    /// Translation requests of the open key
    #[serde(default)]
    pub requests: Vec<TranslationRequest>,
}

/// Records with a stable identity.
pub trait Identified {
    type Id: PartialEq;

    fn identity(&self) -> Self::Id;
}

impl Identified for Key {
    type Id = KeyId;

    fn identity(&self) -> KeyId {
        self.id
    }
}

impl Identified for Language {
    type Id = LanguageId;

    fn identity(&self) -> LanguageId {
        self.id.clone()
    }
}

impl Identified for Translation {
    type Id = TranslationId;

    fn identity(&self) -> TranslationId {
        self.id
    }
}

impl Identified for TranslationRequest {
    type Id = TranslationRequestId;

    fn identity(&self) -> TranslationRequestId {
        self.id
    }
}

pub fn append<T: Clone>(items: &[T], item: T) -> Vec<T> {
    let mut out = items.to_vec();
    out.push(item);
    out
}

/// Replace the element with the same identity as `item`; unchanged if absent.
pub fn replace_by_id<T: Identified + Clone>(items: &[T], item: T) -> Vec<T> {
    let id = item.identity();
    items
        .iter()
        .map(|existing| {
            if existing.identity() == id {
                item.clone()
            } else {
                existing.clone()
            }
        })
        .collect()
}

pub fn filter_out<T: Clone>(items: &[T], remove: impl Fn(&T) -> bool) -> Vec<T> {
    items.iter().filter(|item| !remove(item)).cloned().collect()
}

fn upsert_by_id<T: Identified + Clone>(items: &[T], item: T) -> Vec<T> {
    let id = item.identity();
    if items.iter().any(|existing| existing.identity() == id) {
        replace_by_id(items, item)
    } else {
        append(items, item)
    }
}

/// The cache after `outcome` was applied on the server.
pub fn apply_outcome(cache: &LocalCache, outcome: &CommandOutcome) -> LocalCache {
    let mut next = cache.clone();

    match outcome {
        CommandOutcome::LanguageCreated(language) => {
            next.languages = append(&cache.languages, language.clone());
        }
        CommandOutcome::LanguageUpdated(language) => {
            next.languages = replace_by_id(&cache.languages, language.clone());
        }
        CommandOutcome::LanguageDeleted {
            deleted,
            orphaned,
            removed_translations,
            removed_requests,
        } => {
            next.languages = filter_out(&cache.languages, |l| deleted.contains(&l.id))
                .into_iter()
                .map(|mut language| {
                    if orphaned.contains(&language.id) {
                        language.parent_id = None;
                    }
                    language
                })
                .collect();
            next.translations = filter_out(&cache.translations, |t| {
                removed_translations.contains(&t.id) || deleted.contains(&t.language_id)
            });
            next.requests = filter_out(&cache.requests, |r| {
                removed_requests.contains(&r.id) || deleted.contains(&r.language_id)
            });
        }
        CommandOutcome::KeyCreated(key) => {
            next.keys = append(&cache.keys, key.clone());
        }
        CommandOutcome::KeyRenamed(key) | CommandOutcome::KeyUpdated(key) => {
            next.keys = replace_by_id(&cache.keys, key.clone());
        }
        CommandOutcome::KeyDeleted {
            id,
            removed_translations,
            removed_requests,
        } => {
            next.keys = filter_out(&cache.keys, |k| k.id == *id);
            next.translations = filter_out(&cache.translations, |t| {
                t.key_id == *id || removed_translations.contains(&t.id)
            });
            next.requests = filter_out(&cache.requests, |r| {
                r.key_id == *id || removed_requests.contains(&r.id)
            });
        }
        CommandOutcome::TranslationSaved { translation, .. } => {
            next.translations = upsert_by_id(&cache.translations, translation.clone());
        }
        CommandOutcome::TranslationDeleted { id } => {
            next.translations = filter_out(&cache.translations, |t| t.id == *id);
        }
        CommandOutcome::TranslationRequestCreated(request)
        | CommandOutcome::TranslationRequestUpdated(request) => {
            next.requests = upsert_by_id(&cache.requests, request.clone());
        }
    }

    next
}

/// An API client plus the cache it keeps in sync.
pub struct SyncSession {
    client: ApiClient,
    cache: LocalCache,
    open_key: Option<String>,
}

impl SyncSession {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            cache: LocalCache::default(),
            open_key: None,
        }
    }

    /// Create a session and load the base snapshot.
    pub async fn connect(client: ApiClient) -> Result<Self, ClientError> {
        let mut session = Self::new(client);
        session.refresh().await?;
        Ok(session)
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn open_key(&self) -> Option<&str> {
        self.open_key.as_deref()
    }

    /// Submit a command; the cache is patched only if the server applied it.
    pub async fn execute(&mut self, command: Command) -> Result<CommandOutcome, ClientError> {
        let open_id = self.open_key_id();

        match self.client.execute(&command).await {
            Ok(outcome) => {
                self.cache = apply_outcome(&self.cache, &outcome);
                self.track_open_key(open_id);
                Ok(outcome)
            }
            Err(e) => {
                warn!("{} failed: {}", command.name(), e);
                Err(e)
            }
        }
    }

    /// Load one key's translations for editing.
    pub async fn open(&mut self, key: &str) -> Result<(), ClientError> {
        let detail = self.client.key_detail(key).await?;
        self.cache.translations = detail.translations;
        self.cache.requests = detail.requests;
        self.cache.languages = detail.languages;
        self.cache.keys = upsert_by_id(&self.cache.keys, detail.key);
        self.open_key = Some(key.to_string());
        debug!("Opened key {}", key);
        Ok(())
    }

    /// Reload from the server, e.g. after a request whose response was lost.
    ///
    /// The cache changes only once every fetch has succeeded. An open key
    /// that no longer exists is closed.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let base = self.client.base_data().await?;
        let detail = match &self.open_key {
            Some(key) => match self.client.key_detail(key).await {
                Ok(detail) => Some(detail),
                Err(e) if e.code() == "NotFound" => {
                    info!("Open key {} no longer exists", key);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        self.cache.keys = base.keys;
        match detail {
            Some(detail) => {
                self.cache.languages = detail.languages;
                self.cache.translations = detail.translations;
                self.cache.requests = detail.requests;
                self.cache.keys = upsert_by_id(&self.cache.keys, detail.key);
            }
            None => {
                self.cache.languages = base.languages;
                self.cache.translations.clear();
                self.cache.requests.clear();
                self.open_key = None;
            }
        }
        Ok(())
    }

    /// Message to show next to the control that triggered `error`.
    pub fn error_message(error: &ClientError) -> String {
        user_message(error.code(), &error.to_string())
    }

    fn open_key_id(&self) -> Option<KeyId> {
        let open = self.open_key.as_deref()?;
        self.cache.keys.iter().find(|k| k.key == open).map(|k| k.id)
    }

    /// Follow the open key through renames; close it once deleted.
    fn track_open_key(&mut self, open_id: Option<KeyId>) {
        let Some(id) = open_id else {
            return;
        };
        match self.cache.keys.iter().find(|k| k.id == id) {
            Some(key) => self.open_key = Some(key.key.clone()),
            None => {
                debug!("Open key {} was deleted", id);
                self.open_key = None;
            }
        }
    }
}
