//! Shared, serialized access to the canonical catalog.
//!
//! Commands take the write lock for their whole plan-persist-commit cycle,
//! so no command ever observes another's half-applied state. The delta is
//! written to the database before it touches the in-memory catalog; a failed
//! write leaves both unchanged. Readers take the read lock and see the
//! catalog between commands only.

use crate::catalog::language_forest::DeletePolicy;
use crate::catalog::{Catalog, CommandContext};
use crate::command::{Command, CommandOutcome};
use crate::config::Config;
use crate::db::{Database, DATABASE_FILE_NAME};
use crate::error::CommandError;
use crate::metrics::CommandMetrics;
use anyhow::{Context, Result};
use std::fs;
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct Store {
    catalog: Arc<RwLock<Catalog>>,
    db: Option<Database>,
    policy: DeletePolicy,
    default_actor: Option<String>,
    metrics: Arc<CommandMetrics>,
}

impl Store {
    /// Volatile store with the given delete policy.
    pub fn in_memory(policy: DeletePolicy) -> Self {
        Self::with_catalog(Catalog::new(), None, policy)
    }

    /// Store configured from the environment, loading the existing database.
    pub fn open(config: &Config) -> Result<Self> {
        let (catalog, db) = match &config.data_path {
            Some(dir) => {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create data directory {}", dir.display())
                })?;
                let db_path = dir.join(DATABASE_FILE_NAME);
                let path = db_path
                    .to_str()
                    .with_context(|| format!("Database path {} is not UTF-8", db_path.display()))?;

                let db = Database::new(path)?;
                let catalog = Catalog::from_snapshot(db.load()?)
                    .with_context(|| format!("Database {} failed validation", path))?;
                (catalog, Some(db))
            }
            None => {
                info!("No data path configured, catalog is in-memory only");
                (Catalog::new(), None)
            }
        };

        let mut store = Self::with_catalog(catalog, db, config.language_delete_policy);
        store.default_actor = config.default_actor.clone();
        Ok(store)
    }

    /// `catalog` must match what `db` holds.
    pub fn with_catalog(catalog: Catalog, db: Option<Database>, policy: DeletePolicy) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            db,
            policy,
            default_actor: None,
            metrics: Arc::new(CommandMetrics::new()),
        }
    }

    pub fn policy(&self) -> DeletePolicy {
        self.policy
    }

    pub fn metrics(&self) -> &CommandMetrics {
        &self.metrics
    }

    /// Apply one command. `actor` falls back to the configured default.
    pub fn execute(
        &self,
        command: Command,
        actor: Option<String>,
    ) -> Result<CommandOutcome, CommandError> {
        let name = command.name();
        let result = self.execute_inner(command, actor);

        match &result {
            Ok(_) => {
                info!("Applied {}", name);
                self.metrics.record_applied();
            }
            Err(e) => {
                warn!("Rejected {}: {} ({})", name, e.code(), e);
                self.metrics.record_rejected(e.kind());
            }
        }
        result
    }

    fn execute_inner(
        &self,
        command: Command,
        actor: Option<String>,
    ) -> Result<CommandOutcome, CommandError> {
        let actor = actor.or_else(|| self.default_actor.clone());
        let ctx = CommandContext::new(self.policy).with_actor(actor);

        let mut catalog = self
            .catalog
            .write()
            .map_err(|_| CommandError::Storage("catalog lock poisoned".to_string()))?;

        let outcome = catalog.plan(command, &ctx)?;

        if let Some(db) = &self.db {
            if let Err(e) = db.persist(&outcome) {
                error!("Failed to persist command, catalog unchanged: {:#}", e);
                return Err(CommandError::Storage(format!("{:#}", e)));
            }
        }

        catalog.commit(&outcome)?;
        Ok(outcome)
    }

    /// Run `f` against a consistent view of the catalog.
    pub fn read<T>(&self, f: impl FnOnce(&Catalog) -> T) -> Result<T, CommandError> {
        let catalog = self
            .catalog
            .read()
            .map_err(|_| CommandError::Storage("catalog lock poisoned".to_string()))?;
        Ok(f(&catalog))
    }
}
