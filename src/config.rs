use crate::catalog::language_forest::DeletePolicy;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,

    // Persistence
    pub data_path: Option<PathBuf>,

    // Command processing
    pub language_delete_policy: DeletePolicy,
    pub default_actor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_path: None,
            language_delete_policy: DeletePolicy::default(),
            default_actor: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Server
            host: std::env::var("TRANSLATOR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: match std::env::var("TRANSLATOR_PORT") {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("TRANSLATOR_PORT must be a port number, got '{}'", raw))?,
                Err(_) => 8080,
            },

            // Persistence
            data_path: non_empty_var("TRANSLATOR_DATA_PATH").map(PathBuf::from),

            // Command processing
            language_delete_policy: match non_empty_var("TRANSLATOR_LANGUAGE_DELETE_POLICY") {
                Some(raw) => raw
                    .parse()
                    .map_err(|e: String| anyhow!(e))
                    .context("Invalid TRANSLATOR_LANGUAGE_DELETE_POLICY")?,
                None => DeletePolicy::default(),
            },
            default_actor: non_empty_var("TRANSLATOR_DEFAULT_ACTOR"),
        })
    }

    /// Socket address string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
