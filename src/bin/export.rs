//! Export translations from a running server.
//!
//! Usage:
//!   export <language-id> [--fallback] [--out FILE]
//!   export --keys [--out FILE]

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use translator::client::ApiClient;
use translator::model::LanguageId;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Language { id: LanguageId, fallback: bool },
    Keys,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    target: Target,
    out: Option<PathBuf>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  export <language-id> [--fallback] [--out FILE]");
    eprintln!("  export --keys [--out FILE]");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TRANSLATOR_API_URL  server base URL (default {})", DEFAULT_API_URL);
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut language: Option<String> = None;
    let mut keys = false;
    let mut fallback = false;
    let mut out = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--keys" => keys = true,
            "--fallback" => fallback = true,
            "--out" => {
                let path = iter.next().context("--out needs a file path")?;
                out = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("Unknown option {}", flag),
            value => {
                if language.replace(value.to_string()).is_some() {
                    bail!("Only one language id may be given");
                }
            }
        }
    }

    let target = match (language, keys) {
        (Some(_), true) => bail!("Give either a language id or --keys, not both"),
        (None, false) => bail!("Missing language id or --keys"),
        (None, true) => {
            if fallback {
                bail!("--fallback only applies to language exports");
            }
            Target::Keys
        }
        (Some(id), false) => Target::Language {
            id: LanguageId::from(id),
            fallback,
        },
    };

    Ok(Args { target, out })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("export=info".parse()?)
                .add_directive("translator=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(2);
        }
    };

    let base_url =
        std::env::var("TRANSLATOR_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let client = ApiClient::new(&base_url).context("Failed to build HTTP client")?;

    let json = match &args.target {
        Target::Language { id, fallback } => {
            info!("Exporting language {} from {}", id, base_url);
            let export = client
                .export_language(id, *fallback)
                .await
                .with_context(|| format!("Failed to export language {}", id))?;
            info!("Exported {} values", export.len());
            serde_json::to_string_pretty(&export)?
        }
        Target::Keys => {
            info!("Exporting key tree from {}", base_url);
            let tree = client
                .export_key_tree()
                .await
                .context("Failed to export key tree")?;
            serde_json::to_string_pretty(&tree)?
        }
    };

    match &args.out {
        Some(path) => {
            fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("✓ Wrote {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_language_export() {
        let parsed = parse_args(&args(&["fr", "--fallback", "--out", "fr.json"])).expect("parse");
        assert_eq!(
            parsed,
            Args {
                target: Target::Language {
                    id: LanguageId::from("fr"),
                    fallback: true
                },
                out: Some(PathBuf::from("fr.json")),
            }
        );
    }

    #[test]
    fn test_parse_keys_export() {
        let parsed = parse_args(&args(&["--keys"])).expect("parse");
        assert_eq!(parsed.target, Target::Keys);
        assert_eq!(parsed.out, None);
    }

    #[test]
    fn test_parse_rejects_bad_combinations() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["fr", "--keys"])).is_err());
        assert!(parse_args(&args(&["--keys", "--fallback"])).is_err());
        assert!(parse_args(&args(&["fr", "de"])).is_err());
        assert!(parse_args(&args(&["fr", "--out"])).is_err());
        assert!(parse_args(&args(&["fr", "--verbose"])).is_err());
    }
}
