//! `pawfect-admin` command line
//!
//! Read commands print JSON on stdout; sensitive values are masked unless
//! `resolve --reveal` is used. Logs go to stderr and the log files.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use pawfect_common::crypto::{generate_key_material, inspect};
use pawfect_common::{Encryptor, SYSTEM_ACTOR};
use pawfect_config::SetOptions;
use pawfect_persistence::{Category, StorageMode};

use crate::model::ConfigOverrides;
use crate::startup::AppServices;

/// Operator tooling for the PawfectMatch configuration store
#[derive(Debug, Parser)]
#[command(name = "pawfect-admin", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Settings file (default: conf/application.yml when present)
    #[arg(short = 'c', long = "config", global = true)]
    pub config_file: Option<PathBuf>,

    /// Storage backend: memory | embedded
    #[arg(short = 's', long = "storage", global = true)]
    pub storage: Option<StorageMode>,

    /// RocksDB directory for the embedded backend
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.global.config_file.clone(),
            storage: self.global.storage,
            data_dir: self.global.data_dir.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct ActorArgs {
    /// Recorded as `updatedBy` on the record and its history entry
    #[arg(long, env = "PAWFECT_ACTOR", default_value = SYSTEM_ACTOR)]
    pub actor: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print fresh random key material for CONFIG_ENCRYPTION_KEY
    Keygen,
    /// Seal a value (read from stdin when omitted)
    Seal {
        value: Option<String>,
        /// Key version to seal under (default: the current version)
        #[arg(long)]
        key_version: Option<u8>,
    },
    /// Open a sealed value (read from stdin when omitted)
    Open { value: Option<String> },
    /// Show envelope metadata without decrypting
    Inspect { value: Option<String> },
    /// Show a record with secrets masked
    Get {
        key: String,
        /// Also show a deactivated record
        #[arg(long)]
        include_inactive: bool,
    },
    /// Create or replace a record
    Set {
        key: String,
        /// JSON document
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,
        /// File holding the JSON document
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        category: Option<Category>,
        /// Extra dotted path to seal (repeatable)
        #[arg(long = "sensitive-path")]
        sensitive_paths: Vec<String>,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// List active records, optionally of one category
    List {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Show the audit trail of a record, newest first
    History {
        key: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the effective settings of a subsystem
    Resolve {
        subsystem: String,
        /// Print decrypted secrets instead of the sentinel
        #[arg(long)]
        reveal: bool,
    },
    /// Deactivate a record
    Deactivate {
        key: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Report which stored secrets are not sealed under the current key
    Audit,
    /// Re-seal every stored secret under a key version
    Rotate {
        /// Target key version (default: the current version)
        #[arg(long = "to")]
        target_version: Option<u8>,
        #[command(flatten)]
        actor: ActorArgs,
    },
}

impl Command {
    /// Commands that only need key material
    pub fn requires_storage(&self) -> bool {
        !matches!(
            self,
            Command::Keygen | Command::Seal { .. } | Command::Open { .. } | Command::Inspect { .. }
        )
    }
}

fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn read_input(value: Option<String>) -> anyhow::Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read value from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn read_document(data: Option<String>, file: Option<PathBuf>) -> anyhow::Result<Value> {
    let raw = match (data, file) {
        (Some(data), _) => data,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("either --data or --file is required"),
    };
    serde_json::from_str(&raw).context("Configuration data is not valid JSON")
}

/// Run a command that needs no storage
pub async fn execute_crypto<W: Write>(
    command: Command,
    encryptor: &Encryptor,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Keygen => {
            writeln!(out, "{}", generate_key_material())?;
        }
        Command::Seal { value, key_version } => {
            let plaintext = read_input(value)?;
            let sealed = match key_version {
                Some(version) => encryptor.seal_with_version_async(&plaintext, version).await?,
                None => encryptor.seal_async(&plaintext).await?,
            };
            writeln!(out, "{}", sealed)?;
        }
        Command::Open { value } => {
            let sealed = read_input(value)?;
            writeln!(out, "{}", encryptor.open_async(&sealed).await?)?;
        }
        Command::Inspect { value } => {
            print_json(out, &inspect(&read_input(value)?))?;
        }
        other => anyhow::bail!("{:?} requires storage", other),
    }
    Ok(())
}

/// Run a command against the configured store
pub async fn execute_store<W: Write>(
    command: Command,
    services: &AppServices,
    history_limit: usize,
    out: &mut W,
) -> anyhow::Result<()> {
    let store = &services.store;
    match command {
        Command::Get {
            key,
            include_inactive,
        } => {
            let record = if include_inactive {
                store.get_including_inactive(&key).await?
            } else {
                store.get(&key).await?
            };
            match record {
                Some(record) => print_json(out, &record)?,
                None => anyhow::bail!("configuration '{}' not found", key),
            }
        }
        Command::Set {
            key,
            data,
            file,
            category,
            sensitive_paths,
            actor,
        } => {
            let document = read_document(data, file)?;
            let mut options = SetOptions::new();
            options.category = category;
            options.sensitive_paths = sensitive_paths;
            let record = store.set(&key, document, &actor.actor, options).await?;
            print_json(out, &record)?;
        }
        Command::List { category } => {
            let records = match category {
                Some(category) => store.list_by_category(category).await?,
                None => store.list_all().await?,
            };
            print_json(out, &records)?;
        }
        Command::History { key, limit } => {
            let entries = store.history(&key, limit.unwrap_or(history_limit)).await?;
            print_json(out, &entries)?;
        }
        Command::Resolve { subsystem, reveal } => {
            let resolved = services.resolver.resolve(&subsystem).await?;
            if reveal {
                warn!(subsystem = %subsystem, "Printing decrypted configuration");
                print_json(out, &resolved)?;
            } else {
                print_json(out, &resolved.masked())?;
            }
        }
        Command::Deactivate { key, actor } => {
            if !store.deactivate(&key, &actor.actor).await? {
                anyhow::bail!("configuration '{}' not found", key);
            }
            writeln!(out, "deactivated {}", key)?;
        }
        Command::Audit => {
            print_json(out, &services.rotation.audit().await?)?;
        }
        Command::Rotate {
            target_version,
            actor,
        } => {
            let target = target_version.unwrap_or_else(|| store.encryptor().current_version());
            let report = services.rotation.rotate_all(target, &actor.actor).await?;
            print_json(out, &report)?;
            if !report.is_clean() {
                anyhow::bail!(
                    "{} record(s) could not be rotated",
                    report.failures.len()
                );
            }
        }
        other => execute_crypto(other, store.encryptor(), out).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pawfect_common::SENSITIVE_SENTINEL;
    use pawfect_common::crypto::{KdfParams, StaticKeyProvider, is_sealed};
    use pawfect_config::SchemaRegistry;
    use pawfect_persistence::MemoryPersistService;
    use serde_json::json;

    fn encryptor() -> Encryptor {
        let keys = StaticKeyProvider::new(1)
            .with_key(1, "cli-test-key-1")
            .with_key(2, "cli-test-key-2");
        Encryptor::new(Arc::new(keys)).with_kdf_params(KdfParams::new(4, 8, 1))
    }

    fn services() -> AppServices {
        AppServices::new(
            Arc::new(MemoryPersistService::new()),
            encryptor(),
            SchemaRegistry::builtin(),
        )
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pawfect-admin").chain(args.iter().copied())).unwrap()
    }

    async fn run_store(services: &AppServices, args: &[&str]) -> anyhow::Result<String> {
        let mut out = Vec::new();
        execute_store(parse(args).command, services, 20, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    async fn run_crypto(args: &[&str]) -> anyhow::Result<String> {
        let mut out = Vec::new();
        execute_crypto(parse(args).command, &encryptor(), &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_global_overrides() {
        let cli = parse(&["--storage", "memory", "--data-dir", "/tmp/p", "audit"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.storage, Some(StorageMode::Memory));
        assert_eq!(overrides.data_dir, Some(PathBuf::from("/tmp/p")));
        assert!(cli.command.requires_storage());
        assert!(!parse(&["keygen"]).command.requires_storage());
    }

    #[test]
    fn test_set_requires_data_or_file() {
        let result = Cli::try_parse_from(["pawfect-admin", "set", "maps"]);
        assert!(result.is_err());
        let result =
            Cli::try_parse_from(["pawfect-admin", "set", "maps", "--data", "{}", "--file", "x"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_seal_open_inspect() {
        let sealed = run_crypto(&["seal", "hunter2"]).await.unwrap();
        let sealed = sealed.trim();
        assert!(is_sealed(sealed));

        let opened = run_crypto(&["open", sealed]).await.unwrap();
        assert_eq!(opened.trim(), "hunter2");

        let info: Value = serde_json::from_str(&run_crypto(&["inspect", sealed]).await.unwrap())
            .unwrap();
        assert_eq!(info["sealed"], json!(true));
        assert_eq!(info["keyVersion"], json!(1));
    }

    #[tokio::test]
    async fn test_seal_with_explicit_version() {
        let sealed = run_crypto(&["seal", "v2-secret", "--key-version", "2"])
            .await
            .unwrap();
        assert_eq!(inspect(sealed.trim()).key_version, Some(2));
    }

    #[tokio::test]
    async fn test_open_rejects_garbage() {
        assert!(run_crypto(&["open", "not-sealed"]).await.is_err());
    }

    #[tokio::test]
    async fn test_keygen_prints_material() {
        let material = run_crypto(&["keygen"]).await.unwrap();
        assert!(!material.trim().is_empty());
    }

    #[tokio::test]
    async fn test_set_get_history_masks_secrets() {
        let services = services();
        let data = json!({"apiKey": "AIza-secret", "provider": "google"}).to_string();

        let output = run_store(&services, &["set", "maps", "--data", &data, "--actor", "ops"])
            .await
            .unwrap();
        assert!(!output.contains("AIza-secret"));
        let record: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(record["data"]["apiKey"], json!(SENSITIVE_SENTINEL));
        assert_eq!(record["updatedBy"], json!("ops"));

        let record: Value =
            serde_json::from_str(&run_store(&services, &["get", "maps"]).await.unwrap()).unwrap();
        assert_eq!(record["version"], json!(1));

        let history: Value =
            serde_json::from_str(&run_store(&services, &["history", "maps"]).await.unwrap())
                .unwrap();
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["data"]["apiKey"], json!(SENSITIVE_SENTINEL));
    }

    #[tokio::test]
    async fn test_resolve_masks_unless_revealed() {
        let services = services();
        let data = json!({"secretKey": "sk_live_1"}).to_string();
        run_store(&services, &["set", "stripe", "--data", &data])
            .await
            .unwrap();

        let masked = run_store(&services, &["resolve", "stripe"]).await.unwrap();
        assert!(!masked.contains("sk_live_1"));
        assert!(masked.contains(SENSITIVE_SENTINEL));

        let revealed = run_store(&services, &["resolve", "stripe", "--reveal"])
            .await
            .unwrap();
        assert!(revealed.contains("sk_live_1"));
    }

    #[tokio::test]
    async fn test_get_missing_and_deactivate() {
        let services = services();
        assert!(run_store(&services, &["get", "maps"]).await.is_err());
        assert!(run_store(&services, &["deactivate", "maps"]).await.is_err());

        run_store(&services, &["set", "maps", "--data", "{\"provider\":\"osm\"}"])
            .await
            .unwrap();
        run_store(&services, &["deactivate", "maps"]).await.unwrap();
        assert!(run_store(&services, &["get", "maps"]).await.is_err());
        assert!(
            run_store(&services, &["get", "maps", "--include-inactive"])
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_list_by_category() {
        let services = services();
        run_store(&services, &["set", "maps", "--data", "{\"provider\":\"osm\"}"])
            .await
            .unwrap();
        run_store(
            &services,
            &["set", "flags", "--data", "{\"beta\":true}", "--category", "security"],
        )
        .await
        .unwrap();

        let listed: Value = serde_json::from_str(
            &run_store(&services, &["list", "--category", "security"])
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["key"], json!("flags"));

        let all: Value =
            serde_json::from_str(&run_store(&services, &["list"]).await.unwrap()).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_audit_and_rotate() {
        let services = services();
        let data = json!({"authToken": "twilio-token"}).to_string();
        run_store(&services, &["set", "sms", "--data", &data])
            .await
            .unwrap();

        let report: Value = serde_json::from_str(
            &run_store(&services, &["rotate", "--to", "2", "--actor", "rotator"])
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(report["rotatedRecords"], json!(["sms"]));

        let audit: Value =
            serde_json::from_str(&run_store(&services, &["audit"]).await.unwrap()).unwrap();
        assert_eq!(audit[0]["keyVersion"], json!(2));
        // Current version is still 1
        assert_eq!(audit[0]["needsRotation"], json!(true));

        assert!(
            run_store(&services, &["rotate", "--to", "7"])
                .await
                .is_err()
        );
    }
}
