use clap::Subcommand;
use notiplan_core::{Config, Database};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value by dot-separated key
    Get {
        /// e.g. "consent.key_prefix", "scheduler.serialize_per_group"
        key: String,
    },
    /// Validate and persist one value
    Set {
        key: String,
        value: String,
    },
    /// Print the whole configuration as JSON
    List,
    /// Restore defaults
    Reset,
}

/// Reject values the scheduler would accept but misbehave with.
fn validate(key: &str, value: &str) -> Result<(), String> {
    match key {
        "consent.key_prefix" => {
            if value.is_empty() {
                return Err("consent.key_prefix must not be empty".to_string());
            }
            if value.chars().any(char::is_whitespace) {
                return Err("consent.key_prefix must not contain whitespace".to_string());
            }
            Ok(())
        }
        "logging.filter" => EnvFilter::try_new(value)
            .map(|_| ())
            .map_err(|e| format!("invalid logging.filter {value:?}: {e}")),
        _ => Ok(()),
    }
}

/// Consent answers recorded under `prefix`.
fn answers_under(prefix: &str) -> usize {
    Database::open()
        .and_then(|db| db.kv_scan(prefix))
        .map(|entries| entries.len())
        .unwrap_or(0)
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config
                .get(&key)
                .ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            validate(&key, &value)?;
            let mut config = Config::load()?;
            let previous_prefix = config.consent.key_prefix.clone();
            config.set(&key, &value)?;
            config.save()?;

            if config.consent.key_prefix != previous_prefix {
                let orphaned = answers_under(&previous_prefix);
                if orphaned > 0 {
                    eprintln!(
                        "note: {orphaned} consent answer(s) stored under {previous_prefix:?} \
                         are no longer read"
                    );
                }
            }
            println!("{key} = {}", config.get(&key).unwrap_or(value));
        }
        ConfigAction::List => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
