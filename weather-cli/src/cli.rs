use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{io::Read, sync::Arc};
use tracing::debug;
use weather_core::{
    Config, LocationKeyCache, ProviderId, WeatherResolver, cache::DEFAULT_SWEEP_INTERVAL,
    request, resolver_from_config,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Hourly weather forecast CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "accuweather" or "amap".
        provider: String,
    },

    /// Show the next hours of weather for a location.
    Show {
        /// City name or provider-specific location code.
        location: String,

        /// Provider to use instead of the configured default.
        #[arg(long)]
        provider: Option<String>,

        /// Print the canonical JSON response instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Handle a JSON tool request, e.g. '{"name":"weather","parameters":{"location":"北京"}}'.
    Call {
        /// Request document, or "-" to read it from stdin.
        request: String,

        /// Provider to use instead of the configured default.
        #[arg(long)]
        provider: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show {
                location,
                provider,
                json,
            } => {
                let config = Config::load()?;
                let resolver = build_resolver(&config, provider.as_deref())?;
                let response = resolver.resolve(&location).await?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                } else {
                    print!("{}", output::render(&response));
                }
                Ok(())
            }
            Command::Call {
                request: document,
                provider,
            } => {
                let raw = if document == "-" {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read request from stdin")?;
                    buf
                } else {
                    document
                };

                let config = Config::load()?;
                let resolver = build_resolver(&config, provider.as_deref())?;
                let response = request::handle(resolver.as_ref(), &raw).await;

                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            }
        }
    }
}

fn configure(provider: &str) -> Result<()> {
    let id = ProviderId::try_from(provider)?;

    // Only file-backed settings; env overrides must not be persisted.
    let mut config = Config::load_file()?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.upsert_provider_api_key(id, api_key.trim().to_string());

    let current_default = config.default_provider_id().ok();
    if current_default != Some(id) {
        let make_default = inquire::Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(current_default.is_none())
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

/// One cache per provider, handed to the resolver that owns its namespace.
fn build_resolver(config: &Config, provider: Option<&str>) -> Result<Box<dyn WeatherResolver>> {
    let id = match provider {
        Some(name) => ProviderId::try_from(name)?,
        None => config.default_provider_id()?,
    };

    let cache_path = config.cache_file_path(id)?;
    debug!(provider = %id, path = %cache_path.display(), "Opening location cache");

    let cache = Arc::new(LocationKeyCache::open(cache_path));
    cache.spawn_sweeper(DEFAULT_SWEEP_INTERVAL);

    resolver_from_config(id, config, cache)
}
