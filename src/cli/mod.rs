//! # Command Line Interface
//!
//! Drives a [`SecureProvider`] backed by [`VaultStoreClient`] from the shell.
//! Store settings come from `SECRETSTORE_*` variables (and `.env`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::{ProviderConfig, SecretStoreConfig};
use crate::observability::init_observability;
use crate::secrets::{
    AuthTokenLoader, FileTokenLoader, SecretData, SecretStoreClient, SecureProvider, TokenType,
    VaultStoreClient,
};

#[derive(Parser, Debug)]
#[command(name = "secure-provider")]
#[command(about = "Read, write and seed service secrets in the secret store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Service key used for access tokens and the self JWT
    #[arg(long, global = true, env = "SECURE_PROVIDER_SERVICE_KEY", default_value = "secure-provider")]
    pub service_key: String,

    /// Token file override
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    /// Store path override
    #[arg(long, global = true)]
    pub store_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get a secret, optionally only some of its keys
    Get {
        secret_name: String,
        keys: Vec<String>,
    },

    /// Store a secret from key=value pairs
    Store {
        secret_name: String,
        #[arg(short, long = "data", value_parser = parse_key_val, required = true)]
        data: Vec<(String, String)>,
    },

    /// List secret names
    List,

    /// Check whether a secret exists
    Has { secret_name: String },

    /// Import a seeding document
    Seed {
        /// Seeding document; defaults to SECRETSTORE_SECRETSFILE
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Leave the document untouched after import
        #[arg(long)]
        no_scrub: bool,
    },

    /// Issue an access token
    Token {
        #[arg(long, default_value = TokenType::CONSUL)]
        token_type: String,
    },

    /// Print this service's JWT and whether the store accepts it
    Jwt,
}

/// Parse a `key=value` argument.
pub fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[derive(Serialize)]
struct HasOutput<'a> {
    secret_name: &'a str,
    exists: bool,
}

#[derive(Serialize)]
struct SeedOutput {
    stored: Vec<String>,
    skipped: Vec<String>,
    failures: Vec<SeedFailureOutput>,
}

#[derive(Serialize)]
struct SeedFailureOutput {
    secret_name: String,
    error: String,
}

#[derive(Serialize)]
struct JwtOutput {
    jwt: String,
    valid: bool,
}

fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

fn load_env() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }
}

/// Run CLI commands
pub async fn run_cli() -> Result<()> {
    load_env();
    let cli = Cli::parse();

    let config = resolve_config(&cli, ProviderConfig::from_env())?;
    init_observability(&config.observability)?;

    let provider = connect(config.secret_store, &cli.service_key).await?;
    handle_command(cli.command, &provider).await
}

/// Apply command line overrides to the environment configuration and validate.
fn resolve_config(cli: &Cli, mut config: ProviderConfig) -> Result<ProviderConfig> {
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    if let Some(token_file) = &cli.token_file {
        config.secret_store.token_file = token_file.clone();
    }
    if let Some(store_path) = &cli.store_path {
        config.secret_store.store_path = store_path.clone();
    }

    config.validate_all()?;
    Ok(config)
}

/// Build the provider with an authenticated store client.
async fn connect(config: SecretStoreConfig, service_key: &str) -> Result<SecureProvider> {
    let loader = Arc::new(FileTokenLoader::new());
    let client = Arc::new(VaultStoreClient::new(&config)?);

    let token = loader
        .load(&config.token_file)
        .await
        .with_context(|| format!("Failed to load token from {}", config.token_file.display()))?;
    client.set_auth_token(&token).await?;

    Ok(SecureProvider::new(config, loader, service_key).with_client(client))
}

async fn handle_command(command: Commands, provider: &SecureProvider) -> Result<()> {
    match command {
        Commands::Get { secret_name, keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            let secrets = provider.get_secret(&secret_name, &keys).await?;
            print_json(&secrets)?;
        }
        Commands::Store { secret_name, data } => {
            let secrets: SecretData = data.into_iter().collect();
            provider.store_secret(&secret_name, &secrets).await?;
            println!("Stored {} key(s) at '{}'", secrets.len(), secret_name);
        }
        Commands::List => {
            print_json(&provider.list_secret_names().await?)?;
        }
        Commands::Has { secret_name } => {
            let exists = provider.has_secret(&secret_name).await?;
            print_json(&HasOutput { secret_name: &secret_name, exists })?;
        }
        Commands::Seed { file, no_scrub } => {
            let path = file
                .or_else(|| provider.config().secrets_file.clone())
                .context("No secrets file given and SECRETSTORE_SECRETSFILE is not set")?;
            let scrub = !no_scrub && !provider.config().disable_scrub_secrets_file;

            let report = provider.load_service_secrets_with_report(&path, scrub).await?;
            print_json(&SeedOutput {
                stored: report.stored.clone(),
                skipped: report.skipped.clone(),
                failures: report
                    .failures
                    .iter()
                    .map(|f| SeedFailureOutput { secret_name: f.secret_name.clone(), error: f.error.clone() })
                    .collect(),
            })?;
            report.into_result()?;
        }
        Commands::Token { token_type } => {
            let token = provider.get_access_token(&token_type, provider.service_key()).await?;
            println!("{}", token.expose_secret());
        }
        Commands::Jwt => {
            let jwt = provider.get_self_jwt().await?;
            let valid = provider.is_jwt_valid(&jwt).await?;
            print_json(&JwtOutput { jwt, valid })?;
        }
    }

    Ok(())
}
