//! Config command - credentials, profiles and `config.yaml`
//!
//! Provides the `ghl config` CLI command which:
//! 1. Stores the API token (credentials file or OS keyring) and location
//! 2. Manages named profiles
//! 3. Shows, sets and validates `config.yaml` values via dot-notation keys

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Password;
use ghl_core::config::Config;
use ghl_core::credentials::{CredentialsFile, KeyringSecretStore, SecretStore};
use ghl_core::domain::{ApiToken, LocationId, ProfileName};
use ghl_core::profiles::Profile;
use ghl_core::storage;
use serde_json::json;
use tracing::{info, warn};

use super::confirm;
use crate::context::AppContext;
use crate::output::{to_rows, Column, OutputFormat};

const PROFILE_COLUMNS: [Column; 4] = [
    ("name", "Name"),
    ("location_id", "Location"),
    ("token", "Token"),
    ("active", "Active"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display configuration and the credentials in effect
    Show,
    /// Set a configuration value (e.g. "retry.max_attempts 6")
    Set {
        /// Dotted key; see `ghl config keys`
        key: String,
        /// New value; empty clears optional keys
        value: String,
    },
    /// List settable configuration keys
    Keys,
    /// Validate the configuration file
    Validate,
    /// Store the API token (prompts when omitted); updates the active profile if any
    SetToken {
        token: Option<String>,
        /// Store in the OS keyring instead of credentials.json
        #[arg(long)]
        keyring: bool,
    },
    /// Set the default location ID
    SetLocation { location_id: String },
    /// Set the default output format
    SetFormat {
        #[arg(value_parser = clap::value_parser!(OutputFormat))]
        format: OutputFormat,
    },
    /// Remove stored credentials
    #[command(group(ArgGroup::new("what").required(true).args(["token", "all"])))]
    Clear {
        /// Remove the stored token only
        #[arg(long)]
        token: bool,
        /// Remove tokens, profiles, saved searches and config.yaml
        #[arg(long)]
        all: bool,
        #[arg(short, long)]
        yes: bool,
    },
    /// Manage named profiles
    #[command(subcommand)]
    Profiles(ProfilesCommand),
}

#[derive(Debug, Subcommand)]
pub enum ProfilesCommand {
    /// List profiles
    List,
    /// Add or replace a profile
    Add {
        name: String,
        /// API token (prompts when omitted)
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        location_id: Option<String>,
    },
    /// Make a profile active
    Use { name: String },
    /// Delete a profile
    Remove {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
}

fn prompt_token() -> Result<ApiToken> {
    let token = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("API token")
        .interact()
        .context("Failed to read token")?;
    Ok(ApiToken::new(token)?)
}

fn token_arg(token: &Option<String>) -> Result<ApiToken> {
    match token {
        Some(token) => Ok(ApiToken::new(token.as_str())?),
        None => prompt_token(),
    }
}

impl ConfigCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(app),
            ConfigCommand::Set { key, value } => self.execute_set(app, key, value),
            ConfigCommand::Keys => {
                let out = app.formatter();
                if app.format == OutputFormat::Json {
                    out.print_json(&json!(Config::keys()));
                } else {
                    for key in Config::keys() {
                        out.info(&key);
                    }
                }
                Ok(())
            }
            ConfigCommand::Validate => self.execute_validate(app),
            ConfigCommand::SetToken { token, keyring } => {
                self.execute_set_token(app, token_arg(token)?, *keyring)
            }
            ConfigCommand::SetLocation { location_id } => self.execute_set_location(app, location_id),
            ConfigCommand::SetFormat { format } => {
                let mut config = app.config.clone();
                config.output.format = *format;
                config.save(&app.paths.config)?;
                app.formatter().success(&format!("Output format set to {format}"));
                Ok(())
            }
            ConfigCommand::Clear { token, all, yes } => self.execute_clear(app, *token, *all, *yes),
            ConfigCommand::Profiles(cmd) => cmd.execute(app),
        }
    }

    fn execute_show(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let path = &app.paths.config;
        info!(config_path = %path.display(), "Showing configuration");

        let credentials = app.credentials().ok();
        let summary = credentials.as_ref().map(|c| {
            json!({
                "source": c.source.to_string(),
                "token": c.token.masked(),
                "location_id": c.location_id.as_ref().map(|l| l.as_str()),
            })
        });

        if app.format == OutputFormat::Json {
            out.print_json(&json!({
                "config_path": path.display().to_string(),
                "config": serde_json::to_value(&app.config).context("Failed to serialize configuration")?,
                "credentials": summary,
            }));
            return Ok(());
        }

        out.success(&format!("Configuration ({})", path.display()));
        out.info("");
        let yaml = serde_yaml::to_string(&app.config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            out.info(line);
        }
        out.info("");
        match credentials {
            Some(c) => {
                out.info(&format!("Token:     {} (from {})", c.token.masked(), c.source));
                let location = c.location_id.as_ref().map_or("not set", |l| l.as_str());
                out.info(&format!("Location:  {location}"));
            }
            None => out.info("Token:     not configured (run 'ghl config set-token')"),
        }
        Ok(())
    }

    fn execute_set(&self, app: &AppContext, key: &str, value: &str) -> Result<()> {
        let out = app.formatter();
        let mut config = app.config.clone();
        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = config.set_value(key, value) {
            out.error(&format!("Failed to set '{key}': {e:#}"));
            out.info("");
            out.info("Supported keys:");
            for key in Config::keys() {
                out.info(&format!("  {key}"));
            }
            bail!("Configuration unchanged");
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid value for '{key}': {}", messages.join("; "));
        }

        config.save(&app.paths.config)?;
        if app.format == OutputFormat::Json {
            out.print_json(&json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": app.paths.config.display().to_string(),
            }));
        } else {
            out.success(&format!("Set {key} = {value}"));
            out.info(&format!("Saved to {}", app.paths.config.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let path = &app.paths.config;

        if !path.exists() {
            out.info(&format!("Configuration file not found at {}", path.display()));
            out.info("Using defaults. Run 'ghl config set <key> <value>' to create one.");
            return Ok(());
        }
        // Unknown keys and bad types fail here
        let config = Config::load(path)?;
        let errors = config.validate();

        if app.format == OutputFormat::Json {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            out.print_json(&json!({
                "valid": errors.is_empty(),
                "config_path": path.display().to_string(),
                "errors": messages,
            }));
        } else if errors.is_empty() {
            out.success("Configuration is valid");
            out.info(&format!("File: {}", path.display()));
        } else {
            out.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            out.info(&format!("File: {}", path.display()));
            for error in &errors {
                out.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            bail!("Configuration is invalid")
        }
    }

    fn execute_set_token(&self, app: &AppContext, token: ApiToken, keyring: bool) -> Result<()> {
        let out = app.formatter();
        let masked = token.masked();

        // An active profile owns the token that commands run with.
        if let Some(name) = app.profiles().set_active_token(token.clone())? {
            out.success(&format!("API token {masked} saved to profile '{name}'"));
            return Ok(());
        }

        let stored_in_keyring = keyring
            && match KeyringSecretStore::new().set_token(&token) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Keyring unavailable");
                    out.warn(&format!("{e:#}; storing in {} instead", app.paths.credentials.display()));
                    false
                }
            };

        if stored_in_keyring {
            CredentialsFile::clear(&app.paths.credentials)?;
            out.success(&format!("API token {masked} stored in the keyring"));
        } else {
            CredentialsFile { api_token: Some(token) }.save(&app.paths.credentials)?;
            out.success(&format!("API token {masked} saved to {}", app.paths.credentials.display()));
        }
        Ok(())
    }

    fn execute_set_location(&self, app: &AppContext, location_id: &str) -> Result<()> {
        let out = app.formatter();
        let location = LocationId::new(location_id)?;
        let profile = store_location(app, &location)?;
        out.success(&format!("Location set to {}", location.as_str()));
        if let Some(name) = profile {
            out.info(&format!("Updated profile '{name}'"));
        }
        Ok(())
    }

    fn execute_clear(&self, app: &AppContext, token: bool, all: bool, yes: bool) -> Result<()> {
        let out = app.formatter();
        let prompt = if all {
            "Remove all stored tokens, profiles, saved searches and configuration?"
        } else {
            "Remove the stored API token?"
        };
        if !confirm(prompt, yes)? {
            out.info("Cancelled");
            return Ok(());
        }

        if token || all {
            CredentialsFile::clear(&app.paths.credentials)?;
            if let Err(e) = KeyringSecretStore::new().delete_token() {
                warn!(error = %e, "Could not clear keyring entry");
            }
        }
        if all {
            app.profiles().clear()?;
            storage::remove_if_exists(&app.paths.saved_searches)?;
            storage::remove_if_exists(&app.paths.config)?;
        }
        out.success(if all { "All stored configuration removed" } else { "API token removed" });
        Ok(())
    }
}

/// Saves `location` as the default in `config.yaml` and on the active
/// profile, returning that profile's name.
pub fn store_location(app: &AppContext, location: &LocationId) -> Result<Option<ProfileName>> {
    let mut config = app.config.clone();
    config.location_id = Some(location.as_str().to_string());
    config.save(&app.paths.config)?;
    app.profiles().set_active_location(Some(location.clone()))
}

impl ProfilesCommand {
    pub fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let store = app.profiles();

        match self {
            ProfilesCommand::List => {
                let profiles = store.list()?;
                let rows = to_rows(&profiles)?;
                out.print_list(&format!("Profiles ({})", rows.len()), &rows, &PROFILE_COLUMNS);
            }
            ProfilesCommand::Add {
                name,
                token,
                location_id,
            } => {
                let name = ProfileName::new(name.as_str())?;
                let location_id = location_id.as_deref().map(LocationId::new).transpose()?;
                let api_token = token_arg(token)?;
                store.upsert(name.clone(), Profile { api_token, location_id })?;
                out.success(&format!("Profile '{name}' saved"));
            }
            ProfilesCommand::Use { name } => {
                let name = ProfileName::new(name.as_str())?;
                store.use_profile(&name)?;
                out.success(&format!("Now using profile '{name}'"));
            }
            ProfilesCommand::Remove { name, yes } => {
                let name = ProfileName::new(name.as_str())?;
                if !confirm(&format!("Remove profile '{name}'?"), *yes)? {
                    out.info("Cancelled");
                    return Ok(());
                }
                if !store.remove(&name)? {
                    bail!("Profile '{name}' not found");
                }
                out.success(&format!("Profile '{name}' removed"));
            }
        }
        Ok(())
    }
}
