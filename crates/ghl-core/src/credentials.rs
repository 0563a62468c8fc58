//! Credential resolution
//!
//! Determines which API token and location id a command runs with. Sources
//! are consulted in a fixed order, first match wins:
//!
//! 1. Environment: `GHL_API_TOKEN` / `GHL_LOCATION_ID`
//! 2. The named profile (`--profile`) or else the active profile
//! 3. The single stored token: `credentials.json`, then the system keyring
//!
//! The location is resolved independently with the same order, falling back
//! to `location_id` in `config.yaml`.
//!
//! Environment access goes through [`EnvSource`] and keyring access through
//! [`SecretStore`], so tests never touch the real process environment or the
//! user's keyring.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{ApiToken, DomainError, LocationId, ProfileName};
use crate::profiles::ProfileStore;
use crate::storage;

/// Environment variable holding the API token.
pub const ENV_API_TOKEN: &str = "GHL_API_TOKEN";
/// Environment variable holding the location id.
pub const ENV_LOCATION_ID: &str = "GHL_LOCATION_ID";

/// Service name used for keyring entries.
pub const KEYRING_SERVICE: &str = "ghl";
const KEYRING_USER: &str = "api_token";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while resolving credentials
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No source provided a token
    #[error(
        "No API token configured. Set GHL_API_TOKEN, add a profile with \
         `ghl config profiles add`, or run `ghl config set-token`"
    )]
    MissingToken,

    /// A source provided a value that failed validation
    #[error("Invalid credential from {source_name}: {error}")]
    Invalid {
        source_name: String,
        #[source]
        error: DomainError,
    },

    /// The named profile does not exist
    #[error("Profile '{0}' does not exist")]
    UnknownProfile(String),

    /// A local credential file could not be read
    #[error("Failed to read stored credentials: {0}")]
    Storage(String),
}

// ============================================================================
// Sources
// ============================================================================

/// Read-only view of environment variables
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticEnv(HashMap<String, String>);

impl StaticEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvSource for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Storage for a single secret token
pub trait SecretStore: Send + Sync {
    fn get_token(&self) -> anyhow::Result<Option<String>>;
    fn set_token(&self, token: &ApiToken) -> anyhow::Result<()>;
    fn delete_token(&self) -> anyhow::Result<()>;
}

/// Token stored in the OS credential store (GNOME Keyring, KWallet, Keychain)
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self) -> anyhow::Result<keyring::Entry> {
        keyring::Entry::new(&self.service, KEYRING_USER).context("Failed to create keyring entry")
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringSecretStore {
    fn get_token(&self) -> anyhow::Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => {
                debug!("Loaded API token from keyring");
                Ok(Some(token))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn set_token(&self, token: &ApiToken) -> anyhow::Result<()> {
        self.entry()?
            .set_password(token.expose())
            .context("Failed to store token in keyring")?;
        debug!("Stored API token in keyring");
        Ok(())
    }

    fn delete_token(&self) -> anyhow::Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

// ============================================================================
// credentials.json
// ============================================================================

/// On-disk shape of `credentials.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsFile {
    #[serde(default)]
    pub api_token: Option<ApiToken>,
}

impl CredentialsFile {
    /// Read `path`; a missing file yields an empty value.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize credentials")?;
        storage::write_private(path, &json)
    }

    pub fn clear(path: &Path) -> anyhow::Result<()> {
        storage::remove_if_exists(path)?;
        Ok(())
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Where the resolved token came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    Profile(ProfileName),
    CredentialsFile,
    Keyring,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "environment ({ENV_API_TOKEN})"),
            Self::Profile(name) => write!(f, "profile '{name}'"),
            Self::CredentialsFile => f.write_str("credentials file"),
            Self::Keyring => f.write_str("system keyring"),
        }
    }
}

/// The token and location a command runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: ApiToken,
    pub location_id: Option<LocationId>,
    pub source: CredentialSource,
}

/// Resolves [`Credentials`] from the configured sources
pub struct CredentialResolver {
    env: Box<dyn EnvSource>,
    secrets: Option<Box<dyn SecretStore>>,
    profiles: ProfileStore,
    credentials_path: PathBuf,
    config_location: Option<String>,
    profile_override: Option<ProfileName>,
}

impl CredentialResolver {
    /// Resolver over the process environment and the system keyring
    pub fn new(profiles: ProfileStore, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            env: Box::new(ProcessEnv),
            secrets: Some(Box::new(KeyringSecretStore::new())),
            profiles,
            credentials_path: credentials_path.into(),
            config_location: None,
            profile_override: None,
        }
    }

    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Replace the keyring, or disable it with `None`.
    pub fn with_secrets(mut self, secrets: Option<Box<dyn SecretStore>>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Default location from `config.yaml`
    pub fn with_config_location(mut self, location: Option<String>) -> Self {
        self.config_location = location;
        self
    }

    /// Use this profile instead of the active one
    pub fn with_profile(mut self, profile: Option<ProfileName>) -> Self {
        self.profile_override = profile;
        self
    }

    fn env_value(&self, key: &str) -> Option<String> {
        self.env.var(key).filter(|v| !v.trim().is_empty())
    }

    fn selected_profile(
        &self,
    ) -> Result<Option<(ProfileName, crate::profiles::Profile)>, CredentialError> {
        let storage_err = |e: anyhow::Error| CredentialError::Storage(format!("{e:#}"));
        match &self.profile_override {
            Some(name) => match self.profiles.get(name).map_err(storage_err)? {
                Some(profile) => Ok(Some((name.clone(), profile))),
                None => Err(CredentialError::UnknownProfile(name.to_string())),
            },
            None => self.profiles.active().map_err(storage_err),
        }
    }

    fn stored_token(&self) -> Result<Option<(ApiToken, CredentialSource)>, CredentialError> {
        let file = CredentialsFile::load(&self.credentials_path)
            .map_err(|e| CredentialError::Storage(format!("{e:#}")))?;
        if let Some(token) = file.api_token {
            return Ok(Some((token, CredentialSource::CredentialsFile)));
        }

        let Some(secrets) = &self.secrets else {
            return Ok(None);
        };
        match secrets.get_token() {
            Ok(Some(raw)) => {
                let token = ApiToken::new(raw).map_err(|error| CredentialError::Invalid {
                    source_name: CredentialSource::Keyring.to_string(),
                    error,
                })?;
                Ok(Some((token, CredentialSource::Keyring)))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // No secret service on headless machines is common.
                debug!(error = %e, "Keyring unavailable, skipping");
                Ok(None)
            }
        }
    }

    /// Resolve token and location.
    ///
    /// # Errors
    /// [`CredentialError::MissingToken`] when no source provides a token.
    pub fn resolve(&self) -> Result<Credentials, CredentialError> {
        let env_token = match self.env_value(ENV_API_TOKEN) {
            Some(raw) => Some(ApiToken::new(raw).map_err(|error| CredentialError::Invalid {
                source_name: CredentialSource::Environment.to_string(),
                error,
            })?),
            None => None,
        };
        let env_location = match self.env_value(ENV_LOCATION_ID) {
            Some(raw) => Some(LocationId::new(raw).map_err(|error| CredentialError::Invalid {
                source_name: format!("environment ({ENV_LOCATION_ID})"),
                error,
            })?),
            None => None,
        };

        // Profiles are only read when the environment leaves a gap.
        let profile = if env_token.is_some() && env_location.is_some() {
            None
        } else {
            self.selected_profile()?
        };

        let (token, source) = if let Some(token) = env_token {
            (token, CredentialSource::Environment)
        } else if let Some((name, p)) = &profile {
            (p.api_token.clone(), CredentialSource::Profile(name.clone()))
        } else if let Some(stored) = self.stored_token()? {
            stored
        } else {
            return Err(CredentialError::MissingToken);
        };

        let location_id = if env_location.is_some() {
            env_location
        } else if let Some(location) = profile.as_ref().and_then(|(_, p)| p.location_id.clone()) {
            Some(location)
        } else {
            match &self.config_location {
                Some(raw) => Some(LocationId::new(raw.clone()).map_err(|error| {
                    CredentialError::Invalid {
                        source_name: "config.yaml".to_string(),
                        error,
                    }
                })?),
                None => None,
            }
        };

        debug!(source = %source, has_location = location_id.is_some(), "Resolved credentials");
        Ok(Credentials {
            token,
            location_id,
            source,
        })
    }
}
