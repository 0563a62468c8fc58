//! Per-invocation state shared by every command
//!
//! Loads the config file, picks the output format, and builds an API client
//! from resolved credentials. Credential problems surface here, before any
//! network call.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ghl_api::client::{ClientContext, GhlClient};
use ghl_api::rate_limit::RateLimiter;
use ghl_api::ApiError;
use ghl_core::config::Config;
use ghl_core::credentials::{CredentialResolver, Credentials};
use ghl_core::domain::ProfileName;
use ghl_core::profiles::ProfileStore;
use ghl_core::saved_searches::SavedSearchStore;
use ghl_core::storage::StatePaths;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

pub struct AppContext {
    pub paths: StatePaths,
    pub config: Config,
    pub format: OutputFormat,
    pub profile: Option<ProfileName>,
    pub cancel: CancellationToken,
}

impl AppContext {
    /// Loads `config.yaml` (defaults when missing) and applies flag overrides.
    pub fn load(
        config_path: Option<PathBuf>,
        format: Option<OutputFormat>,
        profile: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let paths = StatePaths::with_config(config_path);
        let config = if paths.config.exists() {
            Config::load(&paths.config)?
        } else {
            Config::default()
        };
        let profile = profile
            .map(ProfileName::new)
            .transpose()
            .context("Invalid --profile")?;

        Ok(Self {
            format: format.unwrap_or(config.output.format),
            paths,
            config,
            profile,
            cancel,
        })
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format)
    }

    pub fn profiles(&self) -> ProfileStore {
        ProfileStore::new(&self.paths.profiles)
    }

    pub fn saved_searches(&self) -> SavedSearchStore {
        SavedSearchStore::new(&self.paths.saved_searches)
    }

    pub fn resolver(&self) -> CredentialResolver {
        CredentialResolver::new(self.profiles(), &self.paths.credentials)
            .with_config_location(self.config.location_id.clone())
            .with_profile(self.profile.clone())
    }

    pub fn credentials(&self) -> Result<Credentials, ApiError> {
        Ok(self.resolver().resolve()?)
    }

    /// Client scoped to the resolved token and location.
    pub fn client(&self) -> Result<GhlClient, ApiError> {
        let credentials = self.credentials()?;
        debug!(source = %credentials.source, "Resolved API credentials");
        let ctx = ClientContext::from_config(&self.config, &credentials);
        let limiter = Arc::new(RateLimiter::from_config(&self.config.rate_limiting));
        Ok(GhlClient::new(ctx)?
            .with_rate_limiter(limiter)
            .with_cancellation(self.cancel.clone()))
    }
}
