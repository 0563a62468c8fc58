//! GHL Core - local state and credential resolution
//!
//! This crate holds everything the CLI persists or resolves before a single
//! request is sent:
//! - **Configuration** - `config.yaml` with API, retry and rate limit settings
//! - **Profiles** - named token + location pairs with an active selection
//! - **Credentials** - precedence-ordered resolution of token and location
//! - **Saved searches** - stored contact search filters
//! - **Domain newtypes** - validated tokens, location ids and profile names
//!
//! Nothing here talks to the network. The request engine in `ghl-api` only
//! receives the already-resolved [`credentials::Credentials`].

pub mod config;
pub mod credentials;
pub mod domain;
pub mod profiles;
pub mod saved_searches;
pub mod storage;
