//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for the values the CLI persists locally.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// ApiToken
// ============================================================================

/// A GoHighLevel private integration token
///
/// Never printed in full: `Debug` and `Display` only show a short prefix so
/// tokens do not leak into logs or `config show` output.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiToken(String);

impl ApiToken {
    /// Create a new ApiToken, trimming surrounding whitespace
    ///
    /// # Errors
    /// Returns error if the token is empty or contains inner whitespace
    pub fn new(token: impl Into<String>) -> Result<Self, DomainError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(DomainError::InvalidToken(
                "token cannot be empty".to_string(),
            ));
        }
        if token.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidToken(
                "token cannot contain whitespace".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// The raw token, for the `Authorization` header only
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form, e.g. `pit-1234…`
    #[must_use]
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(8).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiToken").field(&self.masked()).finish()
    }
}

impl Display for ApiToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl FromStr for ApiToken {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ApiToken {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ApiToken> for String {
    fn from(token: ApiToken) -> Self {
        token.0
    }
}

// ============================================================================
// LocationId
// ============================================================================

/// Location (sub-account) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationId(String);

impl LocationId {
    /// Create a new LocationId
    ///
    /// # Errors
    /// Returns error if the id is empty or contains characters that cannot
    /// appear in a path segment
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(DomainError::InvalidLocationId(
                "location ID cannot be empty".to_string(),
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidLocationId(format!(
                "location ID contains invalid characters: {id}"
            )));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LocationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LocationId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<LocationId> for String {
    fn from(id: LocationId) -> Self {
        id.0
    }
}

// ============================================================================
// ProfileName
// ============================================================================

/// Name of a stored profile
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileName(String);

impl ProfileName {
    /// Maximum profile name length
    const MAX_LEN: usize = 64;

    /// Create a new ProfileName
    ///
    /// # Errors
    /// Returns error if the name is empty, too long or contains whitespace
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidProfileName(
                "profile name cannot be empty".to_string(),
            ));
        }
        if name.len() > Self::MAX_LEN {
            return Err(DomainError::InvalidProfileName(format!(
                "profile name exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidProfileName(format!(
                "profile name cannot contain whitespace: {name}"
            )));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProfileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProfileName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ProfileName> for String {
    fn from(name: ProfileName) -> Self {
        name.0
    }
}
