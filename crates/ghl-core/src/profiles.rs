//! Named profiles (`profiles.json`).
//!
//! A profile pairs an API token with an optional location id. At most one
//! profile is active; the credential resolver uses it when no environment
//! variable overrides the token.
//!
//! ```json
//! { "active": "work", "profiles": { "work": { "api_token": "pit-…", "location_id": "abc" } } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{ApiToken, DomainError, LocationId, ProfileName};
use crate::storage;

/// A single stored profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub api_token: ApiToken,
    #[serde(default)]
    pub location_id: Option<LocationId>,
}

/// On-disk shape of `profiles.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilesFile {
    #[serde(default)]
    pub active: Option<ProfileName>,
    #[serde(default)]
    pub profiles: BTreeMap<ProfileName, Profile>,
}

/// One row of `ghl config profiles list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub name: ProfileName,
    pub location_id: Option<LocationId>,
    /// Masked token, safe to print
    pub token: String,
    pub active: bool,
}

/// File-backed profile store.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file; a missing file is an empty store.
    pub fn load(&self) -> anyhow::Result<ProfilesFile> {
        if !self.path.exists() {
            return Ok(ProfilesFile::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(ProfilesFile::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn save(&self, file: &ProfilesFile) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(file).context("failed to serialize profiles")?;
        storage::write_private(&self.path, &json)
    }

    /// All profiles, sorted by name, with the active one flagged.
    pub fn list(&self) -> anyhow::Result<Vec<ProfileSummary>> {
        let file = self.load()?;
        Ok(file
            .profiles
            .iter()
            .map(|(name, profile)| ProfileSummary {
                name: name.clone(),
                location_id: profile.location_id.clone(),
                token: profile.api_token.masked(),
                active: file.active.as_ref() == Some(name),
            })
            .collect())
    }

    pub fn get(&self, name: &ProfileName) -> anyhow::Result<Option<Profile>> {
        Ok(self.load()?.profiles.remove(name))
    }

    /// The active profile, if one is set and still exists.
    pub fn active(&self) -> anyhow::Result<Option<(ProfileName, Profile)>> {
        let mut file = self.load()?;
        let Some(name) = file.active.take() else {
            return Ok(None);
        };
        Ok(file.profiles.remove(&name).map(|profile| (name, profile)))
    }

    /// Add a profile or replace an existing one.
    ///
    /// The profile becomes active when no other profile is.
    pub fn upsert(&self, name: ProfileName, profile: Profile) -> anyhow::Result<()> {
        let mut file = self.load()?;
        let existed = file.profiles.insert(name.clone(), profile).is_some();
        let has_active = file
            .active
            .as_ref()
            .is_some_and(|active| file.profiles.contains_key(active));
        if !has_active {
            file.active = Some(name.clone());
        }
        self.save(&file)?;
        info!(profile = %name, updated = existed, "Saved profile");
        Ok(())
    }

    /// Make `name` the active profile.
    pub fn use_profile(&self, name: &ProfileName) -> anyhow::Result<()> {
        let mut file = self.load()?;
        if !file.profiles.contains_key(name) {
            return Err(DomainError::ProfileNotFound(name.to_string()).into());
        }
        file.active = Some(name.clone());
        self.save(&file)?;
        info!(profile = %name, "Switched active profile");
        Ok(())
    }

    /// Remove `name`. Returns `false` if it did not exist.
    ///
    /// When the active profile is removed, the first remaining profile (by
    /// name) becomes active.
    pub fn remove(&self, name: &ProfileName) -> anyhow::Result<bool> {
        let mut file = self.load()?;
        if file.profiles.remove(name).is_none() {
            return Ok(false);
        }
        if file.active.as_ref() == Some(name) {
            file.active = file.profiles.keys().next().cloned();
            debug!(active = ?file.active, "Active profile removed, falling back");
        }
        self.save(&file)?;
        Ok(true)
    }

    /// Update the location of the active profile.
    ///
    /// Returns the profile name when one was active.
    pub fn set_active_location(
        &self,
        location: Option<LocationId>,
    ) -> anyhow::Result<Option<ProfileName>> {
        self.update_active(|profile| profile.location_id = location)
    }

    /// Replace the token of the active profile.
    ///
    /// Returns the profile name when one was active.
    pub fn set_active_token(&self, token: ApiToken) -> anyhow::Result<Option<ProfileName>> {
        self.update_active(|profile| profile.api_token = token)
    }

    fn update_active(&self, apply: impl FnOnce(&mut Profile)) -> anyhow::Result<Option<ProfileName>> {
        let mut file = self.load()?;
        let Some(name) = file.active.clone() else {
            return Ok(None);
        };
        let Some(profile) = file.profiles.get_mut(&name) else {
            return Ok(None);
        };
        apply(profile);
        self.save(&file)?;
        Ok(Some(name))
    }

    /// Delete every profile.
    pub fn clear(&self) -> anyhow::Result<()> {
        storage::remove_if_exists(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.json"));
        (dir, store)
    }

    fn name(s: &str) -> ProfileName {
        ProfileName::new(s).unwrap()
    }

    fn profile(token: &str, location: Option<&str>) -> Profile {
        Profile {
            api_token: ApiToken::new(token).unwrap(),
            location_id: location.map(|l| LocationId::new(l).unwrap()),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
        assert!(store.active().unwrap().is_none());
    }

    #[test]
    fn test_first_profile_becomes_active() {
        let (_dir, store) = store();
        store.upsert(name("work"), profile("pit-work", Some("locA"))).unwrap();
        store.upsert(name("home"), profile("pit-home", None)).unwrap();

        let (active, p) = store.active().unwrap().unwrap();
        assert_eq!(active.as_str(), "work");
        assert_eq!(p.api_token.expose(), "pit-work");
    }

    #[test]
    fn test_list_is_sorted_with_active_flag() {
        let (_dir, store) = store();
        store.upsert(name("zeta"), profile("pit-z", None)).unwrap();
        store.upsert(name("alpha"), profile("pit-a", None)).unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name.as_str(), "alpha");
        assert!(!list[0].active);
        assert_eq!(list[1].name.as_str(), "zeta");
        assert!(list[1].active);
        assert_eq!(list[1].token, "pit-z…");
    }

    #[test]
    fn test_upsert_replaces_existing_profile() {
        let (_dir, store) = store();
        store.upsert(name("work"), profile("pit-old", None)).unwrap();
        store.upsert(name("work"), profile("pit-new", Some("locB"))).unwrap();

        let p = store.get(&name("work")).unwrap().unwrap();
        assert_eq!(p.api_token.expose(), "pit-new");
        assert_eq!(p.location_id.unwrap().as_str(), "locB");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_use_profile_switches_and_rejects_unknown() {
        let (_dir, store) = store();
        store.upsert(name("work"), profile("pit-w", None)).unwrap();
        store.upsert(name("home"), profile("pit-h", None)).unwrap();

        store.use_profile(&name("home")).unwrap();
        assert_eq!(store.active().unwrap().unwrap().0.as_str(), "home");

        let err = store.use_profile(&name("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert_eq!(store.active().unwrap().unwrap().0.as_str(), "home");
    }

    #[test]
    fn test_remove_active_falls_back_to_first_remaining() {
        let (_dir, store) = store();
        store.upsert(name("work"), profile("pit-w", None)).unwrap();
        store.upsert(name("beta"), profile("pit-b", None)).unwrap();
        store.upsert(name("gamma"), profile("pit-g", None)).unwrap();

        assert!(store.remove(&name("work")).unwrap());
        assert_eq!(store.active().unwrap().unwrap().0.as_str(), "beta");

        assert!(!store.remove(&name("work")).unwrap());
    }

    #[test]
    fn test_remove_last_profile_clears_active() {
        let (_dir, store) = store();
        store.upsert(name("only"), profile("pit-o", None)).unwrap();
        store.remove(&name("only")).unwrap();

        let file = store.load().unwrap();
        assert!(file.active.is_none());
        assert!(file.profiles.is_empty());
    }

    #[test]
    fn test_set_active_location_updates_active_profile() {
        let (_dir, store) = store();
        assert!(store
            .set_active_location(Some(LocationId::new("x").unwrap()))
            .unwrap()
            .is_none());

        store.upsert(name("work"), profile("pit-w", None)).unwrap();
        let updated = store
            .set_active_location(Some(LocationId::new("locZ").unwrap()))
            .unwrap();

        assert_eq!(updated.unwrap().as_str(), "work");
        let p = store.get(&name("work")).unwrap().unwrap();
        assert_eq!(p.location_id.unwrap().as_str(), "locZ");
    }

    #[test]
    fn test_set_active_token_keeps_location() {
        let (_dir, store) = store();
        assert!(store.set_active_token(ApiToken::new("pit-x").unwrap()).unwrap().is_none());

        store.upsert(name("work"), profile("pit-old", Some("locW"))).unwrap();
        let updated = store.set_active_token(ApiToken::new("pit-new").unwrap()).unwrap();

        assert_eq!(updated.unwrap().as_str(), "work");
        let p = store.get(&name("work")).unwrap().unwrap();
        assert_eq!(p.api_token.expose(), "pit-new");
        assert_eq!(p.location_id.unwrap().as_str(), "locW");
    }

    #[test]
    fn test_clear_removes_everything() {
        let (_dir, store) = store();
        store.upsert(name("work"), profile("pit-w", None)).unwrap();
        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
        store.clear().unwrap();
    }

    #[test]
    fn test_file_format_is_stable() {
        let (_dir, store) = store();
        store.upsert(name("work"), profile("pit-w", Some("loc1"))).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["active"], "work");
        assert_eq!(raw["profiles"]["work"]["api_token"], "pit-w");
        assert_eq!(raw["profiles"]["work"]["location_id"], "loc1");
    }
}
