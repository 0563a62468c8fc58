//! Saved contact searches (`saved_searches.json`).
//!
//! A saved search is a named set of contact filters that can be re-run with
//! `ghl searches run <id|name>`. The file is a plain JSON array; a missing
//! or unreadable file is treated as empty so a corrupt file never blocks
//! the CLI.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::storage;

/// Stored contact search filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl SavedSearch {
    /// A new search without an id; one is assigned on save.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            tags: Vec::new(),
            assigned_to: None,
            query: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_assigned_to(mut self, user_id: Option<String>) -> Self {
        self.assigned_to = user_id;
        self
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }
}

/// File-backed saved search store
#[derive(Debug, Clone)]
pub struct SavedSearchStore {
    path: PathBuf,
}

impl SavedSearchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All saved searches, in stored order.
    pub fn list(&self) -> Vec<SavedSearch> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(searches) => searches,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt saved searches file");
                Vec::new()
            }
        }
    }

    fn write(&self, searches: &[SavedSearch]) -> anyhow::Result<()> {
        let json =
            serde_json::to_string_pretty(searches).context("failed to serialize saved searches")?;
        storage::write_private(&self.path, &json)
    }

    /// Insert or replace (by id) a search and return the stored value.
    ///
    /// The name is trimmed, an empty query is stored as `null`, and a search
    /// without an id gets a fresh UUID.
    pub fn save(&self, search: SavedSearch) -> anyhow::Result<SavedSearch> {
        let name = search.name.trim().to_string();
        if name.is_empty() {
            anyhow::bail!("saved search name cannot be empty");
        }
        let normalized = SavedSearch {
            id: if search.id.trim().is_empty() {
                Uuid::new_v4().to_string()
            } else {
                search.id
            },
            name,
            tags: search
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            assigned_to: search.assigned_to.filter(|a| !a.trim().is_empty()),
            query: search.query.filter(|q| !q.trim().is_empty()),
        };

        let mut searches = self.list();
        match searches.iter_mut().find(|s| s.id == normalized.id) {
            Some(existing) => *existing = normalized.clone(),
            None => searches.push(normalized.clone()),
        }
        self.write(&searches)?;
        Ok(normalized)
    }

    /// Look up by id, then by exact name.
    pub fn get(&self, key: &str) -> Option<SavedSearch> {
        let searches = self.list();
        searches
            .iter()
            .find(|s| s.id == key)
            .or_else(|| searches.iter().find(|s| s.name == key))
            .cloned()
    }

    /// Delete by id. Returns whether a search was removed.
    pub fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let mut searches = self.list();
        let before = searches.len();
        searches.retain(|s| s.id != id);
        if searches.len() == before {
            return Ok(false);
        }
        self.write(&searches)?;
        Ok(true)
    }
}
