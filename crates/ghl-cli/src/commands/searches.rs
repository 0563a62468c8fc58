//! `ghl searches` - named contact searches stored locally

use anyhow::{bail, Result};
use clap::Subcommand;
use ghl_api::resources::ContactSearch;
use ghl_core::saved_searches::SavedSearch;

use super::confirm;
use super::contacts::CONTACT_COLUMNS;
use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const SEARCH_COLUMNS: [Column; 5] = [
    ("id", "ID"),
    ("name", "Name"),
    ("query", "Query"),
    ("tags", "Tags"),
    ("assignedTo", "Assigned To"),
];

#[derive(Debug, Subcommand)]
pub enum SearchesCommand {
    /// List saved searches
    List,
    /// Save a contact search under a name
    Save {
        name: String,
        #[arg(long)]
        query: Option<String>,
        /// Required tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        assigned_to: Option<String>,
    },
    /// Show a saved search (by id or name)
    Show { search: String },
    /// Run a saved search (by id or name)
    Run {
        search: String,
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
    /// Delete a saved search (by id or name)
    Delete {
        search: String,
        #[arg(short, long)]
        yes: bool,
    },
}

fn find(app: &AppContext, key: &str) -> Result<SavedSearch> {
    match app.saved_searches().get(key) {
        Some(search) => Ok(search),
        None => bail!("Saved search '{key}' not found"),
    }
}

/// API filters for a stored search.
fn to_contact_search(search: &SavedSearch, limit: u32) -> ContactSearch {
    ContactSearch {
        page_limit: limit,
        query: search.query.clone(),
        tags: search.tags.clone(),
        assigned_to: search.assigned_to.clone(),
        ..ContactSearch::default()
    }
}

impl SearchesCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let store = app.saved_searches();

        match self {
            SearchesCommand::List => {
                let rows = to_rows(&store.list())?;
                out.print_list(&format!("Saved searches ({})", rows.len()), &rows, &SEARCH_COLUMNS);
            }
            SearchesCommand::Save {
                name,
                query,
                tags,
                assigned_to,
            } => {
                if query.is_none() && tags.is_empty() && assigned_to.is_none() {
                    bail!("A saved search needs --query, --tag or --assigned-to");
                }
                let saved = store.save(
                    SavedSearch::new(name.as_str())
                        .with_query(query.clone())
                        .with_tags(tags.clone())
                        .with_assigned_to(assigned_to.clone()),
                )?;
                out.print_result(
                    &format!("Saved search '{}' ({})", saved.name, saved.id),
                    &to_record(&saved)?,
                    &SEARCH_COLUMNS,
                );
            }
            SearchesCommand::Show { search } => {
                let saved = find(app, search)?;
                out.print_record(&to_record(&saved)?, &SEARCH_COLUMNS);
            }
            SearchesCommand::Run { search, limit } => {
                let saved = find(app, search)?;
                let contacts = app
                    .client()?
                    .contacts()
                    .search(&to_contact_search(&saved, *limit))
                    .await?;
                let rows = to_rows(&contacts)?;
                out.print_list(&format!("{} ({})", saved.name, rows.len()), &rows, &CONTACT_COLUMNS);
            }
            SearchesCommand::Delete { search, yes } => {
                let saved = find(app, search)?;
                if !confirm(&format!("Delete saved search '{}'?", saved.name), *yes)? {
                    out.info("Cancelled");
                    return Ok(());
                }
                store.delete(&saved.id)?;
                out.success(&format!("Saved search deleted: {}", saved.name));
            }
        }
        Ok(())
    }
}
