//! `ghl tasks` - task search across the whole location

use anyhow::Result;
use clap::Subcommand;
use ghl_api::resources::{TaskSearch, TaskStatus};

use crate::context::AppContext;
use crate::output::{to_rows, Column};

const TASK_COLUMNS: [Column; 6] = [
    ("id", "ID"),
    ("title", "Title"),
    ("dueDate", "Due Date"),
    ("completed", "Completed"),
    ("contactName", "Contact"),
    ("assigneeName", "Assignee"),
];

#[derive(Debug, Subcommand)]
pub enum TasksCommand {
    /// Search tasks by assignee, status, text or contact
    Search {
        /// Assigned user ID
        #[arg(long)]
        assignee: Option<String>,
        /// pending or completed
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Text to search in titles
        #[arg(long)]
        query: Option<String>,
        /// Limit to this contact (repeatable)
        #[arg(long = "contact")]
        contacts: Vec<String>,
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(long)]
        skip: Option<u32>,
    },
}

impl TasksCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        match self {
            TasksCommand::Search {
                assignee,
                status,
                query,
                contacts,
                limit,
                skip,
            } => {
                let search = TaskSearch {
                    assignee_id: assignee.clone(),
                    status: *status,
                    query: query.clone(),
                    contact_ids: contacts.clone(),
                    limit: *limit,
                    skip: *skip,
                };
                let tasks = app.client()?.tasks().search(&search).await?;
                let rows = to_rows(&tasks)?;
                out.print_list(&format!("Tasks ({})", rows.len()), &rows, &TASK_COLUMNS);
            }
        }
        Ok(())
    }
}
