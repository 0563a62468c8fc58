//! `ghl workflows` - automation workflows and contact enrollment

use anyhow::Result;
use clap::Subcommand;

use crate::context::AppContext;
use crate::output::{to_rows, Column};

const WORKFLOW_COLUMNS: [Column; 4] = [
    ("id", "ID"),
    ("name", "Name"),
    ("status", "Status"),
    ("updatedAt", "Updated"),
];

#[derive(Debug, Subcommand)]
pub enum WorkflowsCommand {
    /// List workflows
    List,
    /// Add a contact to a workflow
    Enroll {
        contact_id: String,
        workflow_id: String,
    },
    /// Remove a contact from a workflow
    Unenroll {
        contact_id: String,
        workflow_id: String,
    },
}

impl WorkflowsCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;

        match self {
            WorkflowsCommand::List => {
                let workflows = client.workflows().list().await?;
                let rows = to_rows(&workflows)?;
                out.print_list(&format!("Workflows ({})", rows.len()), &rows, &WORKFLOW_COLUMNS);
            }
            WorkflowsCommand::Enroll {
                contact_id,
                workflow_id,
            } => {
                client.workflows().enroll(contact_id, workflow_id).await?;
                out.success(&format!("Contact {contact_id} enrolled in workflow {workflow_id}"));
            }
            WorkflowsCommand::Unenroll {
                contact_id,
                workflow_id,
            } => {
                client.workflows().unenroll(contact_id, workflow_id).await?;
                out.success(&format!("Contact {contact_id} removed from workflow {workflow_id}"));
            }
        }
        Ok(())
    }
}
