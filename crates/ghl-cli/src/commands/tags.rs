//! `ghl tags` - location tags

use anyhow::Result;
use clap::Subcommand;

use super::confirm;
use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const TAG_COLUMNS: [Column; 2] = [("id", "ID"), ("name", "Name")];

#[derive(Debug, Subcommand)]
pub enum TagsCommand {
    /// List tags
    List,
    /// Show a tag
    Get { tag_id: String },
    /// Create a tag
    Create { name: String },
    /// Delete a tag
    Delete {
        tag_id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

impl TagsCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;

        match self {
            TagsCommand::List => {
                let tags = client.tags().list().await?;
                let rows = to_rows(&tags)?;
                out.print_list(&format!("Tags ({})", rows.len()), &rows, &TAG_COLUMNS);
            }
            TagsCommand::Get { tag_id } => {
                let tag = client.tags().get(tag_id).await?;
                out.print_record(&to_record(&tag)?, &TAG_COLUMNS);
            }
            TagsCommand::Create { name } => {
                let tag = client.tags().create(name).await?;
                out.print_result(&format!("Tag created: {}", tag.name), &to_record(&tag)?, &TAG_COLUMNS);
            }
            TagsCommand::Delete { tag_id, yes } => {
                if !confirm(&format!("Delete tag {tag_id}?"), *yes)? {
                    out.info("Cancelled");
                    return Ok(());
                }
                client.tags().delete(tag_id).await?;
                out.success(&format!("Tag deleted: {tag_id}"));
            }
        }
        Ok(())
    }
}
