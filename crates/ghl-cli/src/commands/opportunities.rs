//! `ghl opportunities` - deals in pipelines

use anyhow::{bail, Result};
use clap::Subcommand;
use ghl_api::resources::{NewOpportunity, OpportunityFilter, OpportunityUpdate};

use super::confirm;
use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const OPPORTUNITY_COLUMNS: [Column; 6] = [
    ("id", "ID"),
    ("name", "Name"),
    ("status", "Status"),
    ("monetaryValue", "Value"),
    ("pipelineStageId", "Stage"),
    ("contactId", "Contact"),
];

const OPPORTUNITY_FIELDS: [Column; 10] = [
    ("id", "ID"),
    ("name", "Name"),
    ("status", "Status"),
    ("monetaryValue", "Value"),
    ("pipelineId", "Pipeline"),
    ("pipelineStageId", "Stage"),
    ("contactId", "Contact"),
    ("source", "Source"),
    ("createdAt", "Created"),
    ("updatedAt", "Updated"),
];

#[derive(Debug, Subcommand)]
pub enum OpportunitiesCommand {
    /// List opportunities, filtered locally
    List {
        #[arg(short, long)]
        pipeline: Option<String>,
        #[arg(short, long)]
        stage: Option<String>,
        /// open, won, lost or abandoned
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Fetch every page before filtering
        #[arg(long)]
        all: bool,
    },
    /// Show an opportunity
    Get { opportunity_id: String },
    /// Create an opportunity
    Create {
        #[arg(long)]
        contact: String,
        #[arg(short, long)]
        pipeline: String,
        #[arg(short, long)]
        stage: String,
        #[arg(short, long)]
        name: String,
        /// Monetary value
        #[arg(long)]
        value: Option<f64>,
        #[arg(long, default_value = "open")]
        status: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Update an opportunity
    Update {
        opportunity_id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Move an opportunity to another stage
    Move {
        opportunity_id: String,
        #[arg(short, long)]
        stage: String,
    },
    /// Delete an opportunity
    Delete {
        opportunity_id: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Mark an opportunity as won
    Won { opportunity_id: String },
    /// Mark an opportunity as lost
    Lost { opportunity_id: String },
}

impl OpportunitiesCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;
        let opportunities = client.opportunities();

        match self {
            OpportunitiesCommand::List {
                pipeline,
                stage,
                status,
                contact,
                limit,
                skip,
                all,
            } => {
                let filter = OpportunityFilter {
                    contact_id: contact.clone(),
                    pipeline_id: pipeline.clone(),
                    stage_id: stage.clone(),
                    status: status.clone(),
                    limit: *limit,
                    skip: *skip,
                    all: *all,
                };
                let found = opportunities.search(&filter).await?;
                let rows = to_rows(&found)?;
                out.print_list(&format!("Opportunities ({})", rows.len()), &rows, &OPPORTUNITY_COLUMNS);
            }

            OpportunitiesCommand::Get { opportunity_id } => {
                let opportunity = opportunities.get(opportunity_id).await?;
                out.print_record(&to_record(&opportunity)?, &OPPORTUNITY_FIELDS);
            }

            OpportunitiesCommand::Create {
                contact,
                pipeline,
                stage,
                name,
                value,
                status,
                source,
            } => {
                let created = opportunities
                    .create(&NewOpportunity {
                        contact_id: contact.clone(),
                        pipeline_id: pipeline.clone(),
                        stage_id: stage.clone(),
                        name: name.clone(),
                        status: status.clone(),
                        monetary_value: *value,
                        source: source.clone(),
                    })
                    .await?;
                out.print_result(
                    &format!("Opportunity created: {}", created.id),
                    &to_record(&created)?,
                    &OPPORTUNITY_FIELDS,
                );
            }

            OpportunitiesCommand::Update {
                opportunity_id,
                name,
                value,
                status,
                source,
            } => {
                let update = OpportunityUpdate {
                    name: name.clone(),
                    monetary_value: *value,
                    status: status.clone(),
                    source: source.clone(),
                };
                if update == OpportunityUpdate::default() {
                    bail!("No fields to update. Specify at least one option.");
                }
                let updated = opportunities.update(opportunity_id, &update).await?;
                out.print_result(
                    &format!("Opportunity updated: {opportunity_id}"),
                    &to_record(&updated)?,
                    &OPPORTUNITY_FIELDS,
                );
            }

            OpportunitiesCommand::Move { opportunity_id, stage } => {
                let moved = opportunities.move_stage(opportunity_id, stage).await?;
                out.print_result(
                    &format!("Opportunity {opportunity_id} moved to stage {stage}"),
                    &to_record(&moved)?,
                    &OPPORTUNITY_FIELDS,
                );
            }

            OpportunitiesCommand::Delete { opportunity_id, yes } => {
                if !confirm(&format!("Delete opportunity {opportunity_id}?"), *yes)? {
                    out.info("Cancelled");
                    return Ok(());
                }
                opportunities.delete(opportunity_id).await?;
                out.success(&format!("Opportunity deleted: {opportunity_id}"));
            }

            OpportunitiesCommand::Won { opportunity_id } => {
                opportunities.mark_won(opportunity_id).await?;
                out.success(&format!("Opportunity {opportunity_id} marked as won"));
            }

            OpportunitiesCommand::Lost { opportunity_id } => {
                opportunities.mark_lost(opportunity_id).await?;
                out.success(&format!("Opportunity {opportunity_id} marked as lost"));
            }
        }
        Ok(())
    }
}
