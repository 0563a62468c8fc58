//! `ghl pipelines` - opportunity pipelines and their stages

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const PIPELINE_COLUMNS: [Column; 3] = [("id", "ID"), ("name", "Name"), ("stageCount", "Stages")];

const STAGE_COLUMNS: [Column; 3] = [("position", "#"), ("id", "ID"), ("name", "Name")];

#[derive(Debug, Subcommand)]
pub enum PipelinesCommand {
    /// List pipelines
    List,
    /// Show a pipeline with its stages
    Get { pipeline_id: String },
    /// List the stages of a pipeline
    Stages { pipeline_id: String },
}

impl PipelinesCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;

        match self {
            PipelinesCommand::List => {
                let pipelines = client.pipelines().list().await?;
                let mut rows = to_rows(&pipelines)?;
                for (row, pipeline) in rows.iter_mut().zip(&pipelines) {
                    row["stageCount"] = json!(pipeline.stages.len());
                }
                out.print_list(&format!("Pipelines ({})", rows.len()), &rows, &PIPELINE_COLUMNS);
            }
            PipelinesCommand::Get { pipeline_id } => {
                let pipeline = client.pipelines().get(pipeline_id).await?;
                out.print_record(&to_record(&pipeline)?, &[("id", "ID"), ("name", "Name")]);
                let stages = to_rows(&pipeline.stages)?;
                out.print_list("Stages", &stages, &STAGE_COLUMNS);
            }
            PipelinesCommand::Stages { pipeline_id } => {
                let stages = client.pipelines().stages(pipeline_id).await?;
                let rows = to_rows(&stages)?;
                out.print_list(&format!("Stages of {pipeline_id}"), &rows, &STAGE_COLUMNS);
            }
        }
        Ok(())
    }
}
