//! `ghl custom-fields` - contact field definitions and location values

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const FIELD_COLUMNS: [Column; 4] = [
    ("id", "ID"),
    ("name", "Name"),
    ("fieldKey", "Key"),
    ("dataType", "Type"),
];

const FIELD_WITH_OPTIONS: [Column; 5] = [
    ("id", "ID"),
    ("name", "Name"),
    ("fieldKey", "Key"),
    ("dataType", "Type"),
    ("optionLabels", "Options"),
];

const VALUE_COLUMNS: [Column; 4] = [
    ("id", "ID"),
    ("name", "Name"),
    ("fieldKey", "Key"),
    ("value", "Value"),
];

#[derive(Debug, Subcommand)]
pub enum CustomFieldsCommand {
    /// List contact custom fields
    List {
        /// Include the options of selection fields
        #[arg(long)]
        options: bool,
    },
    /// List location custom values
    Values,
    /// Update a location custom value
    SetValue { value_id: String, value: String },
}

impl CustomFieldsCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;

        match self {
            CustomFieldsCommand::List { options } => {
                let fields = client.custom_fields().list().await?;
                let mut rows = to_rows(&fields)?;
                if *options {
                    for (row, field) in rows.iter_mut().zip(&fields) {
                        let labels: Vec<String> = field.options().into_iter().map(|(label, _)| label).collect();
                        row["optionLabels"] = json!(labels);
                    }
                }
                let columns: &[Column] = if *options { &FIELD_WITH_OPTIONS } else { &FIELD_COLUMNS };
                out.print_list(&format!("Custom fields ({})", rows.len()), &rows, columns);
            }
            CustomFieldsCommand::Values => {
                let values = client.custom_fields().values().await?;
                let rows = to_rows(&values)?;
                out.print_list(&format!("Custom values ({})", rows.len()), &rows, &VALUE_COLUMNS);
            }
            CustomFieldsCommand::SetValue { value_id, value } => {
                let updated = client.custom_fields().set_value(value_id, value).await?;
                out.print_result(
                    &format!("Custom value {} updated", updated.name),
                    &to_record(&updated)?,
                    &VALUE_COLUMNS,
                );
            }
        }
        Ok(())
    }
}
