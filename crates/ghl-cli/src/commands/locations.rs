//! `ghl locations` - sub-accounts and the default location

use anyhow::Result;
use clap::Subcommand;
use ghl_core::domain::LocationId;
use tracing::info;

use super::config::store_location;
use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const LOCATION_COLUMNS: [Column; 5] = [
    ("id", "ID"),
    ("name", "Name"),
    ("city", "City"),
    ("email", "Email"),
    ("timezone", "Timezone"),
];

const LOCATION_FIELDS: [Column; 10] = [
    ("id", "ID"),
    ("name", "Name"),
    ("address", "Address"),
    ("city", "City"),
    ("state", "State"),
    ("postalCode", "Postal Code"),
    ("country", "Country"),
    ("email", "Email"),
    ("phone", "Phone"),
    ("timezone", "Timezone"),
];

#[derive(Debug, Subcommand)]
pub enum LocationsCommand {
    /// List locations the token can see (agency tokens)
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        skip: u32,
    },
    /// Show a location
    Get { location_id: String },
    /// Show the configured location
    Current,
    /// Make a location the default after checking it exists
    Switch { location_id: String },
}

impl LocationsCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;

        match self {
            LocationsCommand::List { limit, skip } => {
                let locations = client.locations().search(*limit, *skip).await?;
                let rows = to_rows(&locations)?;
                out.print_list(&format!("Locations ({})", rows.len()), &rows, &LOCATION_COLUMNS);
            }
            LocationsCommand::Get { location_id } => {
                let location = client.locations().get(location_id).await?;
                out.print_record(&to_record(&location)?, &LOCATION_FIELDS);
            }
            LocationsCommand::Current => {
                let location = client.locations().current().await?;
                out.print_record(&to_record(&location)?, &LOCATION_FIELDS);
            }
            LocationsCommand::Switch { location_id } => {
                let id = LocationId::new(location_id.as_str())?;
                let location = client.locations().get(id.as_str()).await?;
                let profile = store_location(app, &id)?;
                info!(location = %id.as_str(), profile = ?profile, "Switched location");
                out.print_result(
                    &format!("Switched to {} ({})", location.name, id.as_str()),
                    &to_record(&location)?,
                    &LOCATION_FIELDS,
                );
            }
        }
        Ok(())
    }
}
