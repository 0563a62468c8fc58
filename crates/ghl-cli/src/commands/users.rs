//! `ghl users` - users of the location

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const USER_COLUMNS: [Column; 4] = [
    ("id", "ID"),
    ("displayName", "Name"),
    ("email", "Email"),
    ("phone", "Phone"),
];

const USER_FIELDS: [Column; 7] = [
    ("id", "ID"),
    ("displayName", "Name"),
    ("email", "Email"),
    ("phone", "Phone"),
    ("roles.type", "Type"),
    ("roles.role", "Role"),
    ("roles.locationIds", "Locations"),
];

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// List users of the location
    List,
    /// Show a user
    Get { user_id: String },
    /// Show the user that owns the token
    Me,
    /// Find users by name or email
    Search { query: String },
}

fn with_display_name(user: &ghl_api::models::User) -> Result<serde_json::Value> {
    let mut record = to_record(user)?;
    record["displayName"] = json!(user.display_name());
    Ok(record)
}

impl UsersCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;

        match self {
            UsersCommand::List | UsersCommand::Search { .. } => {
                let users = match self {
                    UsersCommand::Search { query } => client.users().search(query).await?,
                    _ => client.users().list().await?,
                };
                let rows = users.iter().map(with_display_name).collect::<Result<Vec<_>>>()?;
                out.print_list(&format!("Users ({})", rows.len()), &rows, &USER_COLUMNS);
            }
            UsersCommand::Get { user_id } => {
                let user = client.users().get(user_id).await?;
                out.print_record(&with_display_name(&user)?, &USER_FIELDS);
            }
            UsersCommand::Me => {
                let user = client.users().me().await?;
                out.print_record(&with_display_name(&user)?, &USER_FIELDS);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ghl_api::models::User;

    use super::*;

    #[test]
    fn test_display_name_added_to_record() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "roles": {"type": "account", "role": "admin"}
        }))
        .unwrap();
        let record = with_display_name(&user).unwrap();

        assert_eq!(record["displayName"], "Ada Lovelace");
        assert_eq!(crate::output::cell(&record, "roles.role"), "admin");
    }
}
