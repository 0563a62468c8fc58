//! Subcommands of the `ghl` binary, one module per resource

pub mod calendars;
pub mod completions;
pub mod config;
pub mod contacts;
pub mod conversations;
pub mod custom_fields;
pub mod locations;
pub mod opportunities;
pub mod pipelines;
pub mod searches;
pub mod tags;
pub mod tasks;
pub mod users;
pub mod workflows;

use std::io::IsTerminal;

use anyhow::{bail, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;

/// Asks before a destructive action unless `--yes` was given.
///
/// Without a terminal there is nobody to ask, so `--yes` is required.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        bail!("{prompt} Refusing without a terminal; pass --yes to confirm");
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false))
}
