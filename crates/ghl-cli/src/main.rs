//! ghl - command-line client for the GoHighLevel v2 API
//!
//! Provides commands for:
//! - Contacts, their tags, notes and tasks
//! - Opportunities, pipelines and stages
//! - Calendars, appointments and conversations
//! - Users, locations, workflows, tags and custom fields
//! - Credentials, profiles and saved searches

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use ghl_api::ApiError;
use ghl_core::config::Config;
use ghl_core::storage::StatePaths;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    calendars::CalendarsCommand, completions::CompletionsCommand, config::ConfigCommand,
    contacts::ContactsCommand, conversations::ConversationsCommand,
    custom_fields::CustomFieldsCommand, locations::LocationsCommand,
    opportunities::OpportunitiesCommand, pipelines::PipelinesCommand,
    searches::SearchesCommand, tags::TagsCommand, tasks::TasksCommand, users::UsersCommand,
    workflows::WorkflowsCommand,
};
use context::AppContext;
use output::{get_formatter, OutputFormat};

/// Exit status after Ctrl-C, as a shell reports SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "ghl", version, about = "GoHighLevel CRM from the command line")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true, conflicts_with_all = ["csv", "quiet"])]
    json: bool,

    /// Output lists as CSV
    #[arg(long, global = true, conflicts_with = "quiet")]
    csv: bool,

    /// Print only record ids
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use this profile instead of the active one
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Format picked by flags; `None` defers to `output.format`.
    pub fn output_format(&self) -> Option<OutputFormat> {
        if self.json {
            Some(OutputFormat::Json)
        } else if self.csv {
            Some(OutputFormat::Csv)
        } else if self.quiet {
            Some(OutputFormat::Quiet)
        } else {
            None
        }
    }

    /// `RUST_LOG` wins, then `-v`, then `logging.level` from the config.
    fn log_filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let level = match self.verbose {
            0 => {
                let path = StatePaths::with_config(self.config.clone()).config;
                Config::load_or_default(&path).logging.level
            }
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        EnvFilter::new(level)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Credentials, profiles and settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage contacts
    #[command(subcommand)]
    Contacts(ContactsCommand),
    /// Search tasks across the location
    #[command(subcommand)]
    Tasks(TasksCommand),
    /// Manage opportunities
    #[command(subcommand)]
    Opportunities(OpportunitiesCommand),
    /// View pipelines and stages
    #[command(subcommand)]
    Pipelines(PipelinesCommand),
    /// View users
    #[command(subcommand)]
    Users(UsersCommand),
    /// View and switch locations
    #[command(subcommand)]
    Locations(LocationsCommand),
    /// Calendars and appointments
    #[command(subcommand)]
    Calendars(CalendarsCommand),
    /// Conversations and messages
    #[command(subcommand)]
    Conversations(ConversationsCommand),
    /// Workflows and enrollment
    #[command(subcommand)]
    Workflows(WorkflowsCommand),
    /// Location tags
    #[command(subcommand)]
    Tags(TagsCommand),
    /// Custom fields and custom values
    #[command(subcommand)]
    CustomFields(CustomFieldsCommand),
    /// Saved contact searches
    #[command(subcommand)]
    Searches(SearchesCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Commands {
    async fn execute(&self, app: &AppContext) -> anyhow::Result<()> {
        match self {
            Commands::Config(cmd) => cmd.execute(app).await,
            Commands::Contacts(cmd) => cmd.execute(app).await,
            Commands::Tasks(cmd) => cmd.execute(app).await,
            Commands::Opportunities(cmd) => cmd.execute(app).await,
            Commands::Pipelines(cmd) => cmd.execute(app).await,
            Commands::Users(cmd) => cmd.execute(app).await,
            Commands::Locations(cmd) => cmd.execute(app).await,
            Commands::Calendars(cmd) => cmd.execute(app).await,
            Commands::Conversations(cmd) => cmd.execute(app).await,
            Commands::Workflows(cmd) => cmd.execute(app).await,
            Commands::Tags(cmd) => cmd.execute(app).await,
            Commands::CustomFields(cmd) => cmd.execute(app).await,
            Commands::Searches(cmd) => cmd.execute(app).await,
            Commands::Completions(cmd) => cmd.execute(),
        }
    }
}

/// 130 when the operation was interrupted, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ApiError>() {
        Some(api) if api.is_interrupted() => EXIT_INTERRUPTED,
        _ => 1,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received");
            on_interrupt.cancel();
        }
    });

    let format = cli.output_format();
    let app = match AppContext::load(cli.config.clone(), format, cli.profile.as_deref(), cancel) {
        Ok(app) => app,
        Err(e) => {
            get_formatter(format.unwrap_or_default()).error(&format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };

    match cli.command.execute(&app).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let formatter = app.formatter();
            formatter.error(&format!("{e:#}"));
            if let Some(ApiError::UnknownOutcome { .. }) = e.downcast_ref::<ApiError>() {
                formatter.warn("The change may or may not have been applied; check before retrying");
            }
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_flags() {
        let cli = Cli::try_parse_from(["ghl", "--csv", "users", "list"]).unwrap();
        assert_eq!(cli.output_format(), Some(OutputFormat::Csv));

        let cli = Cli::try_parse_from(["ghl", "users", "list"]).unwrap();
        assert_eq!(cli.output_format(), None);

        assert!(Cli::try_parse_from(["ghl", "--json", "--quiet", "users", "list"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&ApiError::Cancelled.into()), EXIT_INTERRUPTED);
        let unknown = ApiError::UnknownOutcome {
            method: "POST".into(),
            path: "/contacts/".into(),
        };
        assert_eq!(exit_code(&unknown.into()), EXIT_INTERRUPTED);
        assert_eq!(exit_code(&ApiError::RateLimitExceeded { attempts: 5 }.into()), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("bad input")), 1);
    }

    #[test]
    fn test_interrupt_survives_context() {
        use anyhow::Context;
        let err = Err::<(), _>(ApiError::Cancelled)
            .context("Listing contacts")
            .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_INTERRUPTED);
    }
}
