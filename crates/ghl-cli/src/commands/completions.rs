//! `ghl completions <shell>` - shell completion scripts on stdout

use std::io;

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::Shell;

#[derive(Debug, Args)]
pub struct CompletionsCommand {
    /// bash, zsh, fish, elvish or powershell
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub fn execute(&self) -> Result<()> {
        clap_complete::generate(self.shell, &mut crate::Cli::command(), "ghl", &mut io::stdout());
        Ok(())
    }
}
