//! CLI interface for devlog.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod extensions;
pub mod report;

/// devlog: turns git history into a written development report.
#[derive(Parser)]
#[command(name = "devlog")]
#[command(about = "Turns git history into AI-written development reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Generates a report for one repository.
    Report(report::ReportCommand),
    /// Lists available AI providers.
    Providers(extensions::ProvidersCommand),
    /// Lists plugins in dispatch order.
    Plugins(extensions::PluginsCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Report(report_cmd) => report_cmd.execute().await,
            Commands::Providers(providers_cmd) => providers_cmd.execute(),
            Commands::Plugins(plugins_cmd) => plugins_cmd.execute(),
        }
    }
}
