use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use currenz::cli::setup::setup;
use currenz::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for currenz::AppCommand {
    fn from(cmd: Commands) -> currenz::AppCommand {
        match cmd {
            Commands::Chat {
                user_id,
                name,
                username,
            } => currenz::AppCommand::Chat {
                user_id,
                name,
                username,
            },
            Commands::Serve => currenz::AppCommand::Serve,
            Commands::Report { month } => currenz::AppCommand::Report { month },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Talk to the bot from the terminal
    Chat {
        /// User id the conversation is recorded under
        #[arg(long, default_value_t = 1)]
        user_id: i64,
        /// First name used in greetings
        #[arg(long)]
        name: Option<String>,
        /// Username recorded with the conversation
        #[arg(long)]
        username: Option<String>,
    },
    /// Run the reporting HTTP endpoint
    Serve,
    /// Print usage analytics
    Report {
        /// Month to report on, as YYYY-MM (defaults to the current month)
        #[arg(long)]
        month: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => currenz::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
