mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the security gate server
    Run,
    /// Create a password hash
    Hash {
        /// Password to hash; read from stdin when omitted
        password: Option<String>,
    },
    /// Validate the environment configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Run => commands::run::command().await,
        Commands::Hash { password } => commands::hash::command(password.as_deref()).await,
        Commands::Check => commands::check::command().await,
    }
}
