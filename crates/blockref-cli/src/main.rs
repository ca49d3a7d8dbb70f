use anyhow::Result;
use clap::Parser;
use tracing::debug;

use blockref_cli::{
    cli::{Cli, Commands},
    commands,
    context::{self, Session},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = context::load_config(cli.config.as_deref(), cli.vault.clone())?;
    context::init_logging(context::resolve_log_level(&cli, &config));
    debug!("Vault root: {}", config.vault.root.display());

    let format = cli.format;
    if let Commands::Config = cli.command {
        return commands::config::execute(&config, format);
    }

    let session = Session::open(config)?;
    let result = match cli.command {
        Commands::Rebuild => commands::rebuild::execute(&session, format).await,
        Commands::Get { id } => commands::get::execute(&session, &id, format).await,
        Commands::Search { query } => commands::search::execute(&session, &query, format).await,
        Commands::Suggest { prefix } => {
            commands::suggest::execute(&session, &prefix, format).await
        }
        Commands::Preview { file } => commands::preview::execute(&session, &file, format).await,
        Commands::Reference { file, line } => {
            let line = usize::try_from(line)?;
            commands::reference::execute(&session, &file, line, format).await
        }
        Commands::Watch => commands::watch::execute(&session, format).await,
        Commands::Stats => commands::stats::execute(&session, format).await,
        Commands::Config => Ok(()),
    };

    // Persist whatever the command changed, even when it failed.
    let closed = session.close().await;
    result.and(closed)
}
