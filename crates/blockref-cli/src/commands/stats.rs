use anyhow::Result;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::context::Session;
use crate::output;

pub async fn execute(session: &Session, format: OutputFormat) -> Result<()> {
    let outcome = session.initialize().await?;
    let stats = session.index.stats();
    let cache = session.config.cache_path();

    match format {
        OutputFormat::Json => output::print_json(&json!({
            "vault": session.vault.root(),
            "cache": cache,
            "loaded_from": outcome.source,
            "index": stats,
        }))?,
        OutputFormat::Text => {
            println!("Vault: {}", session.vault.root().display());
            println!("Cache: {}", cache.display());
            println!("Loaded from: {:?}\n", outcome.source);
            print!("{}", output::format_stats(&stats));
        }
    }
    Ok(())
}
