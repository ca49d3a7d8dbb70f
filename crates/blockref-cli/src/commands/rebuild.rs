use anyhow::Result;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::context::Session;
use crate::output;

pub async fn execute(session: &Session, format: OutputFormat) -> Result<()> {
    let blocks = session.index.rebuild().await?;
    let files = session.index.stats().files;

    match format {
        OutputFormat::Json => output::print_json(&json!({ "blocks": blocks, "files": files }))?,
        OutputFormat::Text => println!("Indexed {blocks} blocks in {files} files"),
    }
    Ok(())
}
