use anyhow::{bail, Result};
use blockref_core::BlockEntry;

use crate::cli::OutputFormat;
use crate::context::Session;
use crate::output;

pub async fn execute(session: &Session, id: &str, format: OutputFormat) -> Result<()> {
    session.initialize().await?;
    let Some(block) = session.index.get_block(id) else {
        bail!("Block not found: {id}");
    };

    match format {
        OutputFormat::Json => output::print_json(&BlockEntry::new(id, block))?,
        OutputFormat::Text => print!("{}", output::format_block(id, &block)),
    }
    Ok(())
}
