use std::path::Path;

use anyhow::{bail, Context, Result};
use blockref_core::{copy_block_reference, CopiedReference};
use tracing::info;

use crate::cli::OutputFormat;
use crate::context::Session;
use crate::output;

/// Copy a reference to the bullet on 1-based `line`, writing a generated id
/// line back into the file.
pub async fn run(session: &Session, file: &Path, line: usize) -> Result<CopiedReference> {
    let Some(zero_based) = line.checked_sub(1) else {
        bail!("Line numbers start at 1");
    };
    let relative = session.resolve_file(file)?;
    let text = session.read(&relative).await?;
    let copied = copy_block_reference(&session.index, &relative, &text, zero_based)
        .await
        .with_context(|| format!("{relative}:{line}"))?;

    if let Some(insertion) = &copied.insertion {
        let path = session.vault.absolute(&relative);
        tokio::fs::write(&path, insertion.apply(&text))
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        session.index.file_changed(relative.as_str()).await?;
        info!("Added id {} to {}:{}", copied.id, relative, line);
    }
    Ok(copied)
}

pub async fn execute(session: &Session, file: &Path, line: usize, format: OutputFormat) -> Result<()> {
    session.initialize().await?;
    let copied = run(session, file, line).await?;

    match format {
        OutputFormat::Json => output::print_json(&copied)?,
        OutputFormat::Text => println!("{}", copied.reference),
    }
    Ok(())
}
