use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use blockref_core::{BlockRenderer, HtmlRenderer, LiveDocument, LivePreview};
use serde_json::json;
use tracing::debug;

use crate::cli::OutputFormat;
use crate::context::Session;
use crate::output;

/// The file with every reference resolved, as the live surface would show it.
pub async fn render(session: &Session, file: &Path) -> Result<(String, String)> {
    let relative = session.resolve_file(file)?;
    let text = session.read(&relative).await?;

    let renderer = BlockRenderer::new(
        Arc::new(session.index.clone()),
        Arc::new(HtmlRenderer::new()),
        session.config.live.embed_max_depth,
    );
    let mut preview = LivePreview::new(
        LiveDocument::new(relative.as_str(), text),
        Arc::new(renderer),
        session.config.live.scan_debounce(),
    );
    preview.scan_now();
    preview.settle().await;
    debug!(
        "Preview of {} settled after {} scans",
        relative,
        preview.scan_count()
    );

    Ok((relative, preview.document().materialize()))
}

pub async fn execute(session: &Session, file: &Path, format: OutputFormat) -> Result<()> {
    session.initialize().await?;
    let (relative, rendered) = render(session, file).await?;

    match format {
        OutputFormat::Json => output::print_json(&json!({ "file": relative, "output": rendered }))?,
        OutputFormat::Text => println!("{}", rendered.trim_end()),
    }
    Ok(())
}
