use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use blockref_watch::{
    EventFilter, EventHandler, FileEvent, FileEventKind, IndexingHandler, NotifyWatcher,
    WatchManager,
};
use tracing::info;

use crate::cli::OutputFormat;
use crate::context::Session;

/// Prints every event after the index has seen it.
struct EventPrinter {
    format: OutputFormat,
}

#[async_trait]
impl EventHandler for EventPrinter {
    async fn handle(&self, event: FileEvent) -> blockref_watch::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{line}");
                }
            }
            OutputFormat::Text => match &event.kind {
                FileEventKind::Moved { from, to } => {
                    println!("moved    {} -> {}", from.display(), to.display())
                }
                kind => println!("{:<8} {}", kind.as_str(), event.path.display()),
            },
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "printer"
    }

    fn priority(&self) -> u32 {
        10
    }
}

pub async fn execute(session: &Session, format: OutputFormat) -> Result<()> {
    let outcome = session.initialize().await?;
    if format == OutputFormat::Text {
        println!(
            "Watching {} ({} blocks). Press Ctrl-C to stop.",
            session.vault.root().display(),
            outcome.blocks
        );
    }

    let filter = session
        .config
        .vault
        .extensions
        .iter()
        .fold(EventFilter::new(), |filter, ext| filter.with_extension(ext.as_str()));

    let mut manager = WatchManager::new(Box::new(NotifyWatcher::new())).with_filter(filter);
    manager
        .register_handler(Arc::new(IndexingHandler::new(
            session.index.clone(),
            session.vault.clone(),
        )))
        .await;
    manager
        .register_handler(Arc::new(EventPrinter { format }))
        .await;
    let root = session
        .vault
        .root()
        .canonicalize()
        .with_context(|| format!("Cannot open vault {}", session.vault.root().display()))?;
    manager.start().await?;
    manager
        .add_watch(root.clone(), true)
        .await
        .with_context(|| format!("Cannot watch {}", root.display()))?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupted, stopping watcher");

    manager.shutdown().await?;
    Ok(())
}
