use anyhow::Result;
use blockref_core::{suggest, BlockSuggestion};
use blockref_parser::suggestion_trigger;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::context::Session;
use crate::output;

/// Suggestions for the `((` left open at the end of `prefix`, if any.
pub fn run(session: &Session, prefix: &str) -> Option<(usize, Vec<BlockSuggestion>)> {
    let trigger = suggestion_trigger(prefix)?;
    Some((trigger.start, suggest(&session.index, &trigger.query)))
}

pub async fn execute(session: &Session, prefix: &str, format: OutputFormat) -> Result<()> {
    session.initialize().await?;
    let found = run(session, prefix);

    match (format, found) {
        (OutputFormat::Json, Some((start, suggestions))) => {
            output::print_json(&json!({ "start": start, "suggestions": suggestions }))?
        }
        (OutputFormat::Json, None) => {
            output::print_json(&json!({ "start": null, "suggestions": [] }))?
        }
        (OutputFormat::Text, Some((_, suggestions))) => {
            print!("{}", output::format_suggestions(&suggestions))
        }
        (OutputFormat::Text, None) => println!("No open (( before the cursor"),
    }
    Ok(())
}
