use anyhow::Result;

use crate::cli::OutputFormat;
use crate::context::Session;
use crate::output;

pub async fn execute(session: &Session, query: &str, format: OutputFormat) -> Result<()> {
    session.initialize().await?;
    let results = session.index.search_blocks(query);

    match format {
        OutputFormat::Json => output::print_json(&results)?,
        OutputFormat::Text => print!("{}", output::format_entries(&results)),
    }
    Ok(())
}
