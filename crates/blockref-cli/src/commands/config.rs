use anyhow::Result;
use blockref_config::{BlockRefConfig, ConfigLoader};

use crate::cli::OutputFormat;

pub fn execute(config: &BlockRefConfig, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => ConfigLoader::to_json(config)?,
        OutputFormat::Text => ConfigLoader::to_toml(config)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
