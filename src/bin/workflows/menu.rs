use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use wrf_builder::prompt::{parse_nesting_options, parse_platform_options};

/// Print the option tables found in a saved configure transcript.
pub(crate) fn print_menu_tables(transcript: &Path) -> Result<()> {
    let text = fs::read_to_string(transcript)
        .with_context(|| format!("reading transcript '{}'", transcript.display()))?;

    let report = serde_json::json!({
        "platform": parse_platform_options(&text).ok(),
        "nesting": parse_nesting_options(&text).ok(),
    });
    let rendered =
        serde_json::to_string_pretty(&report).with_context(|| "serializing option tables")?;
    println!("{}", rendered);
    Ok(())
}
