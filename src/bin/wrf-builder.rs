use anyhow::{bail, Result};
use std::path::Path;

mod workflows;

use workflows::Phase;

fn usage() -> &'static str {
    "Usage:\n  wrf-builder configure <source_dir> [config.toml]\n  wrf-builder compile <source_dir> [config.toml]\n  wrf-builder build <source_dir> [config.toml]\n  wrf-builder parse-menu <transcript_file>"
}

fn main() -> Result<()> {
    wrf_builder::init_logging();
    tracing::debug!("{} v{} starting", wrf_builder::NAME, wrf_builder::VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [command, transcript] if command == "parse-menu" => {
            workflows::print_menu_tables(Path::new(transcript))
        }
        [command, source_dir] => {
            workflows::run_phase(parse_phase(command)?, Path::new(source_dir), None)
        }
        [command, source_dir, config] => workflows::run_phase(
            parse_phase(command)?,
            Path::new(source_dir),
            Some(Path::new(config)),
        ),
        _ => bail!(usage()),
    }
}

fn parse_phase(command: &str) -> Result<Phase> {
    match command {
        "configure" => Ok(Phase::Configure),
        "compile" => Ok(Phase::Compile),
        "build" => Ok(Phase::Build),
        other => bail!("unknown command '{}'\n{}", other, usage()),
    }
}
