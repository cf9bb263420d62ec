//! Preflight checks run before configuring.
//!
//! The configure and compile scripts shell out to perl, m4, make and csh
//! without checking for them first; a missing tool shows up as a confusing
//! configure failure or a compile that "fails" twice. Checking up front
//! gives a clear error instead.
//!
//! # Example
//!
//! ```rust
//! use wrf_builder::preflight::{check_required_tools, command_exists};
//!
//! if !command_exists("perl") {
//!     println!("perl not installed");
//! }
//!
//! let tools = &[("perl", "perl"), ("m4", "m4")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the csh interpreter explicitly.
pub const CSH_ENV: &str = "WRF_CSH";

/// Host tools the configure and compile scripts need, as
/// (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("perl", "perl"),
    ("m4", "m4"),
    ("make", "make"),
];

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check [`REQUIRED_TOOLS`] plus the csh interpreter, returning the latter.
pub fn check_host_tools(configured_csh: Option<&Path>) -> Result<PathBuf> {
    check_required_tools(REQUIRED_TOOLS)?;
    find_csh(configured_csh)
}

/// Locate the csh used to run the compile script.
///
/// Resolution order:
/// 1. `csh` from the build config
/// 2. `WRF_CSH` env var
/// 3. `csh` in PATH
/// 4. `tcsh` in PATH
pub fn find_csh(configured: Option<&Path>) -> Result<PathBuf> {
    resolve_csh(configured, env::var_os(CSH_ENV).map(PathBuf::from))
}

fn resolve_csh(configured: Option<&Path>, from_env: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        bail!("configured csh not found: {}", path.display());
    }

    if let Some(path) = from_env {
        if path.is_file() {
            return Ok(path);
        }
        bail!("{} points to non-existent path: {}", CSH_ENV, path.display());
    }

    for candidate in ["csh", "tcsh"] {
        if let Ok(path) = which::which(candidate) {
            return Ok(path);
        }
    }

    bail!(
        "Could not find a csh interpreter.\n\n\
         Resolution order tried:\n\
         1. csh in build config - not set\n\
         2. {} env var - not set\n\
         3. csh in PATH - not found\n\
         4. tcsh in PATH - not found\n\n\
         Install tcsh or set {}=/path/to/csh",
        CSH_ENV,
        CSH_ENV
    )
}
