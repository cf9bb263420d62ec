use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use wrf_builder::compile::run_compile;
use wrf_builder::config::{load_config, LoadedConfig};
use wrf_builder::configure::run_configure;
use wrf_builder::error::{BuildError, Outcome};
use wrf_builder::lock::SourceTreeLock;
use wrf_builder::manifest::{manifest_path, write_run_manifest, RunManifest};
use wrf_builder::preflight;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Configure,
    Compile,
    Build,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Configure => "configure",
            Phase::Compile => "compile",
            Phase::Build => "build",
        }
    }

    fn configures(self) -> bool {
        matches!(self, Phase::Configure | Phase::Build)
    }

    fn compiles(self) -> bool {
        matches!(self, Phase::Compile | Phase::Build)
    }
}

pub(crate) fn run_phase(phase: Phase, source_dir: &Path, config_path: Option<&Path>) -> Result<()> {
    if !source_dir.is_dir() {
        bail!("source directory not found: '{}'", source_dir.display());
    }
    let source_dir = source_dir
        .canonicalize()
        .with_context(|| format!("resolving source directory '{}'", source_dir.display()))?;

    let loaded = load_config(&source_dir, config_path)?;
    let _lock = SourceTreeLock::acquire(&source_dir)?;

    let mut manifest = RunManifest::start(phase.name(), &loaded.build);
    let result = execute(phase, &source_dir, &loaded, &mut manifest);

    let outcome = match &result {
        Ok(()) => Outcome::Success,
        Err(err) => Outcome::from(err),
    };
    if let Some(BuildError::CompileFailed { attempts }) = result
        .as_ref()
        .err()
        .and_then(|err| err.downcast_ref::<BuildError>())
    {
        manifest.compile_attempts = Some(*attempts);
    }
    manifest.finish(outcome.clone());

    let path = manifest_path(&source_dir);
    write_run_manifest(&path, &manifest)?;

    match &result {
        Ok(()) => info!(phase = phase.name(), manifest = %path.display(), "finished"),
        Err(_) => error!(phase = phase.name(), ?outcome, "failed"),
    }
    result
}

fn execute(
    phase: Phase,
    source_dir: &Path,
    loaded: &LoadedConfig,
    manifest: &mut RunManifest,
) -> Result<()> {
    let settings = &loaded.orchestrator;
    let csh = preflight::check_host_tools(settings.csh.as_deref())
        .context("checking host tools")?;

    if phase.configures() {
        let script = script_path(source_dir, &settings.configure_script);
        if !script.is_file() {
            bail!("configure script not found: '{}'", script.display());
        }
        run_configure(
            source_dir,
            &script,
            &loaded.build,
            settings.stall,
            &mut manifest.answers,
        )
        .with_context(|| format!("configuring '{}'", source_dir.display()))?;
    }

    if phase.compiles() {
        let attempts = run_compile(
            source_dir,
            &csh,
            &settings.compile_script,
            settings.compile_jobs(),
            loaded.build.compile_type,
        )
        .with_context(|| format!("compiling '{}'", source_dir.display()))?;
        manifest.compile_attempts = Some(attempts);
    }

    Ok(())
}

/// Relative script paths are taken relative to the source tree.
fn script_path(source_dir: &Path, script: &Path) -> PathBuf {
    if script.is_absolute() {
        script.to_path_buf()
    } else {
        source_dir.join(script)
    }
}
