//! Build selection and orchestration settings.
//!
//! The build selection is read from `wrf-build.toml` in the source tree
//! (or an explicit path). Every key is optional:
//!
//! ```toml
//! [build]
//! build_type = "dmpar"
//! nesting = "basic"
//! compile_type = "em_real"
//! fc = "gfortran"
//! cc = "gcc"
//!
//! [orchestrator]
//! poll_interval_ms = 100
//! max_idle_polls = 300
//! jobs = 8
//! configure_script = "./configure"
//! compile_script = "./compile"
//! csh = "/usr/bin/csh"
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "wrf-build.toml";

/// Upper bound the compile script tolerates for `-j`.
pub const MAX_COMPILE_JOBS: usize = 20;

const DEFAULT_FC: &str = "gfortran";
const DEFAULT_CC: &str = "gcc";

/// Parallelism mode offered by the configurator for each platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildType {
    #[serde(rename = "serial")]
    Serial,
    #[serde(rename = "smpar")]
    Smpar,
    #[serde(rename = "dmpar")]
    Dmpar,
    #[serde(rename = "dm+sm")]
    DmSm,
}

impl BuildType {
    pub const ALL: [BuildType; 4] = [
        BuildType::Serial,
        BuildType::Smpar,
        BuildType::Dmpar,
        BuildType::DmSm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildType::Serial => "serial",
            BuildType::Smpar => "smpar",
            BuildType::Dmpar => "dmpar",
            BuildType::DmSm => "dm+sm",
        }
    }
}

impl FromStr for BuildType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(BuildType::Serial),
            "smpar" => Ok(BuildType::Smpar),
            "dmpar" => Ok(BuildType::Dmpar),
            "dm+sm" => Ok(BuildType::DmSm),
            other => bail!(
                "unsupported build_type '{}'; expected one of: serial, smpar, dmpar, dm+sm",
                other
            ),
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain nesting mode, keyed the way the nesting menu names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nesting {
    NoNesting,
    Basic,
    PresetMoves,
    VortexFollowing,
}

impl Nesting {
    /// Menu key: the option name with spaces replaced by underscores.
    pub fn as_str(self) -> &'static str {
        match self {
            Nesting::NoNesting => "no_nesting",
            Nesting::Basic => "basic",
            Nesting::PresetMoves => "preset_moves",
            Nesting::VortexFollowing => "vortex_following",
        }
    }
}

impl FromStr for Nesting {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_nesting" => Ok(Nesting::NoNesting),
            "basic" => Ok(Nesting::Basic),
            "preset_moves" => Ok(Nesting::PresetMoves),
            "vortex_following" => Ok(Nesting::VortexFollowing),
            other => bail!(
                "unsupported nesting '{}'; expected one of: no_nesting, basic, preset_moves, vortex_following",
                other
            ),
        }
    }
}

impl fmt::Display for Nesting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case passed to the compile script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileType {
    EmReal,
    EmFire,
    EmQuarterSs,
    EmBWave,
    EmLes,
    EmHeldsuarez,
    EmTropicalCyclone,
    EmHill2dX,
    EmSquall2dX,
    EmSquall2dY,
    EmGrav2dX,
    EmSeabreeze2dX,
    EmScmXy,
}

impl CompileType {
    const NAMES: [(&'static str, CompileType); 13] = [
        ("em_real", CompileType::EmReal),
        ("em_fire", CompileType::EmFire),
        ("em_quarter_ss", CompileType::EmQuarterSs),
        ("em_b_wave", CompileType::EmBWave),
        ("em_les", CompileType::EmLes),
        ("em_heldsuarez", CompileType::EmHeldsuarez),
        ("em_tropical_cyclone", CompileType::EmTropicalCyclone),
        ("em_hill2d_x", CompileType::EmHill2dX),
        ("em_squall2d_x", CompileType::EmSquall2dX),
        ("em_squall2d_y", CompileType::EmSquall2dY),
        ("em_grav2d_x", CompileType::EmGrav2dX),
        ("em_seabreeze2d_x", CompileType::EmSeabreeze2dX),
        ("em_scm_xy", CompileType::EmScmXy),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CompileType::EmReal => "em_real",
            CompileType::EmFire => "em_fire",
            CompileType::EmQuarterSs => "em_quarter_ss",
            CompileType::EmBWave => "em_b_wave",
            CompileType::EmLes => "em_les",
            CompileType::EmHeldsuarez => "em_heldsuarez",
            CompileType::EmTropicalCyclone => "em_tropical_cyclone",
            CompileType::EmHill2dX => "em_hill2d_x",
            CompileType::EmSquall2dX => "em_squall2d_x",
            CompileType::EmSquall2dY => "em_squall2d_y",
            CompileType::EmGrav2dX => "em_grav2d_x",
            CompileType::EmSeabreeze2dX => "em_seabreeze2d_x",
            CompileType::EmScmXy => "em_scm_xy",
        }
    }
}

impl FromStr for CompileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        if let Some((_, ty)) = Self::NAMES.iter().find(|(name, _)| *name == wanted) {
            return Ok(*ty);
        }
        let names = Self::NAMES
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        bail!(
            "unsupported compile_type '{}'; expected one of: {}",
            wanted,
            names
        )
    }
}

impl fmt::Display for CompileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved target build. Created once before configuring; read-only after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfiguration {
    pub build_type: BuildType,
    pub nesting: Nesting,
    pub compile_type: CompileType,
    /// `fc/cc` token matched against platform labels, e.g. `gfortran/gcc`.
    pub compiler_pair: String,
}

impl BuildConfiguration {
    pub fn new(
        build_type: BuildType,
        nesting: Nesting,
        compile_type: CompileType,
        compiler_pair: impl Into<String>,
    ) -> Self {
        Self {
            build_type,
            nesting,
            compile_type,
            compiler_pair: compiler_pair.into(),
        }
    }
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self::new(
            BuildType::Dmpar,
            Nesting::Basic,
            CompileType::EmReal,
            compiler_pair(DEFAULT_FC, DEFAULT_CC),
        )
    }
}

/// Derive the `fc/cc` pair from two compiler executables.
///
/// `/opt/gcc-12/bin/gfortran-12` and `gcc-12` give `gfortran/gcc`.
pub fn compiler_pair(fc: &str, cc: &str) -> String {
    format!("{}/{}", compiler_family(fc), compiler_family(cc))
}

fn compiler_family(exe: &str) -> String {
    let base = Path::new(exe)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(exe);
    base.split('-')
        .next()
        .unwrap_or(base)
        .to_ascii_lowercase()
}

/// Stall detection budget for the configure loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallPolicy {
    pub poll_interval: Duration,
    /// Consecutive empty polls tolerated before the session is declared stalled.
    pub max_idle_polls: u32,
}

impl StallPolicy {
    pub fn budget(&self) -> Duration {
        self.poll_interval * self.max_idle_polls
    }
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_idle_polls: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub stall: StallPolicy,
    /// Explicit `-j` for the compile script; host parallelism when unset.
    pub jobs: Option<usize>,
    pub configure_script: PathBuf,
    pub compile_script: PathBuf,
    pub csh: Option<PathBuf>,
}

impl OrchestratorSettings {
    /// Job count handed to the compile script, capped at [`MAX_COMPILE_JOBS`].
    pub fn compile_jobs(&self) -> usize {
        let requested = self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        });
        requested.clamp(1, MAX_COMPILE_JOBS)
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            stall: StallPolicy::default(),
            jobs: None,
            configure_script: PathBuf::from("./configure"),
            compile_script: PathBuf::from("./compile"),
            csh: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub build: BuildConfiguration,
    pub orchestrator: OrchestratorSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    #[serde(default)]
    build: BuildToml,
    #[serde(default)]
    orchestrator: OrchestratorToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildToml {
    build_type: Option<String>,
    nesting: Option<String>,
    compile_type: Option<String>,
    fc: Option<String>,
    cc: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrchestratorToml {
    poll_interval_ms: Option<u64>,
    max_idle_polls: Option<u32>,
    jobs: Option<usize>,
    configure_script: Option<PathBuf>,
    compile_script: Option<PathBuf>,
    csh: Option<PathBuf>,
}

/// Load the config for `source_dir`.
///
/// An explicit path must exist. Otherwise `<source_dir>/wrf-build.toml` is
/// used when present, and defaults apply when it is not.
pub fn load_config(source_dir: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.is_file() {
                bail!("config file not found: '{}'", path.display());
            }
            Some(path.to_path_buf())
        }
        None => {
            let candidate = source_dir.join(CONFIG_FILENAME);
            candidate.is_file().then_some(candidate)
        }
    };

    let env_fc = env::var("FC").ok();
    let env_cc = env::var("CC").ok();

    match config_path {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading build config '{}'", path.display()))?;
            parse_config(&text, &path, env_fc, env_cc)
        }
        None => parse_config("", Path::new(CONFIG_FILENAME), env_fc, env_cc),
    }
}

/// Parse config text. `env_fc`/`env_cc` fill in compilers the file omits.
pub fn parse_config(
    text: &str,
    origin: &Path,
    env_fc: Option<String>,
    env_cc: Option<String>,
) -> Result<LoadedConfig> {
    let parsed: ConfigToml = toml::from_str(text)
        .with_context(|| format!("parsing build config '{}'", origin.display()))?;

    let build = parsed.build;
    let build_type = parse_field(build.build_type.as_deref(), origin, BuildType::Dmpar)?;
    let nesting = parse_field(build.nesting.as_deref(), origin, Nesting::Basic)?;
    let compile_type = parse_field(build.compile_type.as_deref(), origin, CompileType::EmReal)?;

    let fc = build
        .fc
        .or(env_fc)
        .filter(|fc| !fc.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FC.to_string());
    let cc = build
        .cc
        .or(env_cc)
        .filter(|cc| !cc.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CC.to_string());

    let orch = parsed.orchestrator;
    let defaults = OrchestratorSettings::default();
    let stall = StallPolicy {
        poll_interval: orch
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.stall.poll_interval),
        max_idle_polls: orch.max_idle_polls.unwrap_or(defaults.stall.max_idle_polls),
    };
    if stall.max_idle_polls == 0 {
        bail!(
            "invalid build config '{}': max_idle_polls must be at least 1",
            origin.display()
        );
    }
    if orch.jobs == Some(0) {
        bail!(
            "invalid build config '{}': jobs must be at least 1",
            origin.display()
        );
    }

    Ok(LoadedConfig {
        build: BuildConfiguration::new(
            build_type,
            nesting,
            compile_type,
            compiler_pair(&fc, &cc),
        ),
        orchestrator: OrchestratorSettings {
            stall,
            jobs: orch.jobs,
            configure_script: orch.configure_script.unwrap_or(defaults.configure_script),
            compile_script: orch.compile_script.unwrap_or(defaults.compile_script),
            csh: orch.csh,
        },
    })
}

fn parse_field<T>(value: Option<&str>, origin: &Path, default: T) -> Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid build config '{}'", origin.display())),
        None => Ok(default),
    }
}
