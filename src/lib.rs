//! Drives the WRF-SFIRE build through its interactive configurator.
//!
//! The `configure` script prints numbered menus (compiler/parallelism
//! platform, nesting mode) and blocks for a typed answer; the `compile`
//! script always exits zero. This crate answers the former from a declarative
//! [`BuildConfiguration`] and judges the latter by its output.
//!
//! - **Stream reading** - [`process`]: interleaved, non-blocking reads of the
//!   configurator's stdout/stderr
//! - **Prompt handling** - [`prompt`]: option table parsing and answer
//!   resolution
//! - **Configure session** - [`configure`]: polling state machine with stall
//!   detection
//! - **Compile runner** - [`compile`]: textual success check with one retry
//! - **Support** - [`config`], [`preflight`], [`lock`], [`manifest`]
//!
//! # Architecture
//!
//! ```text
//! BuildConfiguration (wrf-build.toml)
//!     │
//!     ├── configure::run_configure
//!     │       ├── process::ChildProcess      ./configure, piped stdio
//!     │       ├── prompt::parse_*            menu text -> option tables
//!     │       └── prompt::resolve_*          option tables -> answer
//!     │
//!     └── compile::run_compile               csh ./compile -j N <case>
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use wrf_builder::config::load_config;
//! use wrf_builder::configure::run_configure;
//!
//! let source = Path::new("/scratch/WRF-SFIRE");
//! let loaded = load_config(source, None)?;
//! let mut answers = Vec::new();
//! run_configure(
//!     source,
//!     &source.join("configure"),
//!     &loaded.build,
//!     loaded.orchestrator.stall,
//!     &mut answers,
//! )?;
//! ```

pub mod compile;
pub mod config;
pub mod configure;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod preflight;
pub mod process;
pub mod prompt;

pub use config::{BuildConfiguration, BuildType, CompileType, Nesting, StallPolicy};
pub use configure::{ConfigureSession, SessionState};
pub use error::{BuildError, Outcome};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable selecting the log level when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "WRF_BUILDER_LOG";

/// Install the stderr tracing subscriber. Safe to call more than once.
///
/// stdout is left to the configurator transcript and compile output.
pub fn init_logging() {
    use std::sync::Once;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) => {
                let level = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
                EnvFilter::try_new(format!("wrf_builder={}", level))
                    .unwrap_or_else(|_| EnvFilter::new("wrf_builder=info"))
            }
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    });
}
