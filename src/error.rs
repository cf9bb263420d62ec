//! Error taxonomy for the configure and compile phases.
//!
//! [`BuildError`] carries the detail; [`Outcome`] is the flattened view
//! reported to whatever invoked the builder.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    /// No configurator option matches the requested build.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A prompt was triggered but its text is neither known menu.
    #[error("unrecognized configure prompt:\n{transcript}")]
    UnrecognizedPrompt { transcript: String },

    #[error(
        "configure output stalled for {}s, presumably an undetected question",
        .0.as_secs()
    )]
    StallTimeout(Duration),

    #[error("configure failed with exit code {0}")]
    ConfigureFailed(i32),

    #[error("compile failed after {attempts} attempts; check the output log for details")]
    CompileFailed { attempts: u32 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// What the outer build system sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    ConfigurationError(String),
    UnrecognizedPromptError,
    StallTimeoutError,
    CompileFailedError,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl From<&BuildError> for Outcome {
    fn from(err: &BuildError) -> Self {
        match err {
            BuildError::Configuration(detail) => Outcome::ConfigurationError(detail.clone()),
            BuildError::UnrecognizedPrompt { .. } => Outcome::UnrecognizedPromptError,
            BuildError::StallTimeout(_) => Outcome::StallTimeoutError,
            BuildError::CompileFailed { .. } => Outcome::CompileFailedError,
            BuildError::ConfigureFailed(_) | BuildError::Io { .. } => {
                Outcome::ConfigurationError(err.to_string())
            }
        }
    }
}

impl From<&anyhow::Error> for Outcome {
    fn from(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<BuildError>() {
            Some(build_err) => Outcome::from(build_err),
            None => Outcome::ConfigurationError(format!("{:#}", err)),
        }
    }
}
