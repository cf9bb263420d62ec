//! Configure session: answers the interactive configurator.
//!
//! The configurator prints a menu and blocks on stdin with no framing the
//! orchestrator could wait on, so the session polls. Output accumulates until
//! an answer trigger shows up, the prompt is classified and answered from the
//! [`BuildConfiguration`], and the buffer starts over. A run of empty polls
//! longer than the [`StallPolicy`] budget means an unknown question is
//! pending and the session gives up.

use std::path::Path;
use std::thread;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{BuildConfiguration, StallPolicy};
use crate::error::{BuildError, Result};
use crate::process::{ChildProcess, ConfiguratorIo};
use crate::prompt::{self, PromptKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Running,
    AwaitingPlatformAnswer,
    AwaitingNestingAnswer,
    Completed(i32),
    Stalled,
    Failed(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed(_) | SessionState::Stalled | SessionState::Failed(_)
        )
    }
}

/// An answer written to the configurator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchedAnswer {
    pub prompt: PromptKind,
    pub index: String,
    /// Platform label the index was taken from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

pub struct ConfigureSession<'a, C: ConfiguratorIo> {
    io: C,
    config: &'a BuildConfiguration,
    policy: StallPolicy,
    buffer: String,
    idle_polls: u32,
    state: SessionState,
    answers: Vec<DispatchedAnswer>,
}

impl<'a, C: ConfiguratorIo> ConfigureSession<'a, C> {
    pub fn new(io: C, config: &'a BuildConfiguration, policy: StallPolicy) -> Self {
        Self {
            io,
            config,
            policy,
            buffer: String::new(),
            idle_polls: 0,
            state: SessionState::Running,
            answers: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn answers(&self) -> &[DispatchedAnswer] {
        &self.answers
    }

    /// One read-loop iteration. Returns the state after it.
    ///
    /// Parser, resolver and child status failures move the session to
    /// [`SessionState::Failed`] and are returned as errors.
    pub fn poll(&mut self) -> Result<SessionState> {
        if self.state.is_terminal() {
            return Ok(self.state.clone());
        }

        match self.io.try_read_line() {
            Some(line) => {
                self.idle_polls = 0;
                self.buffer.push_str(&line);
                if prompt::awaits_answer(&self.buffer) {
                    if let Err(err) = self.answer() {
                        self.state = SessionState::Failed(err.to_string());
                        return Err(err);
                    }
                }
            }
            None => match self.exit_status() {
                Ok(Some(code)) => {
                    debug!(code, "configurator exited");
                    self.state = SessionState::Completed(code);
                }
                Ok(None) if self.idle_polls > self.policy.max_idle_polls => {
                    self.state = SessionState::Stalled;
                }
                Ok(None) => {
                    thread::sleep(self.policy.poll_interval);
                    self.idle_polls += 1;
                }
                Err(err) => {
                    self.state = SessionState::Failed(err.to_string());
                    return Err(err);
                }
            },
        }

        Ok(self.state.clone())
    }

    /// Exit code once the configurator is gone and its output consumed.
    fn exit_status(&mut self) -> Result<Option<i32>> {
        if self.io.is_closed()? {
            self.io.exit_code().map(Some)
        } else {
            Ok(None)
        }
    }

    fn answer(&mut self) -> Result<()> {
        let (kind, index, label) = match prompt::classify(&self.buffer) {
            Some(PromptKind::Platform) => {
                self.state = SessionState::AwaitingPlatformAnswer;
                let table = prompt::parse_platform_options(&self.buffer)?;
                let choice = prompt::resolve_platform(
                    &table,
                    &self.config.compiler_pair,
                    self.config.build_type,
                )?;
                if choice.is_ambiguous() {
                    warn!(
                        candidates = choice.candidates,
                        "found multiple potential build options"
                    );
                    warn!("selected build option {}", choice.label);
                } else {
                    info!("selected build option {}", choice.label);
                }
                (
                    PromptKind::Platform,
                    choice.index.to_string(),
                    Some(choice.label.to_string()),
                )
            }
            Some(PromptKind::Nesting) => {
                self.state = SessionState::AwaitingNestingAnswer;
                let table = prompt::parse_nesting_options(&self.buffer)?;
                let index = prompt::resolve_nesting(&table, self.config.nesting)?;
                (PromptKind::Nesting, index.to_string(), None)
            }
            None => {
                return Err(BuildError::UnrecognizedPrompt {
                    transcript: std::mem::take(&mut self.buffer),
                });
            }
        };

        self.io.send(&format!("{}\n", index))?;
        info!(prompt = ?kind, answer = %index, "answered configure prompt");
        self.answers.push(DispatchedAnswer {
            prompt: kind,
            index,
            label,
        });
        self.buffer.clear();
        self.state = SessionState::Running;
        Ok(())
    }

    /// Drive the session to a terminal state.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.poll()? {
                SessionState::Completed(0) => return Ok(()),
                SessionState::Completed(code) => return Err(BuildError::ConfigureFailed(code)),
                SessionState::Stalled => {
                    return Err(BuildError::StallTimeout(self.policy.budget()));
                }
                _ => {}
            }
        }
    }
}

/// Spawn `configure_script` in `source_dir` and answer it until it exits.
///
/// Every answer sent is appended to `answers`, whether or not the run
/// succeeds.
pub fn run_configure(
    source_dir: &Path,
    configure_script: &Path,
    config: &BuildConfiguration,
    policy: StallPolicy,
    answers: &mut Vec<DispatchedAnswer>,
) -> Result<()> {
    info!(
        source = %source_dir.display(),
        build_type = %config.build_type,
        nesting = %config.nesting,
        compilers = %config.compiler_pair,
        "running configure"
    );
    let child = ChildProcess::spawn(configure_script, source_dir)?;
    let mut session = ConfigureSession::new(child, config, policy);
    let result = session.run();
    answers.append(&mut session.answers);
    result
}
