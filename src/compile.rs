//! Compile step.
//!
//! The compile script runs `make -i -k` underneath and exits zero whether or
//! not anything was built, so success is read from its output instead.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::CompileType;
use crate::error::{BuildError, Result};

/// Printed by the compile script only when every executable was produced.
pub const SUCCESS_MARKER: &str = "Executables successfully built";

/// Attempts made by [`CompileRunner::run_with_retry`] before giving up.
pub const MAX_ATTEMPTS: u32 = 2;

/// Something that runs the build once and returns its combined output.
pub trait BuildScript {
    fn invoke(&mut self) -> Result<String>;
}

/// `csh ./compile -j <jobs> <compile_type>` in the source tree.
#[derive(Debug, Clone)]
pub struct CshCompileScript {
    pub csh: PathBuf,
    pub script: PathBuf,
    pub source_dir: PathBuf,
    pub jobs: usize,
    pub compile_type: CompileType,
}

impl CshCompileScript {
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.csh);
        cmd.arg(&self.script)
            .arg("-j")
            .arg(self.jobs.to_string())
            .arg(self.compile_type.as_str())
            .current_dir(&self.source_dir);
        cmd
    }
}

impl BuildScript for CshCompileScript {
    fn invoke(&mut self) -> Result<String> {
        info!(
            script = %self.script.display(),
            jobs = self.jobs,
            compile_type = %self.compile_type,
            "running compile script"
        );
        let output = self.command().output().map_err(|e| {
            BuildError::io(
                format!("executing compile script '{}'", self.script.display()),
                e,
            )
        })?;
        debug!(status = %output.status, "compile script exited");

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(format!("{}{}", stdout, stderr))
    }
}

pub struct CompileRunner<S: BuildScript> {
    script: S,
    attempts: u32,
}

impl<S: BuildScript> CompileRunner<S> {
    pub fn new(script: S) -> Self {
        Self {
            script,
            attempts: 0,
        }
    }

    /// Invocations made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run the build once and echo its output. True iff the success marker
    /// is present.
    pub fn run_once(&mut self) -> Result<bool> {
        self.attempts += 1;
        let output = self.script.invoke()?;
        println!("{}", output);
        Ok(output.contains(SUCCESS_MARKER))
    }

    /// Run the build, retrying once without delay.
    pub fn run_with_retry(&mut self) -> Result<()> {
        for attempt in 1..=MAX_ATTEMPTS {
            if self.run_once()? {
                return Ok(());
            }
            if attempt < MAX_ATTEMPTS {
                warn!("compilation failed first time (WRF idiosyncrasies?) - trying again...");
            }
        }
        Err(BuildError::CompileFailed {
            attempts: self.attempts,
        })
    }
}

/// Run `compile_script` under `csh` in `source_dir` with the retry policy.
///
/// Returns the number of attempts it took.
pub fn run_compile(
    source_dir: &Path,
    csh: &Path,
    compile_script: &Path,
    jobs: usize,
    compile_type: CompileType,
) -> Result<u32> {
    let script = CshCompileScript {
        csh: csh.to_path_buf(),
        script: compile_script.to_path_buf(),
        source_dir: source_dir.to_path_buf(),
        jobs,
        compile_type,
    };
    let mut runner = CompileRunner::new(script);
    runner.run_with_retry()?;
    Ok(runner.attempts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Canned {
        outputs: VecDeque<&'static str>,
        calls: u32,
    }

    impl Canned {
        fn new(outputs: &[&'static str]) -> Self {
            Self {
                outputs: outputs.iter().copied().collect(),
                calls: 0,
            }
        }
    }

    impl BuildScript for Canned {
        fn invoke(&mut self) -> Result<String> {
            self.calls += 1;
            Ok(self.outputs.pop_front().unwrap_or("").to_string())
        }
    }

    const BUILT: &str = "==========================================================================\n\
                         build started:   Mon Jan  1 00:00:00 UTC 2024\n\
                         --->                  Executables successfully built                  <---\n";
    const BROKEN: &str = "make: [em_real] Error 2 (ignored)\n\
                          ---> Problems building executables, look for errors in the build log  <---\n";

    #[test]
    fn first_success_stops() {
        let mut runner = CompileRunner::new(Canned::new(&[BUILT, BROKEN]));
        runner.run_with_retry().unwrap();
        assert_eq!(runner.script.calls, 1);
        assert_eq!(runner.attempts(), 1);
    }

    #[test]
    fn retry_recovers_on_second_attempt() {
        let mut runner = CompileRunner::new(Canned::new(&[BROKEN, BUILT]));
        runner.run_with_retry().unwrap();
        assert_eq!(runner.script.calls, 2);
    }

    #[test]
    fn two_failures_are_fatal_after_exactly_two_attempts() {
        let mut runner = CompileRunner::new(Canned::new(&[BROKEN, BROKEN, BUILT]));
        let err = runner.run_with_retry().unwrap_err();
        assert!(matches!(err, BuildError::CompileFailed { attempts: 2 }));
        assert_eq!(runner.script.calls, MAX_ATTEMPTS);
    }

    #[test]
    fn run_once_ignores_everything_but_the_marker() {
        let mut runner = CompileRunner::new(Canned::new(&["exit status 0\n"]));
        assert!(!runner.run_once().unwrap());
    }

    #[test]
    fn command_line_matches_compile_script_usage() {
        let script = CshCompileScript {
            csh: PathBuf::from("/bin/csh"),
            script: PathBuf::from("./compile"),
            source_dir: PathBuf::from("/src/wrf"),
            jobs: 8,
            compile_type: CompileType::EmFire,
        };
        let cmd = script.command();
        let args = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(cmd.get_program(), "/bin/csh");
        assert_eq!(args, vec!["./compile", "-j", "8", "em_fire"]);
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/src/wrf")));
    }
}
