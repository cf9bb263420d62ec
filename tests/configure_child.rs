//! Configure sessions against a real child process standing in for the
//! configurator.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;
use wrf_builder::config::{BuildConfiguration, BuildType, CompileType, Nesting, StallPolicy};
use wrf_builder::configure::{ConfigureSession, SessionState};
use wrf_builder::error::BuildError;
use wrf_builder::process::ChildProcess;
use wrf_builder::prompt::PromptKind;

const FAKE_CONFIGURE: &str = r#"
echo "checking for perl5... found"
echo "------------------------------------------------------------------------"
echo "Please select from among the following Linux x86_64 options:"
echo ""
echo "  1. (serial)   2. (smpar)   3. (dmpar)   4. (dm+sm)   PGI (pgf90/gcc)"
echo " 32. (serial)  33. (smpar)  34. (dmpar)  35. (dm+sm)   GNU (gfortran/gcc)"
echo " 36. (serial)  37. (smpar)  38. (dmpar)  39. (dm+sm)   GNU (gfortran/gcc): Aarch64"
echo ""
printf "Enter selection [1-75] : "
read platform
echo "------------------------------------------------------------------------"
printf "Compile for nesting? (1=basic, 2=preset moves, 3=vortex following) [default 1]: "
read nesting
echo "note: using NETCDF classic" >&2
echo "$platform $nesting" > answers.txt
echo "Configuration successful!"
"#;

fn policy() -> StallPolicy {
    StallPolicy {
        poll_interval: Duration::from_millis(10),
        max_idle_polls: 500,
    }
}

fn config(build_type: BuildType, nesting: Nesting, compiler_pair: &str) -> BuildConfiguration {
    BuildConfiguration::new(build_type, nesting, CompileType::EmReal, compiler_pair)
}

fn spawn_script(dir: &Path, body: &str) -> ChildProcess {
    let script = dir.join("configure");
    fs::write(&script, body).unwrap();
    let mut cmd = Command::new("sh");
    cmd.arg(&script).current_dir(dir);
    ChildProcess::spawn_command(cmd, "configure").unwrap()
}

#[test]
fn answers_reach_the_configurator() {
    let tmp = TempDir::new().unwrap();
    let child = spawn_script(tmp.path(), FAKE_CONFIGURE);
    let config = config(BuildType::Dmpar, Nesting::PresetMoves, "gfortran/gcc");

    let mut session = ConfigureSession::new(child, &config, policy());
    session.run().unwrap();

    assert_eq!(session.state(), &SessionState::Completed(0));
    let answers = session.answers();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].prompt, PromptKind::Platform);
    assert_eq!(answers[0].index, "34");
    assert_eq!(answers[1].prompt, PromptKind::Nesting);
    assert_eq!(answers[1].index, "2");

    let recorded = fs::read_to_string(tmp.path().join("answers.txt")).unwrap();
    assert_eq!(recorded.trim(), "34 2");
}

#[test]
fn other_compiler_pair_picks_its_own_row() {
    let tmp = TempDir::new().unwrap();
    let child = spawn_script(tmp.path(), FAKE_CONFIGURE);
    let config = config(BuildType::Serial, Nesting::Basic, "pgf90/gcc");

    let mut session = ConfigureSession::new(child, &config, policy());
    session.run().unwrap();

    let recorded = fs::read_to_string(tmp.path().join("answers.txt")).unwrap();
    assert_eq!(recorded.trim(), "1 1");
}

#[test]
fn unsupported_compiler_fails_the_session() {
    let tmp = TempDir::new().unwrap();
    let child = spawn_script(tmp.path(), FAKE_CONFIGURE);
    let config = config(BuildType::Dmpar, Nesting::Basic, "ifort/icc");

    let mut session = ConfigureSession::new(child, &config, policy());
    let err = session.run().unwrap_err();

    assert!(matches!(err, BuildError::Configuration(_)));
    assert!(matches!(session.state(), SessionState::Failed(_)));
    assert!(!tmp.path().join("answers.txt").exists());
}

#[test]
fn unknown_question_is_not_answered() {
    let tmp = TempDir::new().unwrap();
    let child = spawn_script(
        tmp.path(),
        "printf 'Enter selection for RRTMG (y/n): '\nread answer\n",
    );
    let config = config(BuildType::Dmpar, Nesting::Basic, "gfortran/gcc");

    let mut session = ConfigureSession::new(child, &config, policy());
    let err = session.run().unwrap_err();

    match err {
        BuildError::UnrecognizedPrompt { transcript } => assert!(transcript.contains("RRTMG")),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(session.answers().is_empty());
}

#[test]
fn silent_child_stalls_and_is_reaped() {
    let tmp = TempDir::new().unwrap();
    let child = spawn_script(tmp.path(), "printf 'Choose wisely: '\nexec sleep 30\n");
    let config = config(BuildType::Dmpar, Nesting::Basic, "gfortran/gcc");
    let quick = StallPolicy {
        poll_interval: Duration::from_millis(10),
        max_idle_polls: 20,
    };

    let mut session = ConfigureSession::new(child, &config, quick);
    let err = session.run().unwrap_err();

    match err {
        BuildError::StallTimeout(budget) => assert_eq!(budget, Duration::from_millis(200)),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(session.state(), &SessionState::Stalled);
}

#[test]
fn failing_configurator_reports_exit_code() {
    let tmp = TempDir::new().unwrap();
    let child = spawn_script(tmp.path(), "echo 'perl not found' >&2\nexit 4\n");
    let config = config(BuildType::Dmpar, Nesting::Basic, "gfortran/gcc");

    let mut session = ConfigureSession::new(child, &config, policy());
    let err = session.run().unwrap_err();

    assert!(matches!(err, BuildError::ConfigureFailed(4)));
}
