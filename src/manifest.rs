//! Per-run record written next to the source tree.
//!
//! `<source>/.wrf-builder/run-manifest.json` always describes the most recent
//! invocation: what was requested, which menu answers were sent, how many
//! compile attempts ran and how it ended.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::BuildConfiguration;
use crate::configure::DispatchedAnswer;
use crate::error::Outcome;

pub const MANIFEST_DIR: &str = ".wrf-builder";
const RUN_MANIFEST_FILENAME: &str = "run-manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: String,
    pub command: String,
    pub status: String,
    pub outcome: Option<Outcome>,
    pub build: BuildConfiguration,
    pub answers: Vec<DispatchedAnswer>,
    pub compile_attempts: Option<u32>,
    pub created_at_utc: String,
    pub finished_at_utc: Option<String>,
}

impl RunManifest {
    pub fn start(command: &str, build: &BuildConfiguration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            run_id: format!("{}-{}", compact_utc(now), std::process::id()),
            command: command.to_string(),
            status: "running".to_string(),
            outcome: None,
            build: build.clone(),
            answers: Vec::new(),
            compile_attempts: None,
            created_at_utc: rfc3339_utc(now),
            finished_at_utc: None,
        }
    }

    pub fn finish(&mut self, outcome: Outcome) {
        self.status = if outcome.is_success() {
            "success"
        } else {
            "failure"
        }
        .to_string();
        self.outcome = Some(outcome);
        self.finished_at_utc = Some(rfc3339_utc(OffsetDateTime::now_utc()));
    }
}

pub fn manifest_path(source_dir: &Path) -> PathBuf {
    source_dir.join(MANIFEST_DIR).join(RUN_MANIFEST_FILENAME)
}

pub fn write_run_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    write_json_atomic(path, manifest)
        .with_context(|| format!("writing run manifest '{}'", path.display()))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("path without parent '{}'", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("creating parent directory '{}'", parent.display()))?;
    let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
    let payload = serde_json::to_vec_pretty(value).with_context(|| "serializing run manifest")?;
    fs::write(&tmp, payload).with_context(|| format!("writing temp file '{}'", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| {
        format!(
            "renaming temp file '{}' to '{}'",
            tmp.display(),
            path.display()
        )
    })?;
    Ok(())
}

fn compact_utc(now: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn rfc3339_utc(now: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptKind;
    use tempfile::TempDir;

    #[test]
    fn finished_manifest_is_written_as_json() {
        let tmp = TempDir::new().unwrap();
        let mut manifest = RunManifest::start("configure", &BuildConfiguration::default());
        manifest.answers.push(DispatchedAnswer {
            prompt: PromptKind::Platform,
            index: "34".to_string(),
            label: Some("GNU (gfortran/gcc)".to_string()),
        });
        manifest.finish(Outcome::ConfigurationError("no option".to_string()));

        let path = manifest_path(tmp.path());
        write_run_manifest(&path, &manifest).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["outcome"]["kind"], "configuration_error");
        assert_eq!(value["outcome"]["detail"], "no option");
        assert_eq!(value["build"]["build_type"], "dmpar");
        assert_eq!(value["answers"][0]["prompt"], "platform");
        assert!(value["finished_at_utc"].is_string());
    }

    #[test]
    fn timestamps_are_utc_formatted() {
        let t = OffsetDateTime::UNIX_EPOCH;
        assert_eq!(rfc3339_utc(t), "1970-01-01T00:00:00Z");
        assert_eq!(compact_utc(t), "19700101T000000Z");
    }

    #[test]
    fn success_outcome_marks_success() {
        let mut manifest = RunManifest::start("build", &BuildConfiguration::default());
        manifest.finish(Outcome::Success);
        assert_eq!(manifest.status, "success");
    }
}
