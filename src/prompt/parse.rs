//! Option table extraction.
//!
//! Platform menu rows carry one or more `N. (mode)` pairs plus a free-text
//! label naming the OS/compiler combination, in either order:
//!
//! ```text
//!   32. (serial)  33. (smpar)  34. (dmpar)  35. (dm+sm)   GNU (gfortran/gcc)
//!    3. (gfortran/gcc): (smpar)
//! ```
//!
//! The nesting menu is a single parenthesized list of `N=name` pairs:
//!
//! ```text
//! Compile for nesting? (1=basic, 2=preset moves, 3=vortex following) [default 1]:
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::{BuildType, Nesting};
use crate::error::{BuildError, Result};

const MODE_PATTERN: &str = r"\((serial|smpar|dmpar|dm\+sm)\)";

fn menu_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^\s*\d+\..*{}(?:\s|$)", MODE_PATTERN))
            .expect("Invalid menu line regex")
    })
}

fn mode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MODE_PATTERN).expect("Invalid parallel mode regex"))
}

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)(\d+)\.(?:\s|$)").expect("Invalid menu index regex"))
}

fn nesting_group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(\s*\d+\s*=[^)]*\)").expect("Invalid nesting group regex")
    })
}

fn nesting_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*=\s*([^,)]+)").expect("Invalid nesting pair regex"))
}

/// One platform label and the menu index for each mode it offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformOption {
    pub label: String,
    /// In the order the configurator listed them.
    pub indices: Vec<(BuildType, String)>,
}

impl PlatformOption {
    pub fn index_for(&self, build_type: BuildType) -> Option<&str> {
        self.indices
            .iter()
            .find(|(mode, _)| *mode == build_type)
            .map(|(_, index)| index.as_str())
    }
}

/// Platform labels in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PlatformOptionTable {
    entries: Vec<PlatformOption>,
}

impl PlatformOptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `mode -> index` under `label`. A mode already present for the
    /// label keeps its first index.
    pub fn insert(&mut self, label: &str, mode: BuildType, index: &str) {
        let entry = match self.entries.iter().position(|e| e.label == label) {
            Some(pos) => &mut self.entries[pos],
            None => {
                self.entries.push(PlatformOption {
                    label: label.to_string(),
                    indices: Vec::new(),
                });
                let last = self.entries.len() - 1;
                &mut self.entries[last]
            }
        };
        if entry.index_for(mode).is_none() {
            entry.indices.push((mode, index.to_string()));
        }
    }

    pub fn get(&self, label: &str) -> Option<&PlatformOption> {
        self.entries.iter().find(|e| e.label == label)
    }

    pub fn entries(&self) -> &[PlatformOption] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Nesting menu keyed by option name with spaces replaced by underscores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NestingOptionTable {
    options: Vec<(String, String)>,
}

impl NestingOptionTable {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, index)| index.as_str())
    }

    pub fn index_for(&self, nesting: Nesting) -> Option<&str> {
        self.get(nesting.as_str())
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

fn parse_mode(token: &str) -> Option<BuildType> {
    BuildType::ALL.into_iter().find(|mode| mode.as_str() == token)
}

/// Extract the platform menu from `text`.
///
/// Fails with [`BuildError::UnrecognizedPrompt`] when no menu line is found.
pub fn parse_platform_options(text: &str) -> Result<PlatformOptionTable> {
    let mut table = PlatformOptionTable::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if !menu_line_re().is_match(line) {
            continue;
        }

        let indices = index_re()
            .captures_iter(line)
            .map(|caps| caps[1].to_string())
            .collect::<Vec<_>>();
        let modes = mode_re()
            .captures_iter(line)
            .filter_map(|caps| parse_mode(&caps[1]))
            .collect::<Vec<_>>();

        let stripped = index_re().replace_all(line, " ");
        let stripped = mode_re().replace_all(&stripped, " ");
        let label = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

        for (index, mode) in indices.iter().zip(modes) {
            table.insert(&label, mode, index);
        }
    }

    if table.is_empty() {
        return Err(BuildError::UnrecognizedPrompt {
            transcript: text.to_string(),
        });
    }
    Ok(table)
}

/// Extract the nesting menu from `text`.
///
/// Fails with [`BuildError::UnrecognizedPrompt`] when there is no
/// `(N=name, ...)` group.
pub fn parse_nesting_options(text: &str) -> Result<NestingOptionTable> {
    let group = nesting_group_re()
        .find(text)
        .ok_or_else(|| BuildError::UnrecognizedPrompt {
            transcript: text.to_string(),
        })?;

    let options = nesting_pair_re()
        .captures_iter(group.as_str())
        .map(|caps| (caps[2].trim().replace(' ', "_"), caps[1].to_string()))
        .collect();

    Ok(NestingOptionTable { options })
}
