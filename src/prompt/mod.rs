//! Configurator prompt recognition.
//!
//! - [`parse`] - option tables extracted from raw configurator output
//! - [`resolve`] - picking the menu answer for a [`BuildConfiguration`]
//!
//! [`BuildConfiguration`]: crate::config::BuildConfiguration

pub mod parse;
pub mod resolve;

use serde::Serialize;

pub use parse::{
    parse_nesting_options, parse_platform_options, NestingOptionTable, PlatformOption,
    PlatformOptionTable,
};
pub use resolve::{resolve_nesting, resolve_platform, PlatformChoice};

/// Heads the compiler/parallelism menu.
pub const PLATFORM_MARKER: &str = "Please select from among the following";

/// Heads the nesting menu.
pub const NESTING_MARKER: &str = "Compile for nesting?";

/// Text that means the configurator is now waiting on stdin.
pub const ANSWER_TRIGGERS: &[&str] = &["Enter selection", "Compile for nesting"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Platform,
    Nesting,
}

/// Whether the accumulated output ends in a question that needs an answer.
///
/// A nesting menu whose option group has not been closed yet is still
/// arriving and does not count.
pub fn awaits_answer(text: &str) -> bool {
    ANSWER_TRIGGERS.iter().any(|trigger| text.contains(trigger)) && !nesting_group_open(text)
}

/// True when the nesting prompt has an unclosed `(` after its marker.
fn nesting_group_open(text: &str) -> bool {
    let Some(start) = text.find(NESTING_MARKER) else {
        return false;
    };
    let rest = &text[start + NESTING_MARKER.len()..];
    match rest.find('(') {
        Some(open) => !rest[open..].contains(')'),
        None => false,
    }
}

/// Classify accumulated output. Platform menu wins when both markers appear.
pub fn classify(text: &str) -> Option<PromptKind> {
    if text.contains(PLATFORM_MARKER) {
        Some(PromptKind::Platform)
    } else if text.contains(NESTING_MARKER) {
        Some(PromptKind::Nesting)
    } else {
        None
    }
}
