//! Textual and structural diff utility.
//!
//! Produces a unified diff between two serializable values or raw strings,
//! with file-header noise stripped and optional colorization. Used by the
//! template and parameter components to present local-vs-remote drift.

use std::collections::BTreeMap;

use colored::Colorize;
use similar::TextDiff;

use crate::error::Result;

/// Number of unchanged context lines around each hunk.
const CONTEXT_LINES: usize = 3;

/// Which way the diff reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Show what an update would change the remote into (new side = first
    /// argument). This is the default for `diff` and `update`.
    #[default]
    Up,
    /// Reversed: show what pulling the remote down would change locally
    /// (new side = second argument). Used by `dump`.
    Down,
}

/// Computes a unified diff between two strings.
///
/// Returns an empty string when the inputs are line-equal.
#[must_use]
pub fn diff(one: &str, two: &str, direction: Direction, color: bool) -> String {
    let (old, new) = match direction {
        Direction::Up => (two, one),
        Direction::Down => (one, two),
    };

    // Normalize trailing newlines so the last line never produces a
    // missing-newline hint in the output.
    let old = ensure_trailing_newline(old);
    let new = ensure_trailing_newline(new);

    let text_diff = TextDiff::from_lines(old.as_str(), new.as_str());
    let unified = text_diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .to_string();

    let stripped = unified.trim_end();
    if stripped.is_empty() {
        return String::new();
    }

    if color {
        colorize(stripped)
    } else {
        stripped.to_string()
    }
}

/// Computes a structural diff of two JSON-serializable values.
///
/// Both sides are pretty-printed with the host serializer (stable key
/// ordering) before diffing, so key-order-only differences vanish.
///
/// # Errors
///
/// Returns an error if either value fails to serialize.
pub fn json_diff<T: serde::Serialize>(
    one: &T,
    two: &T,
    direction: Direction,
    color: bool,
) -> Result<String> {
    let one = serde_json::to_string_pretty(one)
        .map_err(|e| crate::error::FormworkError::internal(e.to_string()))?;
    let two = serde_json::to_string_pretty(two)
        .map_err(|e| crate::error::FormworkError::internal(e.to_string()))?;
    Ok(diff(&one, &two, direction, color))
}

/// Computes a diff of two string maps rendered as sorted YAML.
///
/// # Errors
///
/// Returns an error if either map fails to serialize.
pub fn yaml_diff(
    one: &BTreeMap<String, String>,
    two: &BTreeMap<String, String>,
    direction: Direction,
    color: bool,
) -> Result<String> {
    let one = serde_yaml::to_string(one)
        .map_err(|e| crate::error::FormworkError::internal(e.to_string()))?;
    let two = serde_yaml::to_string(two)
        .map_err(|e| crate::error::FormworkError::internal(e.to_string()))?;
    Ok(diff(&one, &two, direction, color))
}

/// Colorizes a unified diff line by line.
fn colorize(unified: &str) -> String {
    unified
        .lines()
        .map(|line| {
            if line.starts_with('+') {
                line.green().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else if line.starts_with("@@") {
                line.cyan().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn ensure_trailing_newline(s: &str) -> String {
    if s.ends_with('\n') {
        s.to_string()
    } else {
        format!("{s}\n")
    }
}
