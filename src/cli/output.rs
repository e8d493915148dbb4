//! Output formatting for CLI commands.
//!
//! Formatting utilities for change-set tables, status coloring, and the
//! confirmation prompt.

use std::io::Write;

use colored::Colorize;
use tabled::{Table, Tabled};

use crate::error::Result;
use crate::remote::{ChangeSetEntry, StackDescription};

/// Change-set row for table display.
#[derive(Tabled)]
struct ChangeSetRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Replacement")]
    replacement: String,
}

/// Formats a change set as a table, destructive entries in red.
#[must_use]
pub fn change_set_table(entries: &[ChangeSetEntry]) -> String {
    let rows: Vec<ChangeSetRow> = entries
        .iter()
        .map(|entry| {
            let destructive = entry.is_destructive();
            let paint = |s: &str| {
                if destructive {
                    s.red().to_string()
                } else {
                    s.to_string()
                }
            };
            ChangeSetRow {
                action: paint(&entry.action),
                resource: paint(&entry.logical_resource_id),
                replacement: paint(&entry.replacement),
            }
        })
        .collect();

    Table::new(rows).to_string()
}

/// Colors a deployed status by its outcome.
#[must_use]
pub fn colored_status(status: &str) -> String {
    if status.contains("FAILED") || status.contains("ROLLBACK") {
        status.red().to_string()
    } else if status.contains("IN_PROGRESS") {
        status.yellow().to_string()
    } else if status.contains("COMPLETE") {
        status.green().to_string()
    } else {
        status.to_string()
    }
}

/// Renders the deployed details of one stack.
#[must_use]
pub fn stack_details(description: &StackDescription) -> String {
    let mut out = format!(
        "{}\n  Status: {}\n",
        description.name.bold(),
        colored_status(&description.status)
    );
    if let Some(reason) = &description.status_reason {
        out.push_str(&format!("  Reason: {reason}\n"));
    }
    if let Some(created) = &description.creation_time {
        out.push_str(&format!("  Created: {created}\n"));
    }
    if let Some(updated) = &description.last_updated_time {
        out.push_str(&format!("  Updated: {updated}\n"));
    }
    if !description.capabilities.is_empty() {
        out.push_str(&format!(
            "  Capabilities: {}\n",
            description.capabilities.join(", ")
        ));
    }
    if !description.parameters.is_empty() {
        out.push_str("  Parameters:\n");
        for (key, value) in &description.parameters {
            out.push_str(&format!("    {key}: {value}\n"));
        }
    }
    if !description.outputs.is_empty() {
        out.push_str("  Outputs:\n");
        for (key, value) in &description.outputs {
            out.push_str(&format!("    {key}: {value}\n"));
        }
    }
    out
}

/// Asks the operator for confirmation on stderr.
///
/// # Errors
///
/// Returns an error if stdin or stderr is unavailable.
pub fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N]: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn change_set_table_lists_every_entry() {
        let entries = vec![
            ChangeSetEntry {
                change_type: String::from("Resource"),
                logical_resource_id: String::from("WebServer"),
                action: String::from("Modify"),
                replacement: String::from("False"),
            },
            ChangeSetEntry {
                change_type: String::from("Resource"),
                logical_resource_id: String::from("Database"),
                action: String::from("Remove"),
                replacement: String::from("True"),
            },
        ];

        colored::control::set_override(false);
        let table = change_set_table(&entries);
        assert!(table.contains("WebServer"));
        assert!(table.contains("Database"));
        assert!(table.contains("Remove"));
    }

    #[test]
    fn details_include_outputs_and_parameters() {
        colored::control::set_override(false);
        let description = StackDescription {
            name: String::from("Dev-VPC"),
            status: String::from("CREATE_COMPLETE"),
            outputs: BTreeMap::from([(String::from("VpcId"), String::from("vpc-1"))]),
            parameters: BTreeMap::from([(String::from("CidrBlock"), String::from("10.0"))]),
            ..StackDescription::default()
        };

        let out = stack_details(&description);
        assert!(out.contains("VpcId: vpc-1"));
        assert!(out.contains("CidrBlock: 10.0"));
        assert!(out.contains("CREATE_COMPLETE"));
    }
}
