//! Provisioning API boundary types.
//!
//! These are the domain-level shapes the rest of the system works with; the
//! client implementation converts provider SDK types into them.

use std::collections::BTreeMap;

use serde::Serialize;

/// The description of a deployed stack.
#[derive(Debug, Clone, Serialize, Default)]
pub struct StackDescription {
    /// Remote stack name.
    pub name: String,
    /// Current lifecycle status, e.g. `CREATE_COMPLETE`.
    pub status: String,
    /// Reason attached to the current status, when the API provides one.
    pub status_reason: Option<String>,
    /// Stack description text.
    pub description: Option<String>,
    /// When the stack was created.
    pub creation_time: Option<String>,
    /// When the stack was last updated.
    pub last_updated_time: Option<String>,
    /// Output key/value pairs.
    pub outputs: BTreeMap<String, String>,
    /// Currently-deployed parameter key/value pairs.
    pub parameters: BTreeMap<String, String>,
    /// Acknowledged capability flags.
    pub capabilities: Vec<String>,
}

impl StackDescription {
    /// Returns true when the stack is in a completed state.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.contains("COMPLETE")
    }
}

/// One entry of a remotely-computed change set.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeSetEntry {
    /// Entry type reported by the API (normally `Resource`).
    pub change_type: String,
    /// Logical ID of the affected resource.
    pub logical_resource_id: String,
    /// The action the update would apply (`Add`, `Modify`, `Remove`).
    pub action: String,
    /// Whether the action replaces the resource (`"True"`, `"False"`, or a
    /// conditional marker).
    pub replacement: String,
}

impl ChangeSetEntry {
    /// Returns true if applying this entry would replace or remove the
    /// resource.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.replacement == "True" || self.action.to_ascii_lowercase().contains("remove")
    }
}

/// One stack event, as scanned during rollback diagnosis.
#[derive(Debug, Clone)]
pub struct StackEvent {
    /// Status of the affected resource, e.g. `CREATE_FAILED`.
    pub resource_status: String,
    /// Reason attached to the status, when present.
    pub resource_status_reason: Option<String>,
}

impl StackEvent {
    /// Returns true when this event records a resource failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.resource_status.ends_with("_FAILED")
    }
}

/// Input to a create-stack request.
#[derive(Debug, Clone)]
pub struct CreateStackInput {
    /// Remote stack name.
    pub stack_name: String,
    /// Raw template body.
    pub template_body: String,
    /// Fully-resolved parameter values.
    pub parameters: BTreeMap<String, String>,
    /// Capability flags to acknowledge.
    pub capabilities: Vec<String>,
}

/// Input to a create-change-set request.
#[derive(Debug, Clone)]
pub struct CreateChangeSetInput {
    /// Remote stack name.
    pub stack_name: String,
    /// Name under which the change set is staged.
    pub change_set_name: String,
    /// Raw template body.
    pub template_body: String,
    /// Fully-resolved parameter values.
    pub parameters: BTreeMap<String, String>,
    /// Capability flags to acknowledge.
    pub capabilities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: &str, replacement: &str) -> ChangeSetEntry {
        ChangeSetEntry {
            change_type: String::from("Resource"),
            logical_resource_id: String::from("WebServer"),
            action: action.to_string(),
            replacement: replacement.to_string(),
        }
    }

    #[test]
    fn replacement_is_destructive() {
        assert!(entry("Modify", "True").is_destructive());
    }

    #[test]
    fn removal_is_destructive_regardless_of_case() {
        assert!(entry("Remove", "False").is_destructive());
        assert!(entry("REMOVE", "False").is_destructive());
    }

    #[test]
    fn plain_modify_is_not_destructive() {
        assert!(!entry("Modify", "False").is_destructive());
        assert!(!entry("Add", "False").is_destructive());
    }

    #[test]
    fn conditional_replacement_is_not_gated() {
        // Only an unconditional "True" blocks; conditional replacement is
        // surfaced in the table for the operator to judge.
        assert!(!entry("Modify", "Conditional").is_destructive());
    }

    #[test]
    fn complete_status_detection() {
        let desc = StackDescription {
            status: String::from("UPDATE_COMPLETE"),
            ..StackDescription::default()
        };
        assert!(desc.is_complete());
    }
}
