//! Canonical JSON template formatting.
//!
//! Local and remote template bodies are normalized through the same
//! formatter before diffing, so formatting-only differences never show up
//! as drift. The canonical form is pretty-printed JSON with three
//! compactions applied: empty arrays, `Ref` objects, and `Fn::GetAtt`
//! objects each collapse to a single line. Formatting is idempotent.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FormworkError, Result};

static EMPTY_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\s*\[\s*\]").expect("static pattern"));

static REF_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*"Ref"\s*:\s*("[^"]*")\s*\}"#).expect("static pattern"));

static GET_ATT_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"Fn::GetAtt"\s*:\s*\[\s*("[^"]*")\s*,\s*("[^"]*")\s*\]\s*\}"#)
        .expect("static pattern")
});

/// Renders a template body in canonical form, ending with a newline.
///
/// # Errors
///
/// Fails only if the value cannot be serialized, which does not happen for
/// values parsed from JSON or YAML documents.
pub fn canonical(template: &serde_json::Value) -> Result<String> {
    let pretty = serde_json::to_string_pretty(template)
        .map_err(|e| FormworkError::internal(format!("template serialization: {e}")))?;

    let compacted = EMPTY_ARRAY.replace_all(&pretty, ": []");
    let compacted = REF_OBJECT.replace_all(&compacted, "{ \"Ref\": $1 }");
    let compacted = GET_ATT_OBJECT.replace_all(&compacted, "{ \"Fn::GetAtt\": [$1, $2] }");

    Ok(format!("{}\n", compacted.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> serde_json::Value {
        serde_json::json!({
            "Resources": {
                "Instance": {
                    "Type": "AWS::EC2::Instance",
                    "Properties": {
                        "SubnetId": { "Ref": "Subnet" },
                        "AvailabilityZone": { "Fn::GetAtt": ["Subnet", "AvailabilityZone"] },
                        "Tags": []
                    }
                }
            }
        })
    }

    #[test]
    fn ref_objects_collapse_to_one_line() {
        let out = canonical(&template()).unwrap();
        assert!(out.contains("\"SubnetId\": { \"Ref\": \"Subnet\" }"));
    }

    #[test]
    fn get_att_objects_collapse_to_one_line() {
        let out = canonical(&template()).unwrap();
        assert!(out.contains("{ \"Fn::GetAtt\": [\"Subnet\", \"AvailabilityZone\"] }"));
    }

    #[test]
    fn empty_arrays_collapse() {
        let out = canonical(&template()).unwrap();
        assert!(out.contains("\"Tags\": []"));
    }

    #[test]
    fn output_ends_with_single_newline() {
        let out = canonical(&template()).unwrap();
        assert!(out.ends_with('\n'));
        assert!(!out.ends_with("\n\n"));
    }

    #[test]
    fn formatting_is_idempotent() {
        let once = canonical(&template()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&once).unwrap();
        let twice = canonical(&parsed).unwrap();
        assert_eq!(once, twice);
    }
}
