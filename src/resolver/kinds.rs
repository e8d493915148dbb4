//! Reference classification.
//!
//! A reference is a YAML mapping in a parameter position. The set of
//! recognized shapes is closed: a two-key `{Stack, Output}` mapping names a
//! stack output, and a single `File` key names an on-disk file. Anything
//! else is rejected up front so a typo in a reference kind fails loudly
//! instead of being silently passed through as a literal.

use std::collections::BTreeMap;

use crate::error::ParameterError;

/// A classified reference, ready for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// The value of an output exported by another declared stack.
    StackOutput {
        /// Pre-prefix name of the exporting stack.
        stack: String,
        /// Output key to read.
        output: String,
    },
    /// The trimmed contents of a local file.
    File {
        /// Path to the file, as written in configuration.
        path: String,
    },
}

/// Classifies a reference mapping.
///
/// # Errors
///
/// Fails with `MalformedReference` when the mapping shape is invalid and
/// `UnsupportedReferenceKind` when the single top-level key is not a
/// registered kind.
pub fn classify(map: &BTreeMap<String, serde_yaml::Value>) -> Result<Reference, ParameterError> {
    if map.len() == 2 && map.contains_key("Stack") && map.contains_key("Output") {
        return Ok(Reference::StackOutput {
            stack: string_field(map, "Stack")?,
            output: string_field(map, "Output")?,
        });
    }

    if map.len() != 1 {
        return Err(ParameterError::MalformedReference {
            detail: String::from("too many top-level keys"),
        });
    }

    // Length is checked above, so the iterator yields exactly one pair.
    match map.iter().next() {
        Some((kind, _)) if kind == "File" => Ok(Reference::File {
            path: string_field(map, "File")?,
        }),
        Some((kind, _)) => Err(ParameterError::UnsupportedReferenceKind {
            kind: kind.clone(),
        }),
        None => Err(ParameterError::MalformedReference {
            detail: String::from("empty mapping"),
        }),
    }
}

fn string_field(
    map: &BTreeMap<String, serde_yaml::Value>,
    key: &str,
) -> Result<String, ParameterError> {
    map.get(key)
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ParameterError::MalformedReference {
            detail: format!("'{key}' must be a string"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> BTreeMap<String, serde_yaml::Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn stack_output_pair_classifies() {
        let reference = classify(&mapping("Stack: VPC\nOutput: VpcId\n")).unwrap();
        assert_eq!(
            reference,
            Reference::StackOutput {
                stack: String::from("VPC"),
                output: String::from("VpcId"),
            }
        );
    }

    #[test]
    fn file_key_classifies() {
        let reference = classify(&mapping("File: ./keys/deploy.pub\n")).unwrap();
        assert_eq!(
            reference,
            Reference::File {
                path: String::from("./keys/deploy.pub"),
            }
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = classify(&mapping("Vault: secret/app\n")).unwrap_err();
        assert!(matches!(
            err,
            ParameterError::UnsupportedReferenceKind { kind } if kind == "Vault"
        ));
    }

    #[test]
    fn extra_keys_are_rejected() {
        let err = classify(&mapping("Stack: VPC\nOutput: VpcId\nExtra: x\n")).unwrap_err();
        assert!(matches!(err, ParameterError::MalformedReference { .. }));
    }

    #[test]
    fn non_string_field_is_rejected() {
        let err = classify(&mapping("File: [a, b]\n")).unwrap_err();
        assert!(matches!(err, ParameterError::MalformedReference { .. }));
    }
}
