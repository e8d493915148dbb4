//! Configuration types for the region/parameter layer.
//!
//! These types map to the `regions/<region>.yml` (or
//! `environments/<env>/<region>.yml`) files that declare a region's stacks,
//! and to the optional `environments/config.yml` that assigns per-environment
//! stack prefixes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The root structure of a region configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RegionConfig {
    /// Region-wide defaults applied to every declared stack.
    #[serde(default)]
    pub defaults: Defaults,
    /// The stacks declared in this region, in application order.
    #[serde(default)]
    pub stacks: Vec<StackConfig>,
}

/// Region-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Defaults {
    /// Default parameter values, overridable per stack.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
    /// Default capability flags for stacks that declare none.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// A single declared stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackConfig {
    /// Stack name. The region's stack prefix is applied on construction.
    pub name: String,
    /// On-disk template name; defaults to the pre-prefix stack name.
    #[serde(default)]
    pub template_name: Option<String>,
    /// Stack-level parameter overrides.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
    /// Capability flags. When absent, the region default applies;
    /// an explicit empty list opts out.
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
}

/// The root structure of `environments/config.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EnvironmentsConfig {
    /// Per-environment settings keyed by environment name.
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

/// Settings for one named environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EnvironmentConfig {
    /// Prefix applied to every stack name declared in this environment.
    #[serde(default)]
    pub prefix: String,
}

/// A parameter value as declared in configuration.
///
/// A value is either a scalar, a list of values, or a *reference*: a mapping
/// with a single top-level key naming a resolver kind. The one exception is
/// a stack-output reference, expressed as a two-key `{Stack, Output}`
/// mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParameterValue {
    /// A literal scalar value.
    Scalar(Scalar),
    /// A list of values, materialized as a comma-joined string.
    List(Vec<ParameterValue>),
    /// A reference mapping, resolved against the region.
    Reference(BTreeMap<String, serde_yaml::Value>),
}

/// A literal scalar parameter value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// Floating-point literal.
    Float(f64),
    /// String literal.
    String(String),
}

impl ParameterValue {
    /// Returns true if this value is a reference mapping.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Renders the value for log and error messages.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Scalar(s) => s.to_string(),
            other => serde_yaml::to_string(other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_else(|_| String::from("<unrenderable>")),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&serde_json::Value> for ParameterValue {
    /// Converts a template-declared default into a parameter value.
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Scalar(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || Self::Scalar(Scalar::Float(n.as_f64().unwrap_or_default())),
                |i| Self::Scalar(Scalar::Integer(i)),
            ),
            serde_json::Value::String(s) => Self::Scalar(Scalar::String(s.clone())),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            other => Self::Scalar(Scalar::String(other.to_string())),
        }
    }
}
