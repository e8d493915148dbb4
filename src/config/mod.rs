//! Configuration module for the region/parameter layer.
//!
//! This module handles everything read from the project directory:
//! - Region configuration files (defaults, declared stacks)
//! - The optional environments tree and per-environment stack prefixes
//! - Parameter value shapes (scalars, lists, references)

mod parser;
mod spec;

pub use parser::Project;
pub use spec::{
    Defaults, EnvironmentConfig, EnvironmentsConfig, ParameterValue, RegionConfig, Scalar,
    StackConfig,
};
