// ============================================================================
// Linting - dangerous or non-idiomatic practices are flagged
// ============================================================================

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(nonstandard_style)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::redundant_clone)]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Formwork
//!
//! A declarative lifecycle manager for cloud infrastructure stacks.
//!
//! ## Overview
//!
//! Formwork reconciles local stack definitions against what is actually
//! deployed:
//!
//! - Declare stacks per region in YAML, with templates on disk
//! - Wire stacks together through cross-stack output references
//! - Diff local templates and parameters against the deployed state
//! - Apply updates through inspectable change sets, with destructive
//!   changes blocked unless explicitly allowed
//!
//! ## Architecture
//!
//! An invocation builds one [`region::Region`] from configuration, then
//! drives each declared [`stack::Stack`] through the same loop: gate
//! locally, submit, poll the deployed status until it settles.
//!
//! ## Modules
//!
//! - [`config`]: Project layout and region configuration
//! - [`region`]: Declared stacks and the shared client handle
//! - [`resolver`]: Cross-stack parameter resolution
//! - [`stack`]: Templates, parameters, and the create/update lifecycle
//! - [`remote`]: The provisioning API boundary
//! - [`differ`]: Unified diffs of templates and parameters
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! defaults:
//!   parameters:
//!     CidrBlock: '10.0'
//! stacks:
//!   - name: VPC
//!   - name: Web
//!     parameters:
//!       VpcId:
//!         Stack: VPC
//!         Output: VpcId
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod differ;
pub mod error;
pub mod region;
pub mod remote;
pub mod resolver;
pub mod stack;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{Project, RegionConfig, StackConfig};
pub use differ::Direction;
pub use error::{FormworkError, Result};
pub use region::{Region, RegionOptions};
pub use remote::{CloudFormationClient, ProvisioningClient};
pub use resolver::Resolver;
pub use stack::{Stack, StagedUpdate};
