//! Provisioning API integration module.
//!
//! Defines the client trait the stack lifecycle engine depends on, the
//! boundary types it exchanges, and the CloudFormation-backed
//! implementation.

mod client;
mod types;

pub use client::{CloudFormationClient, ProvisioningClient};
pub use types::{
    ChangeSetEntry, CreateChangeSetInput, CreateStackInput, StackDescription, StackEvent,
};

#[cfg(test)]
pub use client::MockProvisioningClient;
