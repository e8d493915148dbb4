//! Provisioning API client.
//!
//! The [`ProvisioningClient`] trait is the seam between the stack lifecycle
//! engine and the remote provisioning service. The concrete implementation
//! talks to AWS CloudFormation; tests substitute a mock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_cloudformation::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{Capability, Parameter};
use tracing::{debug, trace};

use crate::error::RemoteError;

use super::types::{
    ChangeSetEntry, CreateChangeSetInput, CreateStackInput, StackDescription, StackEvent,
};

/// Operations the provisioning service must expose.
///
/// Every method surfaces service-side validation rejections as
/// [`RemoteError::Validation`] with the service message preserved verbatim,
/// except `describe_stack`, which maps "stack does not exist" validation
/// responses to `Ok(None)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Describes a stack by name; `None` when the stack does not exist.
    async fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>, RemoteError>;

    /// Returns the most recent events for a stack, newest first.
    async fn describe_stack_events(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<StackEvent>, RemoteError>;

    /// Fetches the deployed template body.
    async fn get_template(&self, name: &str) -> Result<String, RemoteError>;

    /// Creates a new stack.
    async fn create_stack(&self, input: CreateStackInput) -> Result<(), RemoteError>;

    /// Stages a change set describing the delta an update would apply.
    async fn create_change_set(&self, input: CreateChangeSetInput) -> Result<(), RemoteError>;

    /// Reads back a staged change set. An empty list may mean the remote
    /// has not finished computing it yet.
    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Vec<ChangeSetEntry>, RemoteError>;

    /// Executes a staged change set.
    async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), RemoteError>;
}

/// CloudFormation-backed client.
#[derive(Debug, Clone)]
pub struct CloudFormationClient {
    /// Underlying SDK client.
    inner: aws_sdk_cloudformation::Client,
}

impl CloudFormationClient {
    /// Connects a client for the given region using the ambient AWS
    /// credential chain.
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self {
            inner: aws_sdk_cloudformation::Client::new(&config),
        }
    }

    /// Wraps an existing SDK client.
    #[must_use]
    pub const fn from_client(inner: aws_sdk_cloudformation::Client) -> Self {
        Self { inner }
    }
}

/// Converts an SDK error into the boundary error type.
///
/// Validation rejections are classified structurally by error code; the
/// service message is carried through unmodified so the substring rules in
/// the stack lifecycle keep working.
fn to_remote_error<E, R>(err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    let message = err
        .message()
        .map_or_else(|| format!("{err:?}"), str::to_string);
    if err.code() == Some("ValidationError") {
        RemoteError::Validation { message }
    } else {
        RemoteError::Api { message }
    }
}

fn parameters_to_sdk(parameters: &BTreeMap<String, String>) -> Vec<Parameter> {
    parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn capabilities_to_sdk(capabilities: &[String]) -> Vec<Capability> {
    capabilities
        .iter()
        .map(|c| Capability::from(c.as_str()))
        .collect()
}

impl From<&aws_sdk_cloudformation::types::Stack> for StackDescription {
    fn from(stack: &aws_sdk_cloudformation::types::Stack) -> Self {
        Self {
            name: stack.stack_name().unwrap_or_default().to_string(),
            status: stack
                .stack_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            status_reason: stack.stack_status_reason().map(str::to_string),
            description: stack.description().map(str::to_string),
            creation_time: stack.creation_time().map(ToString::to_string),
            last_updated_time: stack.last_updated_time().map(ToString::to_string),
            outputs: stack
                .outputs()
                .iter()
                .filter_map(|o| {
                    Some((o.output_key()?.to_string(), o.output_value()?.to_string()))
                })
                .collect(),
            parameters: stack
                .parameters()
                .iter()
                .filter_map(|p| {
                    Some((
                        p.parameter_key()?.to_string(),
                        p.parameter_value()?.to_string(),
                    ))
                })
                .collect(),
            capabilities: stack
                .capabilities()
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
        }
    }
}

#[async_trait]
impl ProvisioningClient for CloudFormationClient {
    async fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>, RemoteError> {
        trace!("describe_stacks: {name}");
        match self.inner.describe_stacks().stack_name(name).send().await {
            Ok(output) => Ok(output.stacks().first().map(StackDescription::from)),
            Err(err) => match to_remote_error(err) {
                // A validation rejection on describe means the stack does
                // not exist, not that the request was faulty.
                RemoteError::Validation { message } => {
                    debug!("describe_stacks for {name}: {message}");
                    Ok(None)
                }
                other => Err(other),
            },
        }
    }

    async fn describe_stack_events(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<StackEvent>, RemoteError> {
        let output = self
            .inner
            .describe_stack_events()
            .stack_name(name)
            .send()
            .await
            .map_err(to_remote_error)?;

        Ok(output
            .stack_events()
            .iter()
            .take(limit)
            .map(|event| StackEvent {
                resource_status: event
                    .resource_status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                resource_status_reason: event.resource_status_reason().map(str::to_string),
            })
            .collect())
    }

    async fn get_template(&self, name: &str) -> Result<String, RemoteError> {
        let output = self
            .inner
            .get_template()
            .stack_name(name)
            .send()
            .await
            .map_err(to_remote_error)?;

        Ok(output.template_body().unwrap_or_default().to_string())
    }

    async fn create_stack(&self, input: CreateStackInput) -> Result<(), RemoteError> {
        debug!("create_stack: {}", input.stack_name);
        self.inner
            .create_stack()
            .stack_name(&input.stack_name)
            .template_body(&input.template_body)
            .set_parameters(Some(parameters_to_sdk(&input.parameters)))
            .set_capabilities(Some(capabilities_to_sdk(&input.capabilities)))
            .send()
            .await
            .map_err(to_remote_error)?;
        Ok(())
    }

    async fn create_change_set(&self, input: CreateChangeSetInput) -> Result<(), RemoteError> {
        debug!(
            "create_change_set: {} ({})",
            input.stack_name, input.change_set_name
        );
        self.inner
            .create_change_set()
            .stack_name(&input.stack_name)
            .change_set_name(&input.change_set_name)
            .template_body(&input.template_body)
            .set_parameters(Some(parameters_to_sdk(&input.parameters)))
            .set_capabilities(Some(capabilities_to_sdk(&input.capabilities)))
            .send()
            .await
            .map_err(to_remote_error)?;
        Ok(())
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Vec<ChangeSetEntry>, RemoteError> {
        let output = self
            .inner
            .describe_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
            .map_err(to_remote_error)?;

        Ok(output
            .changes()
            .iter()
            .filter_map(|change| {
                let resource_change = change.resource_change()?;
                Some(ChangeSetEntry {
                    change_type: change
                        .r#type()
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_default(),
                    logical_resource_id: resource_change
                        .logical_resource_id()
                        .unwrap_or_default()
                        .to_string(),
                    action: resource_change
                        .action()
                        .map(|a| a.as_str().to_string())
                        .unwrap_or_default(),
                    replacement: resource_change
                        .replacement()
                        .map(|r| r.as_str().to_string())
                        .unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), RemoteError> {
        debug!("execute_change_set: {stack_name} ({change_set_name})");
        self.inner
            .execute_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
            .map_err(to_remote_error)?;
        Ok(())
    }
}
