//! Stack lifecycle engine.
//!
//! A [`Stack`] ties one declared stack to its template, parameters, and
//! capability flags, and drives the create/update state machine against the
//! provisioning API: gate locally, submit, then poll the deployed status
//! until it settles. Updates go through a named change set so destructive
//! changes can be inspected and blocked before anything executes.

mod capabilities;
mod formatter;
mod parameters;
mod template;

pub use capabilities::Capabilities;
pub use parameters::Parameters;
pub use template::Template;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StackConfig;
use crate::differ::Direction;
use crate::error::{FormworkError, RemoteError, Result, StackError};
use crate::region::Region;
use crate::remote::{ChangeSetEntry, CreateChangeSetInput, CreateStackInput, StackDescription};

/// Seconds between status polls.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Grace period after executing a change set, before the first poll. The
/// status read straight after execution can still show the pre-update
/// state.
const SETTLE_DELAY: Duration = Duration::from_secs(4);

/// Attempts to read back a freshly-created change set.
const CHANGE_SET_ATTEMPTS: u32 = 6;

/// How many recent events are scanned for the failure reason.
const EVENT_SCAN_LIMIT: usize = 30;

/// Statuses at which polling stops.
static TERMINAL_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(ROLLBACK|CREATE|UPDATE)_(COMPLETE|FAILED)").expect("static pattern")
});

/// A change set that has been staged but not executed.
#[derive(Debug, Clone)]
pub struct StagedUpdate {
    /// Generated change-set name.
    pub name: String,
    /// The changes the update would apply.
    pub entries: Vec<ChangeSetEntry>,
}

impl StagedUpdate {
    /// The entries that would replace or remove a resource.
    #[must_use]
    pub fn destructive_entries(&self) -> Vec<&ChangeSetEntry> {
        self.entries.iter().filter(|e| e.is_destructive()).collect()
    }
}

/// Cached remote description, valid until explicitly invalidated.
#[derive(Default)]
struct RemoteCache {
    /// `None` means not fetched; `Some(None)` means fetched and absent.
    description: Option<Option<StackDescription>>,
}

impl RemoteCache {
    fn invalidate(&mut self) {
        self.description = None;
    }
}

/// One declared stack, bound to its region for an invocation.
pub struct Stack<'r> {
    region: &'r Region,
    config: &'r StackConfig,
    template: Template,
    parameters: Parameters<'r>,
    cache: RemoteCache,
}

impl<'r> Stack<'r> {
    pub(crate) fn new(region: &'r Region, config: &'r StackConfig) -> Self {
        let template_name = config.template_name.as_deref().unwrap_or(config.name.as_str());
        Self {
            region,
            config,
            template: Template::new(
                &config.name,
                template_name,
                region.templates_path(),
                Arc::clone(region.client()),
            ),
            parameters: Parameters::new(region, config),
            cache: RemoteCache::default(),
        }
    }

    /// Remote stack name (prefix applied).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Template name (file stem).
    #[must_use]
    pub fn template_name(&self) -> &str {
        self.template.name()
    }

    /// The stack's template, for direct access (diff, dump).
    pub fn template_mut(&mut self) -> &mut Template {
        &mut self.template
    }

    /// The stack's capability flags.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities<'r> {
        Capabilities::new(self.region, self.config)
    }

    /// Drops all remote caches, forcing the next read to re-fetch.
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
        self.template.invalidate_remote();
    }

    /// Describes the deployed stack, cached until invalidated.
    ///
    /// # Errors
    ///
    /// Fails on API errors other than "stack does not exist".
    pub async fn describe(&mut self) -> Result<Option<StackDescription>> {
        if self.cache.description.is_none() {
            let described = self
                .region
                .client()
                .describe_stack(&self.config.name)
                .await
                .map_err(FormworkError::Remote)?;
            self.cache.description = Some(described);
        }
        Ok(self.cache.description.clone().flatten())
    }

    /// Returns true when the stack is deployed.
    ///
    /// # Errors
    ///
    /// Fails on API errors.
    pub async fn exists(&mut self) -> Result<bool> {
        Ok(self.describe().await?.is_some())
    }

    /// The deployed status, or `None` when the stack is not deployed.
    ///
    /// # Errors
    ///
    /// Fails on API errors.
    pub async fn status(&mut self) -> Result<Option<String>> {
        Ok(self.describe().await?.map(|d| d.status))
    }

    /// The deployed outputs. Empty unless the stack is in a completed
    /// state, so half-applied stacks never feed values downstream.
    ///
    /// # Errors
    ///
    /// Fails with `StackError::DoesNotExist` when the stack is not
    /// deployed.
    pub async fn outputs(&mut self) -> Result<BTreeMap<String, String>> {
        let description = self.describe().await?.ok_or_else(|| {
            FormworkError::Stack(StackError::DoesNotExist {
                message: format!("Stack '{}' does not exist", self.config.name),
            })
        })?;

        if description.is_complete() {
            Ok(description.outputs)
        } else {
            Ok(BTreeMap::new())
        }
    }

    /// The deployed parameter values, empty when not deployed.
    ///
    /// # Errors
    ///
    /// Fails on API errors.
    pub async fn remote_parameters(&mut self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .describe()
            .await?
            .map(|d| d.parameters)
            .unwrap_or_default())
    }

    /// Diffs the local template against the deployed one.
    ///
    /// # Errors
    ///
    /// Fails when either side cannot be loaded.
    pub async fn template_diff(&mut self, direction: Direction, color: bool) -> Result<String> {
        self.template.diff(direction, color).await
    }

    /// Diffs resolved local parameters against the deployed ones.
    ///
    /// # Errors
    ///
    /// Fails when resolution or the describe call fails.
    pub async fn parameter_diff(&mut self, direction: Direction, color: bool) -> Result<String> {
        let remote = self.remote_parameters().await?;
        self.parameters
            .diff(&mut self.template, &remote, direction, color)
            .await
    }

    /// Declared parameter keys that no source provides a value for.
    ///
    /// # Errors
    ///
    /// Fails when the template cannot be loaded.
    pub fn missing_parameters(&mut self) -> Result<Vec<String>> {
        self.parameters.missing(&mut self.template)
    }

    /// Creates the stack and waits for it to settle.
    ///
    /// Missing parameters are checked before anything leaves the process.
    /// Creating a stack that already exists logs a warning and is a no-op.
    ///
    /// # Errors
    ///
    /// Fails with `MissingParameters`, on resolution failures, or when the
    /// create rolls back.
    pub async fn create(&mut self) -> Result<()> {
        let missing = self.parameters.missing(&mut self.template)?;
        if !missing.is_empty() {
            return Err(FormworkError::Stack(StackError::MissingParameters {
                names: missing,
            }));
        }

        if self.exists().await? {
            warn!("stack {} already exists, nothing to create", self.name());
            return Ok(());
        }

        let input = CreateStackInput {
            stack_name: self.config.name.clone(),
            template_body: self.template.local()?.to_string(),
            parameters: self.parameters.resolved(&mut self.template).await?.clone(),
            capabilities: self.capabilities().local(),
        };

        info!("creating stack {}", self.name());
        self.region
            .client()
            .create_stack(input)
            .await
            .map_err(classify_remote)?;

        self.wait_until_terminal().await?;
        Ok(())
    }

    /// Stages an update as a named change set and reads it back.
    ///
    /// # Errors
    ///
    /// Fails with `MissingParameters` before any remote call, `UpToDate`
    /// when the API reports nothing to change, and `ChangeSetUnavailable`
    /// when the change set never becomes readable.
    pub async fn stage_update(&mut self) -> Result<StagedUpdate> {
        let missing = self.parameters.missing(&mut self.template)?;
        if !missing.is_empty() {
            return Err(FormworkError::Stack(StackError::MissingParameters {
                names: missing,
            }));
        }

        let name = format!("formwork-{}", Uuid::new_v4());
        let input = CreateChangeSetInput {
            stack_name: self.config.name.clone(),
            change_set_name: name.clone(),
            template_body: self.template.local()?.to_string(),
            parameters: self.parameters.resolved(&mut self.template).await?.clone(),
            capabilities: self.capabilities().local(),
        };

        info!("staging change set {name} for {}", self.name());
        self.region
            .client()
            .create_change_set(input)
            .await
            .map_err(classify_remote)?;

        for attempt in 1..=CHANGE_SET_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(u64::from(attempt) * 3)).await;
            let entries = self
                .region
                .client()
                .describe_change_set(&self.config.name, &name)
                .await
                .map_err(classify_remote)?;
            if !entries.is_empty() {
                return Ok(StagedUpdate { name, entries });
            }
            debug!("change set {name} not readable yet (attempt {attempt})");
        }

        Err(FormworkError::Stack(StackError::ChangeSetUnavailable {
            attempts: CHANGE_SET_ATTEMPTS,
        }))
    }

    /// Executes a staged change set and waits for the stack to settle.
    ///
    /// # Errors
    ///
    /// Fails with `PolicyViolation` before executing when the change set
    /// contains a destructive entry and `allow_destructive` is false, or
    /// when the update rolls back.
    pub async fn execute_update(
        &mut self,
        staged: &StagedUpdate,
        allow_destructive: bool,
    ) -> Result<()> {
        if !allow_destructive {
            if let Some(entry) = staged.entries.iter().find(|e| e.is_destructive()) {
                return Err(FormworkError::Stack(StackError::PolicyViolation {
                    reason: format!(
                        "destructive change to '{}' (action {}, replacement {})",
                        entry.logical_resource_id, entry.action, entry.replacement
                    ),
                }));
            }
        }

        info!("executing change set {} on {}", staged.name, self.name());
        self.region
            .client()
            .execute_change_set(&self.config.name, &staged.name)
            .await
            .map_err(classify_remote)?;

        tokio::time::sleep(SETTLE_DELAY).await;
        self.wait_until_terminal().await?;
        Ok(())
    }

    /// Polls the deployed status until it settles.
    async fn wait_until_terminal(&mut self) -> Result<String> {
        loop {
            self.invalidate();
            let Some(description) = self.describe().await? else {
                return Err(FormworkError::Stack(StackError::DoesNotExist {
                    message: format!("Stack '{}' does not exist", self.config.name),
                }));
            };

            let status = description.status;

            // A rollback under way already tells us the operation failed;
            // surface the failing event instead of waiting it out.
            if status.contains("ROLLBACK_IN_PROGRESS") {
                return Err(self.failure_from_events(&status).await);
            }

            if TERMINAL_STATUS.is_match(&status) {
                if status == "CREATE_COMPLETE" || status == "UPDATE_COMPLETE" {
                    info!("{}: {status}", self.name());
                    return Ok(status);
                }
                return Err(self.failure_from_events(&status).await);
            }

            debug!("{}: {status}", self.name());
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Derives the operation error from recent stack events.
    ///
    /// The terminal rollback status carries no reason of its own, so the
    /// most recent resource failure supplies it. A reason mentioning the
    /// stack policy classifies as a policy violation.
    async fn failure_from_events(&self, status: &str) -> FormworkError {
        let events = self
            .region
            .client()
            .describe_stack_events(&self.config.name, EVENT_SCAN_LIMIT)
            .await
            .unwrap_or_default();

        let reason = events
            .iter()
            .find(|e| e.is_failure())
            .and_then(|e| e.resource_status_reason.clone())
            .unwrap_or_else(|| status.to_string());

        if reason.to_ascii_lowercase().contains("stack policy") {
            FormworkError::Stack(StackError::PolicyViolation { reason })
        } else {
            FormworkError::Stack(StackError::Remote { message: reason })
        }
    }

    #[cfg(test)]
    pub(crate) fn parts_for_test(&mut self) -> (&mut Parameters<'r>, &mut Template) {
        (&mut self.parameters, &mut self.template)
    }
}

/// Maps a boundary error into the lifecycle taxonomy: validation messages
/// classify by content, everything else stays an API error.
fn classify_remote(err: RemoteError) -> FormworkError {
    match err {
        RemoteError::Validation { message } => {
            FormworkError::Stack(StackError::classify_validation(&message))
        }
        other => FormworkError::Remote(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::RegionConfig;
    use crate::region::RegionOptions;
    use crate::remote::{MockProvisioningClient, StackEvent};

    fn region(yaml: &str, client: MockProvisioningClient, dir: &Path) -> Region {
        let config: RegionConfig = serde_yaml::from_str(yaml).unwrap();
        Region::new(
            "us-east-1",
            config,
            dir,
            RegionOptions::default(),
            Arc::new(client),
        )
        .unwrap()
    }

    fn write_template(dir: &Path, body: &str) {
        std::fs::write(dir.join("Web.json"), body).unwrap();
    }

    fn described(status: &str) -> StackDescription {
        StackDescription {
            name: String::from("Web"),
            status: status.to_string(),
            ..StackDescription::default()
        }
    }

    #[tokio::test]
    async fn create_with_missing_parameters_makes_no_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            r#"{ "Parameters": { "KeyName": { "Type": "String" } } }"#,
        );

        // No expectations: any client call would panic the test.
        let region = region(
            "stacks:\n  - name: Web\n",
            MockProvisioningClient::new(),
            dir.path(),
        );
        let mut stack = region.stack("Web").unwrap();

        let err = stack.create().await.unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Stack(StackError::MissingParameters { names }) if names == ["KeyName"]
        ));
    }

    #[tokio::test]
    async fn create_of_existing_stack_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), r#"{ "Resources": {} }"#);

        let mut client = MockProvisioningClient::new();
        client
            .expect_describe_stack()
            .times(1)
            .returning(|_| Ok(Some(described("CREATE_COMPLETE"))));

        let region = region("stacks:\n  - name: Web\n", client, dir.path());
        let mut stack = region.stack("Web").unwrap();

        stack.create().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn create_polls_until_complete() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), r#"{ "Resources": {} }"#);

        let mut client = MockProvisioningClient::new();
        let calls = AtomicUsize::new(0);
        client.expect_describe_stack().returning(move |_| {
            Ok(match calls.fetch_add(1, Ordering::SeqCst) {
                0 => None,
                1 => Some(described("CREATE_IN_PROGRESS")),
                _ => Some(described("CREATE_COMPLETE")),
            })
        });
        client.expect_create_stack().times(1).returning(|_| Ok(()));

        let region = region("stacks:\n  - name: Web\n", client, dir.path());
        let mut stack = region.stack("Web").unwrap();

        stack.create().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_change_set_exhausts_retries() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), r#"{ "Resources": {} }"#);

        let mut client = MockProvisioningClient::new();
        client
            .expect_create_change_set()
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_describe_change_set()
            .times(6)
            .returning(|_, _| Ok(vec![]));

        let region = region("stacks:\n  - name: Web\n", client, dir.path());
        let mut stack = region.stack("Web").unwrap();

        let err = stack.stage_update().await.unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Stack(StackError::ChangeSetUnavailable { attempts: 6 })
        ));
    }

    #[tokio::test]
    async fn up_to_date_classification_on_staging() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), r#"{ "Resources": {} }"#);

        let mut client = MockProvisioningClient::new();
        client.expect_create_change_set().returning(|_| {
            Err(RemoteError::Validation {
                message: String::from("No updates are to be performed."),
            })
        });

        let region = region("stacks:\n  - name: Web\n", client, dir.path());
        let mut stack = region.stack("Web").unwrap();

        let err = stack.stage_update().await.unwrap_err();
        assert!(matches!(err, FormworkError::Stack(StackError::UpToDate { .. })));
    }

    #[tokio::test]
    async fn destructive_entry_blocks_before_execution() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), r#"{ "Resources": {} }"#);

        // No execute expectation: reaching the API would panic the test.
        let region = region(
            "stacks:\n  - name: Web\n",
            MockProvisioningClient::new(),
            dir.path(),
        );
        let mut stack = region.stack("Web").unwrap();

        let staged = StagedUpdate {
            name: String::from("formwork-test"),
            entries: vec![ChangeSetEntry {
                change_type: String::from("Resource"),
                logical_resource_id: String::from("Database"),
                action: String::from("Modify"),
                replacement: String::from("True"),
            }],
        };

        let err = stack.execute_update(&staged, false).await.unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Stack(StackError::PolicyViolation { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn allowed_destructive_update_executes() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), r#"{ "Resources": {} }"#);

        let mut client = MockProvisioningClient::new();
        client
            .expect_execute_change_set()
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_describe_stack()
            .returning(|_| Ok(Some(described("UPDATE_COMPLETE"))));

        let region = region("stacks:\n  - name: Web\n", client, dir.path());
        let mut stack = region.stack("Web").unwrap();

        let staged = StagedUpdate {
            name: String::from("formwork-test"),
            entries: vec![ChangeSetEntry {
                change_type: String::from("Resource"),
                logical_resource_id: String::from("Database"),
                action: String::from("Remove"),
                replacement: String::from("False"),
            }],
        };

        stack.execute_update(&staged, true).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_with_policy_reason_classifies() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), r#"{ "Resources": {} }"#);

        let mut client = MockProvisioningClient::new();
        client
            .expect_execute_change_set()
            .returning(|_, _| Ok(()));
        client
            .expect_describe_stack()
            .returning(|_| Ok(Some(described("UPDATE_ROLLBACK_COMPLETE"))));
        client.expect_describe_stack_events().returning(|_, _| {
            Ok(vec![
                StackEvent {
                    resource_status: String::from("UPDATE_COMPLETE"),
                    resource_status_reason: None,
                },
                StackEvent {
                    resource_status: String::from("UPDATE_FAILED"),
                    resource_status_reason: Some(String::from(
                        "Action denied by stack policy",
                    )),
                },
            ])
        });

        let region = region("stacks:\n  - name: Web\n", client, dir.path());
        let mut stack = region.stack("Web").unwrap();

        let staged = StagedUpdate {
            name: String::from("formwork-test"),
            entries: vec![],
        };

        let err = stack.execute_update(&staged, true).await.unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Stack(StackError::PolicyViolation { reason })
                if reason.contains("stack policy")
        ));
    }

    #[tokio::test]
    async fn outputs_are_empty_while_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockProvisioningClient::new();
        client.expect_describe_stack().returning(|_| {
            Ok(Some(StackDescription {
                status: String::from("UPDATE_IN_PROGRESS"),
                outputs: BTreeMap::from([(String::from("VpcId"), String::from("vpc-1"))]),
                ..StackDescription::default()
            }))
        });

        let region = region("stacks:\n  - name: Web\n", client, dir.path());
        let mut stack = region.stack("Web").unwrap();

        assert!(stack.outputs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn describe_is_cached_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockProvisioningClient::new();
        client
            .expect_describe_stack()
            .times(2)
            .returning(|_| Ok(Some(described("CREATE_COMPLETE"))));

        let region = region("stacks:\n  - name: Web\n", client, dir.path());
        let mut stack = region.stack("Web").unwrap();

        stack.describe().await.unwrap();
        stack.describe().await.unwrap();
        stack.invalidate();
        stack.describe().await.unwrap();
    }
}
