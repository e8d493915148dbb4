//! Region: the set of declared stacks and the shared client handle.
//!
//! A region is constructed once per invocation from parsed region
//! configuration. Construction applies the configured stack prefix to every
//! declared name and records the pre-prefix name as the template name, so
//! on-disk templates stay prefix-free while remote stack names are
//! namespaced per environment.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Defaults, RegionConfig, StackConfig};
use crate::error::{ConfigError, FormworkError, Result};
use crate::remote::ProvisioningClient;
use crate::stack::Stack;

/// Region-level options.
#[derive(Debug, Clone, Default)]
pub struct RegionOptions {
    /// Prefix applied to every declared stack name.
    pub stack_prefix: String,
    /// Project root; relative file references resolve against it.
    pub project_path: PathBuf,
}

/// A region and its declared stacks.
pub struct Region {
    /// Region name (also the provider region the client talks to).
    name: String,
    /// Region-wide defaults.
    defaults: Defaults,
    /// Declared stacks with prefixes applied, in declaration order.
    stacks: Vec<StackConfig>,
    /// Directory holding template files.
    templates_path: PathBuf,
    /// Region options.
    options: RegionOptions,
    /// Shared provisioning client handle.
    client: Arc<dyn ProvisioningClient>,
}

impl Region {
    /// Builds a region from parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if two declared stacks collide after prefixing.
    pub fn new(
        name: impl Into<String>,
        config: RegionConfig,
        templates_path: impl Into<PathBuf>,
        options: RegionOptions,
        client: Arc<dyn ProvisioningClient>,
    ) -> Result<Self> {
        let mut seen = BTreeSet::new();
        let mut stacks = Vec::with_capacity(config.stacks.len());

        for mut stack in config.stacks {
            let declared_name = stack.name.clone();
            stack.name = format!("{}{}", options.stack_prefix, declared_name);
            stack.template_name.get_or_insert(declared_name);

            if !seen.insert(stack.name.clone()) {
                return Err(FormworkError::Config(ConfigError::DuplicateStack {
                    name: stack.name,
                }));
            }
            stacks.push(stack);
        }

        Ok(Self {
            name: name.into(),
            defaults: config.defaults,
            stacks,
            templates_path: templates_path.into(),
            options,
            client,
        })
    }

    /// Region name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Region-wide defaults.
    #[must_use]
    pub const fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Directory holding template files.
    #[must_use]
    pub fn templates_path(&self) -> &Path {
        &self.templates_path
    }

    /// Region options.
    #[must_use]
    pub const fn options(&self) -> &RegionOptions {
        &self.options
    }

    /// The shared provisioning client handle.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn ProvisioningClient> {
        &self.client
    }

    /// Looks up a declared stack by its post-prefix name.
    ///
    /// # Errors
    ///
    /// Fails with `StackUndeclared` when no declared stack matches; a region
    /// never fabricates an ad-hoc stack for lookups.
    pub fn stack(&self, name: &str) -> Result<Stack<'_>> {
        self.stacks
            .iter()
            .find(|s| s.name == name)
            .map(|config| Stack::new(self, config))
            .ok_or_else(|| {
                FormworkError::Config(ConfigError::StackUndeclared {
                    name: name.to_string(),
                })
            })
    }

    /// All declared stacks, in declaration order.
    #[must_use]
    pub fn stacks(&self) -> Vec<Stack<'_>> {
        self.stacks
            .iter()
            .map(|config| Stack::new(self, config))
            .collect()
    }

    /// Names of all declared stacks, in declaration order.
    #[must_use]
    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockProvisioningClient;

    fn region_with(stacks_yaml: &str, prefix: &str) -> Result<Region> {
        let config: RegionConfig = serde_yaml::from_str(stacks_yaml).unwrap();
        Region::new(
            "us-east-1",
            config,
            "/tmp/templates",
            RegionOptions {
                stack_prefix: prefix.to_string(),
                ..RegionOptions::default()
            },
            Arc::new(MockProvisioningClient::new()),
        )
    }

    #[test]
    fn lookup_is_prefix_aware() {
        let region = region_with("stacks:\n  - name: VPC\n", "Dev-").unwrap();

        assert!(region.stack("Dev-VPC").is_ok());
        let err = region.stack("VPC").map(|_| ()).unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Config(ConfigError::StackUndeclared { name }) if name == "VPC"
        ));
    }

    #[test]
    fn template_name_defaults_to_pre_prefix_name() {
        let region = region_with("stacks:\n  - name: VPC\n", "Dev-").unwrap();
        let stack = region.stack("Dev-VPC").unwrap();
        assert_eq!(stack.template_name(), "VPC");
    }

    #[test]
    fn explicit_template_name_is_kept() {
        let region = region_with(
            "stacks:\n  - name: Web\n    template_name: WebServer\n",
            "Dev-",
        )
        .unwrap();
        let stack = region.stack("Dev-Web").unwrap();
        assert_eq!(stack.template_name(), "WebServer");
    }

    #[test]
    fn duplicate_names_after_prefixing_are_rejected() {
        let err = region_with("stacks:\n  - name: VPC\n  - name: VPC\n", "Dev-")
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Config(ConfigError::DuplicateStack { name }) if name == "Dev-VPC"
        ));
    }

    #[test]
    fn stacks_preserve_declaration_order() {
        let region = region_with("stacks:\n  - name: B\n  - name: A\n", "").unwrap();
        assert_eq!(region.stack_names(), vec!["B", "A"]);
    }
}
