//! Stack capability flags.
//!
//! Capabilities acknowledge that a template may create privileged
//! resources (IAM, for instance). A stack-level list wins over the region
//! default; an explicit empty list opts a stack out of the default.

use crate::config::StackConfig;
use crate::region::Region;
use crate::remote::StackDescription;

/// The capability flags of one declared stack.
pub struct Capabilities<'r> {
    region: &'r Region,
    config: &'r StackConfig,
}

impl<'r> Capabilities<'r> {
    pub(super) const fn new(region: &'r Region, config: &'r StackConfig) -> Self {
        Self { region, config }
    }

    /// The flags sent with create and change-set requests.
    #[must_use]
    pub fn local(&self) -> Vec<String> {
        self.config
            .capabilities
            .clone()
            .unwrap_or_else(|| self.region.defaults().capabilities.clone())
    }

    /// The flags acknowledged on the deployed stack.
    #[must_use]
    pub fn remote(description: Option<&StackDescription>) -> Vec<String> {
        description.map(|d| d.capabilities.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::RegionConfig;
    use crate::region::{Region, RegionOptions};
    use crate::remote::MockProvisioningClient;

    fn region(yaml: &str) -> Region {
        let config: RegionConfig = serde_yaml::from_str(yaml).unwrap();
        Region::new(
            "us-east-1",
            config,
            "/tmp/templates",
            RegionOptions::default(),
            Arc::new(MockProvisioningClient::new()),
        )
        .unwrap()
    }

    #[test]
    fn absent_list_falls_back_to_region_default() {
        let region = region(
            "defaults:\n  capabilities:\n    - CAPABILITY_IAM\nstacks:\n  - name: Web\n",
        );
        let stack = region.stack("Web").unwrap();
        assert_eq!(stack.capabilities().local(), vec!["CAPABILITY_IAM"]);
    }

    #[test]
    fn stack_level_list_wins() {
        let region = region(
            "defaults:\n  capabilities:\n    - CAPABILITY_IAM\nstacks:\n  - name: Web\n    capabilities:\n      - CAPABILITY_NAMED_IAM\n",
        );
        let stack = region.stack("Web").unwrap();
        assert_eq!(stack.capabilities().local(), vec!["CAPABILITY_NAMED_IAM"]);
    }

    #[test]
    fn explicit_empty_list_opts_out() {
        let region = region(
            "defaults:\n  capabilities:\n    - CAPABILITY_IAM\nstacks:\n  - name: Web\n    capabilities: []\n",
        );
        let stack = region.stack("Web").unwrap();
        assert!(stack.capabilities().local().is_empty());
    }
}
