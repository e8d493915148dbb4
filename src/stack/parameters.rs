//! Stack parameter merging and resolution.
//!
//! Effective parameters are assembled per template-declared key with a
//! strict precedence: stack-level override, then region default, then the
//! template's own default. Keys the template does not declare are never
//! sent, so a region-wide default only applies to the stacks whose
//! templates ask for it.

use std::collections::BTreeMap;

use crate::config::{ParameterValue, StackConfig};
use crate::differ::{self, Direction};
use crate::error::Result;
use crate::region::Region;
use crate::resolver::Resolver;

use super::template::Template;

/// The parameter set of one declared stack.
pub struct Parameters<'r> {
    region: &'r Region,
    config: &'r StackConfig,
    /// Memoized resolved values, valid for one invocation.
    resolved: Option<BTreeMap<String, String>>,
}

impl<'r> Parameters<'r> {
    pub(super) const fn new(region: &'r Region, config: &'r StackConfig) -> Self {
        Self {
            region,
            config,
            resolved: None,
        }
    }

    /// The effective local parameter values, merged by precedence and
    /// restricted to template-declared keys. Values are still unresolved.
    ///
    /// # Errors
    ///
    /// Fails when the template cannot be loaded.
    pub fn local(&self, template: &mut Template) -> Result<BTreeMap<String, ParameterValue>> {
        let declared = template.declared_parameters()?;
        let defaults = &self.region.defaults().parameters;

        let mut merged = BTreeMap::new();
        for (key, template_default) in declared {
            let value = self
                .config
                .parameters
                .get(&key)
                .or_else(|| defaults.get(&key))
                .cloned()
                .or(template_default);
            if let Some(value) = value {
                merged.insert(key, value);
            }
        }
        Ok(merged)
    }

    /// Declared parameter keys with no value from any source.
    ///
    /// # Errors
    ///
    /// Fails when the template cannot be loaded.
    pub fn missing(&self, template: &mut Template) -> Result<Vec<String>> {
        let declared = template.declared_parameters()?;
        let merged = self.local(template)?;
        Ok(declared
            .into_keys()
            .filter(|key| !merged.contains_key(key))
            .collect())
    }

    /// The fully-resolved parameter values, memoized for the invocation.
    ///
    /// # Errors
    ///
    /// Fails when the template cannot be loaded or a reference does not
    /// resolve.
    pub async fn resolved(
        &mut self,
        template: &mut Template,
    ) -> Result<&BTreeMap<String, String>> {
        if self.resolved.is_none() {
            let local = self.local(template)?;
            let resolver = Resolver::new(self.region);
            self.resolved = Some(resolver.resolve_all(&local).await?);
        }
        // Populated just above.
        Ok(self.resolved.get_or_insert_with(BTreeMap::new))
    }

    /// Diffs resolved local values against the deployed ones, rendered as
    /// sorted YAML.
    ///
    /// # Errors
    ///
    /// Fails when resolution fails.
    pub async fn diff(
        &mut self,
        template: &mut Template,
        remote: &BTreeMap<String, String>,
        direction: Direction,
        color: bool,
    ) -> Result<String> {
        let resolved = self.resolved(template).await?.clone();
        differ::yaml_diff(&resolved, remote, direction, color)
    }
}
