//! Cross-stack parameter resolution.
//!
//! A [`Resolver`] turns configured parameter values into the plain strings
//! the provisioning API accepts. Scalars pass through, lists are resolved
//! element-wise and comma-joined, and references are classified by
//! [`kinds::classify`] and resolved against the region: stack-output
//! references describe the exporting stack through the shared client, file
//! references read from disk.

mod kinds;

pub use kinds::Reference;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::config::ParameterValue;
use crate::error::{FormworkError, ParameterError, Result};
use crate::region::Region;

/// Resolves configured parameter values against a region.
pub struct Resolver<'r> {
    region: &'r Region,
}

impl<'r> Resolver<'r> {
    /// Creates a resolver for the given region.
    #[must_use]
    pub const fn new(region: &'r Region) -> Self {
        Self { region }
    }

    /// Resolves a full parameter map into API-ready string values.
    ///
    /// # Errors
    ///
    /// Fails on the first value that cannot be resolved.
    pub async fn resolve_all(
        &self,
        parameters: &BTreeMap<String, ParameterValue>,
    ) -> Result<BTreeMap<String, String>> {
        let dependencies = Self::dependencies(parameters);
        if !dependencies.is_empty() {
            debug!("resolving dependencies: {}", dependencies.join(", "));
        }

        let mut resolved = BTreeMap::new();
        for (key, value) in parameters {
            resolved.insert(key.clone(), self.resolve(value).await?);
        }
        Ok(resolved)
    }

    /// Resolves a single parameter value.
    ///
    /// # Errors
    ///
    /// Classification failures surface as their specific parameter error;
    /// any failure while materializing a classified reference is wrapped as
    /// [`ParameterError::Resolution`] carrying the rendered reference.
    pub fn resolve<'a>(
        &'a self,
        value: &'a ParameterValue,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            match value {
                ParameterValue::Scalar(scalar) => Ok(scalar.to_string()),
                ParameterValue::List(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        parts.push(self.resolve(item).await?);
                    }
                    Ok(parts.join(","))
                }
                ParameterValue::Reference(map) => {
                    let reference =
                        kinds::classify(map).map_err(FormworkError::Parameter)?;
                    self.resolve_reference(&reference).await.map_err(|err| {
                        FormworkError::Parameter(ParameterError::Resolution {
                            reference: value.render(),
                            cause: err.to_string(),
                        })
                    })
                }
            }
        })
    }

    async fn resolve_reference(&self, reference: &Reference) -> Result<String> {
        match reference {
            Reference::StackOutput { stack, output } => {
                let name = format!("{}{}", self.region.options().stack_prefix, stack);
                debug!("resolving output {output} of stack {name}");
                let mut dependency = self.region.stack(&name)?;
                let outputs = dependency.outputs().await?;
                outputs.get(output).cloned().ok_or_else(|| {
                    FormworkError::Parameter(ParameterError::MissingOutput {
                        stack: name,
                        output: output.clone(),
                    })
                })
            }
            Reference::File { path } => {
                let full = {
                    let path = std::path::Path::new(path);
                    if path.is_absolute() {
                        path.to_path_buf()
                    } else {
                        self.region.options().project_path.join(path)
                    }
                };
                let contents = std::fs::read_to_string(full)?;
                Ok(contents.trim_end().to_string())
            }
        }
    }

    /// Lists the external inputs a parameter map depends on: stack-output
    /// references as `Stack.Output` strings with pre-prefix stack names,
    /// file references as `File:path` strings.
    #[must_use]
    pub fn dependencies(parameters: &BTreeMap<String, ParameterValue>) -> Vec<String> {
        let mut found = Vec::new();
        for value in parameters.values() {
            collect_dependencies(value, &mut found);
        }
        found
    }
}

fn collect_dependencies(value: &ParameterValue, found: &mut Vec<String>) {
    match value {
        ParameterValue::Scalar(_) => {}
        ParameterValue::List(items) => {
            for item in items {
                collect_dependencies(item, found);
            }
        }
        ParameterValue::Reference(map) => match kinds::classify(map) {
            Ok(Reference::StackOutput { stack, output }) => {
                found.push(format!("{stack}.{output}"));
            }
            Ok(Reference::File { path }) => found.push(format!("File:{path}")),
            Err(_) => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::sync::Arc;

    use crate::config::RegionConfig;
    use crate::region::{Region, RegionOptions};
    use crate::remote::{MockProvisioningClient, StackDescription};

    fn parameters(yaml: &str) -> BTreeMap<String, ParameterValue> {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn region(client: MockProvisioningClient, prefix: &str) -> Region {
        let config: RegionConfig =
            serde_yaml::from_str("stacks:\n  - name: VPC\n  - name: Web\n").unwrap();
        Region::new(
            "eu-west-1",
            config,
            "/tmp/templates",
            RegionOptions {
                stack_prefix: prefix.to_string(),
                ..RegionOptions::default()
            },
            Arc::new(client),
        )
        .unwrap()
    }

    fn vpc_description(prefix: &str) -> StackDescription {
        StackDescription {
            name: format!("{prefix}VPC"),
            status: String::from("CREATE_COMPLETE"),
            outputs: BTreeMap::from([(String::from("VpcId"), String::from("vpc-123"))]),
            ..StackDescription::default()
        }
    }

    #[tokio::test]
    async fn scalars_pass_through() {
        let region = region(MockProvisioningClient::new(), "");
        let resolver = Resolver::new(&region);
        let values = parameters("Size: 3\nName: web\n");

        let resolved = resolver.resolve_all(&values).await.unwrap();
        assert_eq!(resolved["Size"], "3");
        assert_eq!(resolved["Name"], "web");
    }

    #[tokio::test]
    async fn lists_are_comma_joined() {
        let region = region(MockProvisioningClient::new(), "");
        let resolver = Resolver::new(&region);
        let values = parameters("Zones:\n  - eu-west-1a\n  - eu-west-1b\n");

        let resolved = resolver.resolve_all(&values).await.unwrap();
        assert_eq!(resolved["Zones"], "eu-west-1a,eu-west-1b");
    }

    #[tokio::test]
    async fn stack_output_reference_resolves_with_prefix() {
        let mut client = MockProvisioningClient::new();
        client
            .expect_describe_stack()
            .withf(|name| name == "Dev-VPC")
            .returning(|_| Ok(Some(vpc_description("Dev-"))));

        let region = region(client, "Dev-");
        let resolver = Resolver::new(&region);
        let values = parameters("VpcId:\n  Stack: VPC\n  Output: VpcId\n");

        let resolved = resolver.resolve_all(&values).await.unwrap();
        assert_eq!(resolved["VpcId"], "vpc-123");
    }

    #[tokio::test]
    async fn missing_output_is_wrapped_with_the_rendered_reference() {
        let mut client = MockProvisioningClient::new();
        client
            .expect_describe_stack()
            .returning(|_| Ok(Some(vpc_description(""))));

        let region = region(client, "");
        let resolver = Resolver::new(&region);
        let values = parameters("SubnetId:\n  Stack: VPC\n  Output: SubnetId\n");

        let err = resolver.resolve_all(&values).await.unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Parameter(ParameterError::Resolution { reference, cause })
                if reference.contains("VPC") && cause.contains("SubnetId")
        ));
    }

    #[tokio::test]
    async fn undeclared_dependency_is_wrapped_as_resolution_failure() {
        let region = region(MockProvisioningClient::new(), "");
        let resolver = Resolver::new(&region);
        let values = parameters("DbUrl:\n  Stack: Database\n  Output: Url\n");

        let err = resolver.resolve_all(&values).await.unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Parameter(ParameterError::Resolution { .. })
        ));
    }

    #[tokio::test]
    async fn file_reference_reads_trimmed_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ssh-rsa AAAA key").unwrap();

        let region = region(MockProvisioningClient::new(), "");
        let resolver = Resolver::new(&region);
        let values = parameters(&format!("Key:\n  File: {}\n", file.path().display()));

        let resolved = resolver.resolve_all(&values).await.unwrap();
        assert_eq!(resolved["Key"], "ssh-rsa AAAA key");
    }

    #[tokio::test]
    async fn unsupported_kind_fails_loudly() {
        let region = region(MockProvisioningClient::new(), "");
        let resolver = Resolver::new(&region);
        let values = parameters("Secret:\n  Vault: secret/app\n");

        let err = resolver.resolve_all(&values).await.unwrap_err();
        assert!(matches!(
            err,
            FormworkError::Parameter(ParameterError::UnsupportedReferenceKind { kind })
                if kind == "Vault"
        ));
    }

    #[test]
    fn dependencies_walk_lists() {
        let values = parameters(
            "VpcId:\n  Stack: VPC\n  Output: VpcId\nSubnets:\n  - Stack: VPC\n    Output: SubnetA\n  - Stack: VPC\n    Output: SubnetB\n",
        );
        let mut deps = Resolver::dependencies(&values);
        deps.sort();
        assert_eq!(deps, vec!["VPC.SubnetA", "VPC.SubnetB", "VPC.VpcId"]);
    }

    #[test]
    fn dependencies_include_file_references() {
        let values = parameters(
            "Key:\n  File: keys/deploy.pub\nVpcId:\n  Stack: VPC\n  Output: VpcId\nName: web\n",
        );
        let mut deps = Resolver::dependencies(&values);
        deps.sort();
        assert_eq!(deps, vec!["File:keys/deploy.pub", "VPC.VpcId"]);
    }
}
