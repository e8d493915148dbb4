//! Stack template handling.
//!
//! A [`Template`] pairs the on-disk template document with the deployed
//! body fetched through the client. JSON templates are the primary format:
//! they are parsed, given a default `AWSTemplateFormatVersion`, and
//! rendered canonically so diffs ignore formatting noise. YAML templates
//! are carried as raw text (their structure is still parsed for parameter
//! declarations) and diffed literally.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::ParameterValue;
use crate::differ::{self, Direction};
use crate::error::{FormworkError, Result, StackError, TemplateError};
use crate::remote::ProvisioningClient;

use super::formatter;

/// Default format version injected into documents that declare none.
const DEFAULT_FORMAT_VERSION: &str = "2010-09-09";

/// Extensions searched for a template, in preference order.
const EXTENSIONS: [&str; 3] = ["json", "yml", "yaml"];

/// On-disk template format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

/// A parsed local template document.
struct LocalDocument {
    /// Body as sent to the API and shown in diffs.
    body: String,
    /// Parsed structure, used for parameter declarations.
    document: serde_json::Value,
}

/// The template of one declared stack, local and remote side.
pub struct Template {
    /// Remote stack name, used when fetching the deployed body.
    stack_name: String,
    /// Template name (file stem under the templates directory).
    name: String,
    /// Directory holding template files.
    templates_path: PathBuf,
    /// Shared client handle.
    client: Arc<dyn ProvisioningClient>,
    /// Cached local document.
    local: Option<LocalDocument>,
    /// Cached remote body.
    remote: Option<String>,
}

impl Template {
    pub(super) fn new(
        stack_name: impl Into<String>,
        name: impl Into<String>,
        templates_path: impl Into<PathBuf>,
        client: Arc<dyn ProvisioningClient>,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            name: name.into(),
            templates_path: templates_path.into(),
            client,
            local: None,
            remote: None,
        }
    }

    /// Template name (file stem).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locates the template file, preferring JSON over YAML.
    ///
    /// # Errors
    ///
    /// Fails with `TemplateError::DoesNotExist` when no candidate exists.
    pub fn path(&self) -> Result<PathBuf> {
        for ext in EXTENSIONS {
            let candidate = self.templates_path.join(format!("{}.{ext}", self.name));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(FormworkError::Template(TemplateError::DoesNotExist {
            name: self.name.clone(),
            searched: self.templates_path.clone(),
        }))
    }

    /// Returns true when a template file exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path().is_ok()
    }

    /// The local template body, canonical for JSON templates.
    ///
    /// # Errors
    ///
    /// Fails when the file is absent or does not parse.
    pub fn local(&mut self) -> Result<&str> {
        Ok(&self.load_local()?.body)
    }

    /// Parameter keys the template declares, mapped to their defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file is absent or does not parse.
    pub fn declared_parameters(&mut self) -> Result<BTreeMap<String, Option<ParameterValue>>> {
        let document = &self.load_local()?.document;
        let mut declared = BTreeMap::new();
        if let Some(parameters) = document.get("Parameters").and_then(|p| p.as_object()) {
            for (key, definition) in parameters {
                declared.insert(
                    key.clone(),
                    definition.get("Default").map(ParameterValue::from),
                );
            }
        }
        Ok(declared)
    }

    /// The deployed template body, canonicalized when it parses as JSON.
    ///
    /// # Errors
    ///
    /// Validation rejections classify by message: an absent stack fails
    /// with `StackError::DoesNotExist`.
    pub async fn remote(&mut self) -> Result<&str> {
        if self.remote.is_none() {
            let raw = self
                .client
                .get_template(&self.stack_name)
                .await
                .map_err(|err| match err {
                    crate::error::RemoteError::Validation { message } => {
                        FormworkError::Stack(StackError::classify_validation(&message))
                    }
                    other => FormworkError::Remote(other),
                })?;

            let body = match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(document) => formatter::canonical(&document)?,
                Err(_) => raw,
            };
            self.remote = Some(body);
        }
        // Populated just above.
        Ok(self.remote.as_deref().unwrap_or_default())
    }

    /// Diffs the local template against the deployed one.
    ///
    /// # Errors
    ///
    /// Fails when either side cannot be loaded.
    pub async fn diff(&mut self, direction: Direction, color: bool) -> Result<String> {
        self.load_local()?;
        self.remote().await?;
        let local = self.local.as_ref().map(|l| l.body.clone()).unwrap_or_default();
        let remote = self.remote.clone().unwrap_or_default();
        Ok(differ::diff(&local, &remote, direction, color))
    }

    /// Writes a document to the template's on-disk path in canonical form.
    ///
    /// Creates `<name>.json` when no local file exists yet. The local cache
    /// is dropped so the next read sees the written document.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn write(&mut self, document: &serde_json::Value) -> Result<PathBuf> {
        let body = formatter::canonical(document)?;
        let path = self
            .path()
            .unwrap_or_else(|_| self.templates_path.join(format!("{}.json", self.name)));
        std::fs::write(&path, body)?;
        self.local = None;
        Ok(path)
    }

    /// Writes the deployed template body over the local file.
    ///
    /// Creates `<name>.json` when no local file exists yet. The local cache
    /// is dropped so the next read sees the written document.
    ///
    /// # Errors
    ///
    /// Fails when the remote body cannot be fetched or the file written.
    pub async fn dump(&mut self) -> Result<PathBuf> {
        let body = self.remote().await?.to_string();
        let path = self
            .path()
            .unwrap_or_else(|_| self.templates_path.join(format!("{}.json", self.name)));
        debug!("writing deployed template to {}", path.display());
        std::fs::write(&path, body)?;
        self.local = None;
        Ok(path)
    }

    /// Drops the cached remote body.
    pub fn invalidate_remote(&mut self) {
        self.remote = None;
    }

    fn load_local(&mut self) -> Result<&LocalDocument> {
        if self.local.is_none() {
            let path = self.path()?;
            let raw = std::fs::read_to_string(&path)?;
            let format = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => Format::Json,
                _ => Format::Yaml,
            };

            let mut document: serde_json::Value = match format {
                Format::Json => serde_json::from_str(&raw).map_err(|e| {
                    FormworkError::Template(TemplateError::Syntax {
                        path: path.clone(),
                        detail: e.to_string(),
                    })
                })?,
                Format::Yaml => serde_yaml::from_str(&raw).map_err(|e| {
                    FormworkError::Template(TemplateError::Syntax {
                        path: path.clone(),
                        detail: e.to_string(),
                    })
                })?,
            };

            if let Some(map) = document.as_object_mut() {
                map.entry("AWSTemplateFormatVersion")
                    .or_insert_with(|| serde_json::Value::String(DEFAULT_FORMAT_VERSION.into()));
            }

            let body = match format {
                Format::Json => formatter::canonical(&document)?,
                Format::Yaml => raw,
            };
            self.local = Some(LocalDocument { body, document });
        }
        // Populated just above.
        self.local
            .as_ref()
            .ok_or_else(|| FormworkError::internal("local template cache"))
    }
}
