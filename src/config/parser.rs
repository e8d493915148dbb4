//! Project layout and configuration loading.
//!
//! A Formwork project is a directory holding `regions/<region>.yml` files and
//! a `templates/` directory. Projects that deploy the same stacks to several
//! namespaces instead use an `environments/` tree:
//! `environments/<environment>/<region>.yml` plus an
//! `environments/config.yml` assigning each environment a stack prefix.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, FormworkError, Result};

use super::spec::{EnvironmentsConfig, RegionConfig};

/// Contents written to the sample region file by `scaffold`.
const SAMPLE_REGION: &str = "defaults:\n  parameters:\n    CidrBlock: '10.0'\nstacks:\n  - name: VPC\n";

/// A Formwork project directory.
#[derive(Debug, Clone)]
pub struct Project {
    /// Root path of the project.
    path: PathBuf,
}

impl Project {
    /// Creates a project rooted at the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Root path of the project.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the templates directory.
    #[must_use]
    pub fn templates_path(&self) -> PathBuf {
        self.path.join("templates")
    }

    /// Path of the regions directory.
    #[must_use]
    pub fn regions_path(&self) -> PathBuf {
        self.path.join("regions")
    }

    /// Path of the environments directory.
    #[must_use]
    pub fn environments_path(&self) -> PathBuf {
        self.path.join("environments")
    }

    /// Returns true if this project uses the environments layout.
    #[must_use]
    pub fn has_environments(&self) -> bool {
        self.environments_path().exists()
    }

    /// Path of the region configuration file for the given region and
    /// environment.
    #[must_use]
    pub fn region_config_path(&self, region: &str, environment: &str) -> PathBuf {
        let dir = if self.has_environments() {
            self.environments_path().join(environment)
        } else {
            self.regions_path()
        };
        dir.join(format!("{region}.yml"))
    }

    /// Loads and parses the region configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unparsable; both are fatal
    /// to the whole invocation.
    pub fn load_region_config(&self, region: &str, environment: &str) -> Result<RegionConfig> {
        let path = self.region_config_path(region, environment);
        info!("Loading region configuration from: {}", path.display());

        if !path.exists() {
            return Err(FormworkError::Config(ConfigError::FileNotFound { path }));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            FormworkError::Config(ConfigError::ParseError {
                path: path.clone(),
                message: format!("Failed to read file: {e}"),
            })
        })?;

        serde_yaml::from_str(&content).map_err(|e| {
            FormworkError::Config(ConfigError::ParseError {
                path,
                message: format!("YAML parse error: {e}"),
            })
        })
    }

    /// Looks up the stack prefix configured for the given environment.
    ///
    /// Returns an empty prefix when the project has no environments layout,
    /// no `environments/config.yml`, or no entry for the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `environments/config.yml` exists but is
    /// unparsable.
    pub fn stack_prefix(&self, environment: &str) -> Result<String> {
        let config_path = self.environments_path().join("config.yml");
        if !config_path.exists() {
            return Ok(String::new());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            FormworkError::Config(ConfigError::ParseError {
                path: config_path.clone(),
                message: format!("Failed to read file: {e}"),
            })
        })?;

        let config: EnvironmentsConfig = serde_yaml::from_str(&content).map_err(|e| {
            FormworkError::Config(ConfigError::ParseError {
                path: config_path,
                message: format!("YAML parse error: {e}"),
            })
        })?;

        Ok(config
            .environments
            .get(environment)
            .map(|env| env.prefix.clone())
            .unwrap_or_default())
    }

    /// Loads the project's `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self.path.join(".env");
        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                FormworkError::Config(ConfigError::ParseError {
                    path: env_path,
                    message: format!("Failed to load .env file: {e}"),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }
        Ok(())
    }

    /// Creates the project directory structure and a sample region file.
    ///
    /// Existing directories and files are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or file cannot be created.
    pub fn scaffold(&self, region: &str) -> Result<()> {
        for dir in [self.regions_path(), self.templates_path()] {
            if !dir.exists() {
                debug!("Creating directory at {}", dir.display());
                std::fs::create_dir_all(&dir)?;
            }
        }

        let region_path = self.regions_path().join(format!("{region}.yml"));
        if !region_path.exists() {
            debug!("Creating region file at {}", region_path.display());
            std::fs::write(&region_path, SAMPLE_REGION)?;
        }

        Ok(())
    }
}
