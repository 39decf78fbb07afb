//! The top-level configuration file.
//!
//! One JSON document lists the managed organizations with their credential
//! blocks plus shared defaults for the declarative templates and the
//! configuration repository.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{Error, Result};
use crate::jsonnet::JsonnetConfig;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = "org-warden.json";

/// Default repository holding each organization's declarative file
pub const DEFAULT_CONFIG_REPO: &str = ".eclipsefdn";

/// Default branch of the configuration repository
pub const DEFAULT_BRANCH: &str = "main";

/// Directory inside the configuration repository holding the declaration
pub const CONFIG_DIR_IN_REPO: &str = "org-warden";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonnetDefaults {
    /// Shared template pin in `<repo>#<file>@<ref>` notation.
    #[serde(default)]
    pub base_template: Option<String>,
    /// Local directory for evaluated organization configs.
    #[serde(default)]
    pub config_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubDefaults {
    #[serde(default = "default_config_repo")]
    pub config_repo: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_config_repo() -> String {
    DEFAULT_CONFIG_REPO.to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl Default for GitHubDefaults {
    fn default() -> Self {
        Self {
            config_repo: default_config_repo(),
            default_branch: default_branch(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub jsonnet: JsonnetDefaults,
    #[serde(default)]
    pub github: GitHubDefaults,
}

/// One managed organization with its credential block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub name: String,
    pub github_id: String,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

impl OrganizationConfig {
    /// Resolves the credential block to credentials via the configured
    /// provider backend.
    pub async fn get_credentials(&self) -> Result<auth_handler::Credentials> {
        let provider_name = self
            .credentials
            .get("provider")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "organization '{}' has no credential provider configured",
                    self.name
                ))
            })?;

        let provider = auth_handler::provider_by_name(provider_name)?;

        // app authentication needs to know which organization to mint for
        let mut data = self.credentials.clone();
        data.insert(
            "github_id".to_string(),
            Value::String(self.github_id.clone()),
        );

        Ok(provider.get_credentials(&data).await?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgWardenConfig {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub organizations: Vec<OrganizationConfig>,

    /// Directory of the configuration file, basis for relative paths.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl OrgWardenConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read configuration '{}': {e}", path.display()))
        })?;

        let mut config: OrgWardenConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("malformed configuration: {e}")))?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        debug!(
            organizations = config.organizations.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn organization(&self, name: &str) -> Result<&OrganizationConfig> {
        self.organizations
            .iter()
            .find(|org| org.name == name || org.github_id == name)
            .ok_or_else(|| Error::UnknownOrganization(name.to_string()))
    }

    /// The organizations an operation runs over: the named one, or all.
    pub fn selected_organizations(&self, name: Option<&str>) -> Result<Vec<&OrganizationConfig>> {
        match name {
            Some(name) => Ok(vec![self.organization(name)?]),
            None => Ok(self.organizations.iter().collect()),
        }
    }

    pub fn jsonnet_config(&self, org: &OrganizationConfig) -> JsonnetConfig {
        let config_dir = self
            .defaults
            .jsonnet
            .config_dir
            .clone()
            .unwrap_or_else(|| "orgs".to_string());

        JsonnetConfig::new(
            self.base_dir.join(config_dir),
            org.github_id.clone(),
            self.defaults.jsonnet.base_template.clone(),
        )
    }
}
