//! Wrapper around the jsonnet evaluator.
//!
//! The declarative format itself is opaque to the engine: a jsonnet file
//! per organization is evaluated by the external `jsonnet` binary into the
//! JSON tree the model layer consumes. The shared base template is pinned
//! with `<repo>#<file>@<ref>` notation and vendored with jsonnet-bundler.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::errors::{Error, Result};

#[cfg(test)]
#[path = "jsonnet_tests.rs"]
mod tests;

/// A parsed `<repo>#<file>@<ref>` template pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePin {
    pub repository: String,
    pub file: String,
    pub r#ref: String,
}

impl TemplatePin {
    pub fn parse(notation: &str) -> Result<Self> {
        let (repository, rest) = notation.split_once('#').ok_or_else(|| {
            Error::Configuration(format!(
                "invalid base template '{notation}', expected '<repo>#<file>@<ref>'"
            ))
        })?;
        let (file, r#ref) = rest.split_once('@').ok_or_else(|| {
            Error::Configuration(format!(
                "invalid base template '{notation}', expected '<repo>#<file>@<ref>'"
            ))
        })?;

        if repository.is_empty() || file.is_empty() || r#ref.is_empty() {
            return Err(Error::Configuration(format!(
                "invalid base template '{notation}', expected '<repo>#<file>@<ref>'"
            )));
        }

        Ok(Self {
            repository: repository.to_string(),
            file: file.to_string(),
            r#ref: r#ref.to_string(),
        })
    }
}

/// Paths and evaluation for one organization's declarative sources.
#[derive(Debug, Clone)]
pub struct JsonnetConfig {
    config_dir: PathBuf,
    github_id: String,
    base_template: Option<String>,
}

impl JsonnetConfig {
    pub fn new(config_dir: PathBuf, github_id: String, base_template: Option<String>) -> Self {
        Self {
            config_dir,
            github_id,
            base_template,
        }
    }

    /// The organization's template directory, also the working directory
    /// for evaluation and vendoring.
    pub fn template_dir(&self) -> PathBuf {
        self.config_dir.join(&self.github_id)
    }

    /// The primary declarative file of the organization.
    pub fn org_config_file(&self) -> PathBuf {
        self.template_dir().join(format!("{}.jsonnet", self.github_id))
    }

    /// A secondary local declaration, e.g. for `local-plan --suffix`.
    pub fn org_config_file_with_suffix(&self, suffix: &str) -> PathBuf {
        self.template_dir()
            .join(format!("{}{suffix}.jsonnet", self.github_id))
    }

    pub fn base_template_pin(&self) -> Result<Option<TemplatePin>> {
        self.base_template
            .as_deref()
            .map(TemplatePin::parse)
            .transpose()
    }

    /// The import line a rendered declaration starts with.
    pub fn template_import(&self) -> Result<String> {
        match self.base_template_pin()? {
            Some(pin) => {
                let repo_name = pin.repository.rsplit('/').next().unwrap_or(&pin.repository);
                Ok(format!(
                    "local orgs = import 'vendor/{repo_name}/{}';",
                    pin.file
                ))
            }
            None => Ok("local orgs = import 'template.libsonnet';".to_string()),
        }
    }

    /// Vendors the pinned base template with jsonnet-bundler. The GitHub
    /// token is exported as GH_TOKEN for the bundler's git access.
    #[instrument(skip(self, github_token))]
    pub async fn init_template(&self, github_token: Option<&str>) -> Result<()> {
        let template_dir = self.template_dir();
        tokio::fs::create_dir_all(&template_dir).await?;

        let Some(pin) = self.base_template_pin()? else {
            debug!("no base template pinned, skipping vendoring");
            return Ok(());
        };

        let bundle = serde_json::json!({
            "version": 1,
            "dependencies": [{
                "source": {"git": {"remote": format!("https://github.com/{}", pin.repository)}},
                "version": pin.r#ref,
            }],
            "legacyImports": true,
        });
        tokio::fs::write(
            template_dir.join("jsonnetfile.json"),
            serde_json::to_string_pretty(&bundle)?,
        )
        .await?;

        let mut command = tokio::process::Command::new("jb");
        command.arg("install").current_dir(&template_dir);
        if let Some(token) = github_token {
            command.env("GH_TOKEN", token);
        }

        let output = command.output().await.map_err(|e| {
            Error::Evaluator(format!("failed to run jsonnet-bundler: {e}"))
        })?;
        if !output.status.success() {
            return Err(Error::Evaluator(format!(
                "vendoring base template failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(template = %pin.repository, r#ref = %pin.r#ref, "vendored base template");
        Ok(())
    }

    /// Evaluates a declarative file to the JSON tree of the organization.
    #[instrument(skip(self))]
    pub async fn evaluate_file(&self, file: &Path) -> Result<Value> {
        if !file.exists() {
            return Err(Error::Configuration(format!(
                "configuration file '{}' does not exist, run fetch-config or import first",
                file.display()
            )));
        }

        let output = tokio::process::Command::new("jsonnet")
            .arg("-J")
            .arg(self.template_dir())
            .arg(file)
            .output()
            .await
            .map_err(|e| Error::Evaluator(format!("failed to run jsonnet: {e}")))?;

        if !output.status.success() {
            return Err(Error::Evaluator(format!(
                "evaluation of '{}' failed: {}",
                file.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let value: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Evaluator(format!("evaluator produced invalid JSON: {e}")))?;
        debug!(file = %file.display(), "evaluated declarative file");
        Ok(value)
    }

    /// Evaluates the primary declaration.
    pub async fn evaluate_org_config(&self) -> Result<Value> {
        self.evaluate_file(&self.org_config_file()).await
    }
}
