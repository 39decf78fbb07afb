//! Web-UI transport for settings GitHub does not expose through its APIs.
//!
//! Each screen the engine touches is an explicit adapter: the page is
//! fetched into a scraped form model, mutated, and posted back with the
//! authenticity token of the page. Sessions are scoped: a [`WebUiSession`]
//! owns its cookie jar and is never shared across tasks.

use std::collections::HashMap;
use std::sync::Arc;

use scraper::{Html, Selector};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::errors::Error;

#[cfg(test)]
#[path = "web_tests.rs"]
mod tests;

const GITHUB_WEB_ROOT: &str = "https://github.com";

/// Produces a one-time password at the moment a login form is submitted.
pub trait OtpSource: Send + Sync {
    fn otp(&self) -> Result<String, Error>;
}

/// Username and password for the web UI, with an optional TOTP source.
#[derive(Clone)]
pub struct WebCredentials {
    pub username: String,
    pub password: SecretString,
    pub otp_source: Option<Arc<dyn OtpSource>>,
}

impl std::fmt::Debug for WebCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// A boolean organization setting that only exists as a form field on one
/// of the settings screens.
struct WebSettingSpec {
    key: &'static str,
    page: &'static str,
    input_name: &'static str,
}

const WEB_SETTING_SPECS: &[WebSettingSpec] = &[
    WebSettingSpec {
        key: "members_can_change_repo_visibility",
        page: "member_privileges",
        input_name: "organization[members_can_change_repo_visibility]",
    },
    WebSettingSpec {
        key: "members_can_delete_repositories",
        page: "member_privileges",
        input_name: "organization[members_can_delete_repositories]",
    },
    WebSettingSpec {
        key: "members_can_delete_issues",
        page: "member_privileges",
        input_name: "organization[members_can_delete_issues]",
    },
    WebSettingSpec {
        key: "members_can_create_teams",
        page: "member_privileges",
        input_name: "organization[members_can_create_teams]",
    },
    WebSettingSpec {
        key: "members_can_create_public_pages",
        page: "member_privileges",
        input_name: "organization[members_can_create_public_pages]",
    },
    WebSettingSpec {
        key: "readers_can_create_discussions",
        page: "discussions",
        input_name: "organization[readers_can_create_discussions]",
    },
    WebSettingSpec {
        key: "packages_containers_public",
        page: "packages",
        input_name: "organization[packages_containers_public]",
    },
    WebSettingSpec {
        key: "packages_containers_internal",
        page: "packages",
        input_name: "organization[packages_containers_internal]",
    },
];

/// The organization settings keys that require the web client.
pub fn web_settings_keys() -> Vec<&'static str> {
    WEB_SETTING_SPECS.iter().map(|spec| spec.key).collect()
}

/// Factory for authenticated web sessions.
#[derive(Debug, Clone)]
pub struct WebClient {
    credentials: WebCredentials,
    web_root: String,
}

impl WebClient {
    pub fn new(credentials: WebCredentials) -> Self {
        Self {
            credentials,
            web_root: GITHUB_WEB_ROOT.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_web_root(credentials: WebCredentials, web_root: String) -> Self {
        Self {
            credentials,
            web_root,
        }
    }

    /// Logs in and returns a scoped session owning its cookie jar.
    #[instrument(skip(self))]
    pub async fn open_session(&self) -> Result<WebUiSession, Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent("org-warden")
            .build()
            .map_err(|e| Error::WebUi(format!("failed to build web client: {e}")))?;

        let session = WebUiSession {
            http,
            web_root: self.web_root.clone(),
        };
        session.login(&self.credentials).await?;
        Ok(session)
    }
}

/// An authenticated browser-like session against the GitHub web UI.
pub struct WebUiSession {
    http: reqwest::Client,
    web_root: String,
}

impl WebUiSession {
    async fn login(&self, credentials: &WebCredentials) -> Result<(), Error> {
        let login_page = self.fetch_page("/login").await?;
        let token = authenticity_token(&login_page)?;

        let response = self
            .http
            .post(format!("{}/session", self.web_root))
            .form(&[
                ("login", credentials.username.as_str()),
                ("password", credentials.password.expose_secret()),
                ("authenticity_token", &token),
            ])
            .send()
            .await
            .map_err(|e| Error::WebUi(format!("login request failed: {e}")))?;

        let final_path = response.url().path().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| Error::WebUi(format!("failed to read login response: {e}")))?;

        if final_path.contains("two-factor") || body.contains("app_otp") {
            self.submit_totp(credentials, &body).await?;
        } else if body.contains("Incorrect username or password") {
            return Err(Error::AuthError("incorrect username or password".to_string()));
        }

        debug!(username = credentials.username, "web UI login succeeded");
        Ok(())
    }

    async fn submit_totp(&self, credentials: &WebCredentials, page: &str) -> Result<(), Error> {
        let otp_source = credentials
            .otp_source
            .as_ref()
            .ok_or_else(|| Error::AuthError("two-factor required but no TOTP seed configured".to_string()))?;

        let token = authenticity_token(page)?;
        // the code is computed as late as possible to stay inside the
        // 30 second validity window
        let otp = otp_source.otp()?;

        let response = self
            .http
            .post(format!("{}/sessions/two-factor", self.web_root))
            .form(&[("app_otp", otp.as_str()), ("authenticity_token", &token)])
            .send()
            .await
            .map_err(|e| Error::WebUi(format!("two-factor request failed: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::WebUi(format!("failed to read two-factor response: {e}")))?;

        if body.contains("Two-factor authentication failed") {
            return Err(Error::AuthError("two-factor authentication failed".to_string()));
        }
        Ok(())
    }

    async fn fetch_page(&self, path: &str) -> Result<String, Error> {
        let response = self
            .http
            .get(format!("{}{path}", self.web_root))
            .send()
            .await
            .map_err(|e| Error::WebUi(format!("request for '{path}' failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::WebUi(format!(
                "request for '{path}' returned status {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::WebUi(format!("failed to read page '{path}': {e}")))
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<(), Error> {
        let response = self
            .http
            .post(format!("{}{path}", self.web_root))
            .form(form)
            .send()
            .await
            .map_err(|e| Error::WebUi(format!("form post to '{path}' failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::WebUi(format!(
                "form post to '{path}' returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Reads the requested web-only settings from their screens.
    #[instrument(skip(self, included_keys))]
    pub async fn get_org_settings(
        &self,
        org_id: &str,
        included_keys: &[String],
    ) -> Result<Map<String, Value>, Error> {
        let mut settings = Map::new();
        let mut pages: HashMap<&str, String> = HashMap::new();

        for spec in WEB_SETTING_SPECS {
            if !included_keys.iter().any(|key| key == spec.key) {
                continue;
            }

            if !pages.contains_key(spec.page) {
                let html = self
                    .fetch_page(&format!("/organizations/{org_id}/settings/{}", spec.page))
                    .await?;
                pages.insert(spec.page, html);
            }

            let html = &pages[spec.page];
            match parse_checkbox_state(html, spec.input_name) {
                Some(checked) => {
                    settings.insert(spec.key.to_string(), Value::Bool(checked));
                }
                None => {
                    warn!(key = spec.key, "setting not found on its settings screen, skipping");
                }
            }
        }

        Ok(settings)
    }

    /// Writes web-only settings, posting each touched screen once.
    #[instrument(skip(self, settings))]
    pub async fn update_org_settings(
        &self,
        org_id: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), Error> {
        let mut by_page: HashMap<&str, Vec<(&WebSettingSpec, bool)>> = HashMap::new();
        for spec in WEB_SETTING_SPECS {
            if let Some(value) = settings.get(spec.key).and_then(Value::as_bool) {
                by_page.entry(spec.page).or_default().push((spec, value));
            }
        }

        for (page, entries) in by_page {
            let path = format!("/organizations/{org_id}/settings/{page}");
            let html = self.fetch_page(&path).await?;
            let token = authenticity_token(&html)?;

            let mut form: Vec<(&str, &str)> = vec![
                ("_method", "put"),
                ("authenticity_token", &token),
            ];
            for (spec, value) in &entries {
                form.push((spec.input_name, if *value { "1" } else { "0" }));
            }

            self.post_form(&path, &form).await?;
            info!(org_id, page, count = entries.len(), "updated web-only settings");
        }

        Ok(())
    }

    /// Installs a GitHub App on the organization for all repositories.
    #[instrument(skip(self))]
    pub async fn install_app(&self, org_id: &str, app_slug: &str) -> Result<(), Error> {
        let path = format!("/apps/{app_slug}/installations/new/permissions?target_id={org_id}");
        let html = self.fetch_page(&path).await?;
        let token = authenticity_token(&html)?;

        self.post_form(
            &format!("/apps/{app_slug}/installations"),
            &[
                ("authenticity_token", &token),
                ("install_target", "all"),
                ("target_id", org_id),
            ],
        )
        .await?;
        info!(org_id, app_slug, "installed app");
        Ok(())
    }

    /// Uninstalls an app installation by its numeric id.
    #[instrument(skip(self))]
    pub async fn uninstall_app(&self, org_id: &str, installation_id: i64) -> Result<(), Error> {
        let path = format!("/organizations/{org_id}/settings/installations/{installation_id}");
        let html = self.fetch_page(&path).await?;
        let token = authenticity_token(&html)?;

        self.post_form(
            &path,
            &[("_method", "delete"), ("authenticity_token", &token)],
        )
        .await?;
        info!(org_id, installation_id, "uninstalled app");
        Ok(())
    }

    /// Approves a pending permission update requested by an installed app.
    #[instrument(skip(self))]
    pub async fn approve_permission_update(
        &self,
        org_id: &str,
        installation_id: i64,
    ) -> Result<(), Error> {
        let path = format!(
            "/organizations/{org_id}/settings/installations/{installation_id}/permissions/update"
        );
        let html = self.fetch_page(&path).await?;
        let token = authenticity_token(&html)?;

        self.post_form(&path, &[("authenticity_token", &token)]).await?;
        info!(org_id, installation_id, "approved app permission update");
        Ok(())
    }
}

/// Extracts the first authenticity token embedded in a page.
fn authenticity_token(html: &str) -> Result<String, Error> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"input[name="authenticity_token"]"#)
        .map_err(|e| Error::WebUi(format!("invalid selector: {e}")))?;

    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
        .ok_or_else(|| Error::WebUi("page carries no authenticity token".to_string()))
}

/// Reads the checked state of a named checkbox, `None` when the input is
/// not present on the page.
fn parse_checkbox_state(html: &str, input_name: &str) -> Option<bool> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!(r#"input[name="{input_name}"]"#)).ok()?;

    document
        .select(&selector)
        .find(|input| input.value().attr("type") == Some("checkbox"))
        .map(|input| input.value().attr("checked").is_some())
}
