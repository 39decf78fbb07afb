//! REST transport for the GitHub API.
//!
//! All requests go through the raw octocrab JSON methods so that request
//! bodies stay exactly the maps produced by the mapping layer; typed
//! octocrab models would silently drop or default fields that the diff
//! engine cares about.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::errors::Error;

pub mod apps;
pub mod contents;
pub mod custom_properties;
pub mod environments;
pub mod organization;
pub mod pull_requests;
pub mod repositories;
pub mod roles;
pub mod rulesets;
pub mod secrets;
pub mod teams;
pub mod variables;
pub mod webhooks;

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;

const MAX_RETRY_ATTEMPTS: u32 = 3;
const MAX_RATE_LIMIT_PAUSES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const PER_PAGE: usize = 100;

/// Thin wrapper over an authenticated octocrab client with retry,
/// backoff and rate-limit handling applied uniformly.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: octocrab::Octocrab,
}

impl RestClient {
    pub fn new(client: octocrab::Octocrab) -> Self {
        Self { client }
    }

    pub fn octocrab(&self) -> &octocrab::Octocrab {
        &self.client
    }

    /// Runs a request closure, retrying transient failures.
    ///
    /// Rate-limit exhaustion sleeps until the reported reset time and does
    /// not consume a retry attempt; 5xx and transport errors back off
    /// exponentially up to [`MAX_RETRY_ATTEMPTS`]; other 4xx fail fast.
    pub(crate) async fn with_retry<T, F, Fut>(&self, context: &str, call: F) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = octocrab::Result<T>>,
    {
        let mut attempt: u32 = 0;
        let mut rate_limit_pauses: u32 = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let mapped = Error::from_octocrab(e);
                    match &mapped {
                        Error::RateLimitExceeded if rate_limit_pauses < MAX_RATE_LIMIT_PAUSES => {
                            rate_limit_pauses += 1;
                            let delay = self.rate_limit_delay().await;
                            warn!(
                                context,
                                delay_secs = delay.as_secs(),
                                "rate limit exhausted, waiting until reset"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        _ if mapped.is_retryable() && attempt < MAX_RETRY_ATTEMPTS => {
                            attempt += 1;
                            let backoff =
                                Duration::from_millis(RETRY_BASE_DELAY_MS * (1 << attempt));
                            debug!(
                                context,
                                attempt,
                                backoff_ms = backoff.as_millis() as u64,
                                error = %mapped,
                                "transient GitHub error, retrying"
                            );
                            tokio::time::sleep(backoff).await;
                        }
                        _ => {
                            if !matches!(mapped, Error::NotFound) {
                                error!(context, error = %mapped, "GitHub request failed");
                            }
                            return Err(mapped);
                        }
                    }
                }
            }
        }
    }

    /// Time to sleep until the core rate limit resets.
    async fn rate_limit_delay(&self) -> Duration {
        let fallback = Duration::from_secs(60);

        let reset = match self.client.ratelimit().get().await {
            Ok(limit) => limit.resources.core.reset as u64,
            Err(_) => return fallback,
        };

        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(now) => {
                let now_secs = now.as_secs();
                if reset > now_secs {
                    Duration::from_secs((reset - now_secs + 1).min(3600))
                } else {
                    Duration::from_secs(1)
                }
            }
            Err(_) => fallback,
        }
    }

    pub(crate) async fn get_json(&self, route: &str) -> Result<Value, Error> {
        self.with_retry(route, || self.client.get(route, None::<&()>))
            .await
    }

    /// GET against an endpoint that answers 204 (true) / 404 (false),
    /// e.g. `/repos/{org}/{repo}/vulnerability-alerts`.
    pub(crate) async fn get_enabled_state(&self, route: &str) -> Result<bool, Error> {
        match self
            .with_retry(route, || {
                self.client.get::<Option<Value>, _, _>(route, None::<&()>)
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(Error::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn post_json(&self, route: &str, body: &Value) -> Result<Value, Error> {
        self.with_retry(route, || self.client.post(route, Some(body)))
            .await
    }

    /// POST where the response body may be empty.
    pub(crate) async fn post_empty(&self, route: &str, body: &Value) -> Result<(), Error> {
        self.with_retry(route, || {
            self.client.post::<_, Option<Value>>(route, Some(body))
        })
        .await?;
        Ok(())
    }

    pub(crate) async fn patch_json(&self, route: &str, body: &Value) -> Result<Value, Error> {
        self.with_retry(route, || self.client.patch(route, Some(body)))
            .await
    }

    pub(crate) async fn patch_empty(&self, route: &str, body: &Value) -> Result<(), Error> {
        self.with_retry(route, || {
            self.client.patch::<Option<Value>, _, _>(route, Some(body))
        })
        .await?;
        Ok(())
    }

    /// PUT treated as an idempotent upsert; both 201 and 204 are success.
    pub(crate) async fn put_json(&self, route: &str, body: &Value) -> Result<(), Error> {
        self.with_retry(route, || {
            self.client.put::<Option<Value>, _, _>(route, Some(body))
        })
        .await?;
        Ok(())
    }

    pub(crate) async fn put_json_response(&self, route: &str, body: &Value) -> Result<Value, Error> {
        self.with_retry(route, || self.client.put(route, Some(body)))
            .await
    }

    pub(crate) async fn put_no_body(&self, route: &str) -> Result<(), Error> {
        self.with_retry(route, || {
            self.client.put::<Option<Value>, _, _>(route, None::<&()>)
        })
        .await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, route: &str) -> Result<(), Error> {
        self.with_retry(route, || {
            self.client.delete::<Option<Value>, _, _>(route, None::<&()>)
        })
        .await?;
        Ok(())
    }

    /// Collects all pages of an endpoint returning a bare JSON array.
    pub(crate) async fn get_paged_array(&self, route: &str) -> Result<Vec<Value>, Error> {
        let separator = if route.contains('?') { '&' } else { '?' };
        let mut result = Vec::new();
        let mut page = 1;

        loop {
            let paged_route = format!("{route}{separator}per_page={PER_PAGE}&page={page}");
            let chunk: Vec<Value> = self
                .with_retry(&paged_route, || {
                    self.client.get(&paged_route, None::<&()>)
                })
                .await?;

            let count = chunk.len();
            result.extend(chunk);
            if count < PER_PAGE {
                return Ok(result);
            }
            page += 1;
        }
    }

    /// Collects all pages of an endpoint that wraps its items in an
    /// object, e.g. `{"total_count": 3, "secrets": [...]}`.
    pub(crate) async fn get_paged_keyed(&self, route: &str, key: &str) -> Result<Vec<Value>, Error> {
        let separator = if route.contains('?') { '&' } else { '?' };
        let mut result = Vec::new();
        let mut page = 1;

        loop {
            let paged_route = format!("{route}{separator}per_page={PER_PAGE}&page={page}");
            let response: Value = self
                .with_retry(&paged_route, || {
                    self.client.get(&paged_route, None::<&()>)
                })
                .await?;

            let chunk = response
                .get(key)
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidResponse(format!("expected '{key}' array in response"))
                })?;

            let count = chunk.len();
            result.extend(chunk);
            if count < PER_PAGE {
                return Ok(result);
            }
            page += 1;
        }
    }
}
