//! Coordinator client utilities.
//!
//! This crate owns every network conversation with the workflow coordinator.
//! It focuses on:
//!
//! - Constructing an HTTP client with sensible defaults
//! - Reading credentials from `GALLEY_API_TOKEN`
//! - Validating `GALLEY_API_BASE` for safety
//! - Building requests with a consistent User-Agent and Accept headers
//! - Starting executions idempotently (see [`starter`])
//!
//! The decision engine itself never touches this crate; it is handed history
//! pages and returns decision records, and callers here move both across the
//! wire.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Method, RequestBuilder, Url, header};
use serde_json::json;
use tracing::debug;

use galley_types::{DEFAULT_MAXIMUM_PAGE_SIZE, DecisionRecord, HistoryPage};

pub mod starter;

pub use starter::{
    CoordinatorStart, StartError, StartExecutionRequest, StartOutcome, StartRequestError, StartedExecution,
    start_execution,
};

/// Environment variable overriding the coordinator base URL.
pub const API_BASE_ENV: &str = "GALLEY_API_BASE";
/// Environment variable carrying the coordinator bearer token.
pub const API_TOKEN_ENV: &str = "GALLEY_API_TOKEN";
/// Coordinator endpoint used when `GALLEY_API_BASE` is unset.
const DEFAULT_BASE_URL: &str = "https://coordinator.galley.dev";

/// Allowed base domains for non-local configurations of `GALLEY_API_BASE`.
/// Subdomains of these domains are also allowed.
const ALLOWED_COORDINATOR_DOMAINS: &[&str] = &["galley.dev", "galley-staging.dev"];
/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Thin wrapper around a configured `reqwest::Client` for coordinator access.
///
/// The client pre-configures default headers and builds requests against a
/// validated base URL. Authentication is read from the environment.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl CoordinatorClient {
    /// Construct a [`CoordinatorClient`] from environment variables.
    ///
    /// The base URL is taken from `GALLEY_API_BASE` (if set) or falls back to
    /// the default coordinator endpoint. Non-localhost hosts must use HTTPS
    /// and sit within an allowed domain. A bearer token from
    /// `GALLEY_API_TOKEN`, when present, becomes a default header.
    pub fn new_from_env() -> Result<Self> {
        let mut default_headers = header::HeaderMap::new();
        if let Ok(api_token) = env::var(API_TOKEN_ENV) {
            let authorization = format!("Bearer {api_token}");
            let value = header::HeaderValue::from_str(&authorization).context("invalid coordinator token")?;
            default_headers.insert(header::AUTHORIZATION, value);
        }
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;

        let base_url = env::var(API_BASE_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        validate_base_url(&base_url)?;

        Ok(Self {
            base_url,
            http,
            user_agent: format!("galley/0.1; {}", env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and API-relative path.
    ///
    /// The resulting request includes the configured User-Agent and base
    /// headers, and is resolved relative to `self.base_url`.
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "building request");

        self.http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent)
    }

    /// Fetch one page of history for an execution.
    ///
    /// Passing the previous page's continuation token fetches the next page;
    /// the returned page carries its own token while history remains.
    pub async fn fetch_history_page(&self, execution_id: &str, page_token: Option<&str>) -> Result<HistoryPage> {
        let path = format!("/v1/executions/{execution_id}/history");
        let mut request = self
            .request(Method::GET, &path)
            .query(&[("maximum_page_size", DEFAULT_MAXIMUM_PAGE_SIZE.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("page_token", token)]);
        }

        let response = request.send().await?.error_for_status()?;
        response.json().await.context("parse history page")
    }

    /// Post the decision records answering one decision task.
    ///
    /// An empty record list is a valid response: the no-op continuation
    /// issued while scheduled activities are still in flight.
    pub async fn respond_decision_task(&self, task_token: &str, records: &[DecisionRecord]) -> Result<()> {
        self.request(Method::POST, "/v1/decision-tasks/respond")
            .json(&json!({
                "task_token": task_token,
                "decisions": records,
            }))
            .send()
            .await?
            .error_for_status()
            .context("respond decision task")?;
        Ok(())
    }
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS, and host must be one of the allowed
///   coordinator domains or a subdomain thereof
fn validate_base_url(base: &str) -> Result<()> {
    let parsed = Url::parse(base).map_err(|e| anyhow!("invalid {} URL '{}': {}", API_BASE_ENV, base, e))?;

    let host_name = parsed
        .host_str()
        .ok_or_else(|| anyhow!("{} must include a host", API_BASE_ENV))?;

    // Local development allowances: localhost/127.0.0.1 with any scheme.
    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed.scheme() != "https" {
        return Err(anyhow!(
            "{} must use https for non-localhost hosts; got '{}://'",
            API_BASE_ENV,
            parsed.scheme()
        ));
    }

    let is_allowed_domain = ALLOWED_COORDINATOR_DOMAINS.iter().any(|&allowed_domain| {
        host_name.eq_ignore_ascii_case(allowed_domain) || host_name.ends_with(&format!(".{allowed_domain}"))
    });
    if !is_allowed_domain {
        return Err(anyhow!(
            "{} host '{}' is not allowed; must be one of {:?} or a subdomain, or localhost",
            API_BASE_ENV,
            host_name,
            ALLOWED_COORDINATOR_DOMAINS
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_base_url;

    #[test]
    fn localhost_allows_any_scheme() {
        assert!(validate_base_url("http://localhost:8080").is_ok());
        assert!(validate_base_url("http://127.0.0.1:4000").is_ok());
    }

    #[test]
    fn non_localhost_requires_https() {
        let error = validate_base_url("http://coordinator.galley.dev").expect_err("should reject");
        assert!(error.to_string().contains("https"), "unexpected error: {error}");
    }

    #[test]
    fn allowed_domains_and_subdomains_pass() {
        assert!(validate_base_url("https://galley.dev").is_ok());
        assert!(validate_base_url("https://coordinator.galley-staging.dev").is_ok());
    }

    #[test]
    fn foreign_hosts_are_rejected() {
        let error = validate_base_url("https://coordinator.example.com").expect_err("should reject");
        assert!(error.to_string().contains("not allowed"), "unexpected error: {error}");
    }
}
