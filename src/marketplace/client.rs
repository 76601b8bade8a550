//! HTTP client for the Claw Jobs marketplace API with automatic retry for
//! transient errors.
//!
//! Two layers: [`MarketplaceClient`] only knows how to register (and how to
//! perform raw round trips), while [`AgentClient`] wraps a registered
//! identity and exposes the authenticated endpoints. Gig, application, and
//! deliverable calls are therefore impossible to make without a credential.

use std::time::Instant;

use reqwest::Client;
use tracing::{debug, warn};

use super::error::{classify_http_status, MarketError, MarketErrorKind, RetryPolicy};
use super::types::{
    AgentIdentity, Application, ApplicationsResponse, ApplyResponse, Deliverable, Gig,
    RegisterRequest, RegisterResponse, SubmissionReceipt,
};

/// Unauthenticated marketplace client.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    base_url: String,
    http: Client,
    retry: RetryPolicy,
}

impl MarketplaceClient {
    /// Create a new client with the default retry policy.
    ///
    /// `base_url` should include the API prefix, e.g.
    /// `https://claw-jobs.com/api`. Trailing slashes are trimmed.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_retry_policy(base_url, RetryPolicy::default())
    }

    /// Create a new client with a custom retry policy.
    pub fn with_retry_policy(base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: Client::new(),
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register an agent account and obtain a credential.
    ///
    /// # Errors
    ///
    /// Returns a permanent `ClientError` if the name is already taken (409)
    /// or the request is rejected; transient transport and server failures
    /// are retried first and surface only once the retry budget is spent.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AgentIdentity, MarketError> {
        let url = format!("{}/auth/register", self.base_url);
        let body = self
            .send_with_retry(|| self.http.post(&url).json(request))
            .await?;

        let parsed: RegisterResponse = serde_json::from_str(&body).map_err(|e| {
            MarketError::parse_error(format!(
                "Failed to parse registration response: {}, body: {}",
                e, body
            ))
        })?;

        Ok(AgentIdentity {
            name: request.name.clone(),
            api_key: parsed.api_key,
            agent_id: parsed.user.id,
            lightning_address: request.lightning_address.clone(),
        })
    }

    /// Bind a registered identity, unlocking the authenticated endpoints.
    pub fn into_authenticated(self, identity: AgentIdentity) -> AgentClient {
        AgentClient {
            market: self,
            identity,
        }
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<std::time::Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(std::time::Duration::from_secs))
    }

    /// Create a MarketError from HTTP response status and body.
    fn create_error(
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<std::time::Duration>,
    ) -> MarketError {
        let status_code = status.as_u16();
        match classify_http_status(status_code) {
            MarketErrorKind::RateLimited => MarketError::rate_limited(body.to_string(), retry_after),
            MarketErrorKind::ClientError => MarketError::client_error(status_code, body.to_string()),
            _ => MarketError::server_error(status_code, body.to_string()),
        }
    }

    /// Execute a single request without retry, returning the success body.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, MarketError> {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(MarketError::network_error(format!("Request timeout: {}", e)));
                } else if e.is_connect() {
                    return Err(MarketError::network_error(format!(
                        "Connection failed: {}",
                        e
                    )));
                } else {
                    return Err(MarketError::network_error(format!("Request failed: {}", e)));
                }
            }
        };

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Self::create_error(status, &body, retry_after));
        }

        Ok(body)
    }

    /// Execute a request, retrying transient failures with backoff.
    ///
    /// The builder closure is invoked once per attempt since a
    /// `RequestBuilder` is consumed by `send`.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<String, MarketError> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            match self.execute(build()).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    let budget_spent = attempt >= self.retry.max_retries
                        || started.elapsed() >= self.retry.max_retry_duration;
                    if !self.retry.should_retry(&e) || budget_spent {
                        return Err(e);
                    }
                    let delay = e.suggested_delay(attempt);
                    warn!(
                        "Marketplace request failed ({}), retrying in {:?} (attempt {}/{})",
                        e,
                        delay,
                        attempt + 1,
                        self.retry.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Authenticated marketplace client bound to a registered identity.
#[derive(Debug, Clone)]
pub struct AgentClient {
    market: MarketplaceClient,
    identity: AgentIdentity,
}

impl AgentClient {
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn base_url(&self) -> &str {
        self.market.base_url()
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("x-api-key", &self.identity.api_key)
    }

    /// List currently open gigs.
    ///
    /// Entries the server returns without an id or title are dropped with a
    /// warning; the caller never sees an unusable gig.
    pub async fn list_open_gigs(&self) -> Result<Vec<Gig>, MarketError> {
        let url = format!("{}/gigs", self.market.base_url);
        let body = self
            .market
            .send_with_retry(|| self.authed(self.market.http.get(&url).query(&[("status", "open")])))
            .await?;

        let raw: Vec<serde_json::Value> = serde_json::from_str(&body).map_err(|e| {
            MarketError::parse_error(format!("Failed to parse gigs listing: {}, body: {}", e, body))
        })?;

        let mut gigs = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<Gig>(value) {
                Ok(gig) if gig.is_valid() => gigs.push(gig),
                Ok(gig) => {
                    warn!(
                        "Skipping malformed gig in listing (id={:?}, title={:?})",
                        gig.id, gig.title
                    );
                }
                Err(e) => {
                    warn!("Skipping unparseable gig in listing: {}", e);
                }
            }
        }
        debug!("Fetched {} open gigs", gigs.len());
        Ok(gigs)
    }

    /// Apply to a gig, optionally attaching a proposal.
    ///
    /// A 409 means the gig is closed, taken, or already applied to; that
    /// surfaces as a permanent `ClientError` (no retry).
    pub async fn apply(
        &self,
        gig_id: &str,
        proposal: Option<&str>,
    ) -> Result<Application, MarketError> {
        let url = format!("{}/gigs/{}/apply", self.market.base_url, gig_id);
        let mut payload = serde_json::Map::new();
        if let Some(text) = proposal {
            payload.insert("proposal".to_string(), serde_json::json!(text));
        }

        let body = self
            .market
            .send_with_retry(|| self.authed(self.market.http.post(&url).json(&payload)))
            .await?;

        // The apply endpoint wraps the record; tolerate a bare one too.
        serde_json::from_str::<ApplyResponse>(&body)
            .map(|r| r.application)
            .or_else(|_| serde_json::from_str::<Application>(&body))
            .map_err(|e| {
                MarketError::parse_error(format!(
                    "Failed to parse apply response: {}, body: {}",
                    e, body
                ))
            })
    }

    /// Fetch the status of this agent's applications.
    pub async fn applications(&self) -> Result<ApplicationsResponse, MarketError> {
        let url = format!("{}/applications", self.market.base_url);
        let body = self
            .market
            .send_with_retry(|| self.authed(self.market.http.get(&url)))
            .await?;

        serde_json::from_str(&body).map_err(|e| {
            MarketError::parse_error(format!(
                "Failed to parse applications response: {}, body: {}",
                e, body
            ))
        })
    }

    /// Submit a deliverable for an accepted application.
    pub async fn submit_deliverable(
        &self,
        deliverable: &Deliverable,
    ) -> Result<SubmissionReceipt, MarketError> {
        let url = format!("{}/deliverables", self.market.base_url);
        let body = self
            .market
            .send_with_retry(|| self.authed(self.market.http.post(&url).json(deliverable)))
            .await?;

        // The receipt body shape is not guaranteed; a 2xx with an opaque
        // body still acknowledges the submission.
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}
