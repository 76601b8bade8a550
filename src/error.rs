//! Workflow error taxonomy.
//!
//! The marketplace client reports transport-level [`MarketError`]s; this
//! module maps them onto what the failure means for the run. `Auth` is fatal,
//! `Apply` is recoverable by picking another gig, `Submit` is fatal for that
//! application, `Network` means the retry budget was spent on a transient
//! failure. Nothing is swallowed: every error propagates to the top of the
//! run via `Result`.

use crate::marketplace::{MarketError, MarketErrorKind};

/// Errors surfaced by the agent workflow.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Registration or credential failure. Fatal to the run.
    #[error("authentication failed: {0}")]
    Auth(MarketError),

    /// Gig unavailable (taken, closed, or already applied to). Recoverable
    /// by selecting another candidate gig.
    #[error("application failed: {0}")]
    Apply(MarketError),

    /// Deliverable rejected by the service, or delivery attempted on an
    /// application that is not `accepted`.
    #[error("deliverable rejected: {0}")]
    Submit(String),

    /// Transient transport failure that survived the client's retry budget.
    #[error("marketplace unreachable: {0}")]
    Network(MarketError),

    /// The service answered with something the contract does not allow
    /// (malformed body, unknown status, illegal status transition).
    #[error("marketplace contract violation: {0}")]
    Protocol(String),

    /// Poll budget exhausted while waiting for a remote status change.
    #[error("timed out waiting for {what} after {attempts} polls")]
    Timeout { what: &'static str, attempts: u32 },

    /// Failure producing deliverable content for an accepted gig.
    #[error("work production failed: {0}")]
    Work(anyhow::Error),
}

impl AgentError {
    /// Classify a registration failure. Per the workflow contract this is
    /// always fatal, whether the name was taken or the service unreachable.
    pub fn auth(e: MarketError) -> Self {
        Self::Auth(e)
    }

    /// Classify a failure from an authenticated read (listings, status polls).
    pub fn fetch(e: MarketError) -> Self {
        if e.is_auth() {
            Self::Auth(e)
        } else if e.kind == MarketErrorKind::ParseError {
            Self::Protocol(e.to_string())
        } else {
            Self::Network(e)
        }
    }

    /// Classify a failure from the apply endpoint.
    pub fn apply(e: MarketError) -> Self {
        if e.is_auth() {
            Self::Auth(e)
        } else if e.kind == MarketErrorKind::ParseError {
            Self::Protocol(e.to_string())
        } else if e.is_transient() {
            Self::Network(e)
        } else {
            Self::Apply(e)
        }
    }

    /// Classify a failure from the deliverables endpoint.
    pub fn submit(e: MarketError) -> Self {
        if e.is_auth() {
            Self::Auth(e)
        } else if e.is_transient() {
            Self::Network(e)
        } else {
            Self::Submit(e.to_string())
        }
    }
}
