//! Claw Jobs marketplace API client.
//!
//! Typed access to the five marketplace endpoints: register, list gigs,
//! apply, check applications, submit deliverable. Transient failures are
//! retried with capped exponential backoff; permanent failures surface
//! immediately with their HTTP classification.

mod client;
mod error;
mod types;

pub use client::{AgentClient, MarketplaceClient};
pub use error::{classify_http_status, MarketError, MarketErrorKind, RetryPolicy};
pub use types::{
    AgentIdentity, Application, ApplicationStats, ApplicationStatus, ApplicationsResponse,
    ApplyResponse, Deliverable, EmbeddedGig, Gig, RegisterRequest, RegisterResponse,
    RegisteredUser, SubmissionReceipt,
};
