//! Wire types for the Claw Jobs marketplace API.
//!
//! Field names follow the marketplace JSON contract (`budget_sats`,
//! `required_capabilities`, `gig_title`); the Rust side maps them to the
//! domain vocabulary via serde renames. Parsing is deliberately lenient:
//! missing optional fields default instead of failing the whole response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered agent identity, issued by the marketplace at registration.
///
/// Immutable after registration. The API key authenticates every
/// subsequent call via the `x-api-key` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Agent display name (unique on the marketplace)
    pub name: String,
    /// Server-issued API key
    pub api_key: String,
    /// Server-issued agent/user id
    pub agent_id: String,
    /// Lightning address for payouts, if configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lightning_address: Option<String>,
}

/// Registration request body.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    /// Account type; always `"agent"` for this client.
    #[serde(rename = "type")]
    pub account_type: String,
    pub capabilities: Vec<String>,
    pub bio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lightning_address: Option<String>,
}

impl RegisterRequest {
    /// Build a registration request for an agent account.
    pub fn agent(
        name: impl Into<String>,
        capabilities: Vec<String>,
        lightning_address: Option<String>,
    ) -> Self {
        let name = name.into();
        let bio = format!(
            "I'm {}, an agent that can help with {}.",
            name,
            capabilities.join(", ")
        );
        Self {
            name,
            account_type: "agent".to_string(),
            capabilities,
            bio,
            lightning_address,
        }
    }
}

/// Registration response body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub api_key: String,
    pub user: RegisteredUser,
}

/// User record embedded in the registration response.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A unit of work posted on the marketplace with a fixed sat reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Reward in satoshis. Unsigned, so never negative.
    #[serde(rename = "budget_sats", default)]
    pub reward_sats: u64,
    /// Capability tags the gig requires
    #[serde(rename = "required_capabilities", default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Gig {
    /// A listing entry is usable only when the server gave it an id and title.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.title.is_empty()
    }
}

/// Lifecycle status of an application, as reported by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Delivered,
    Paid,
    /// Any status string this client does not recognise. Observing one is a
    /// contract violation, surfaced as an error by the workflow layer.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ApplicationStatus {
    /// Check whether the service is allowed to move an application from
    /// `self` to `next`.
    ///
    /// Legal transitions: `pending → accepted`, `pending → rejected`,
    /// `accepted → delivered`, `delivered → paid`. Re-observing the same
    /// status is always allowed (no transition happened).
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (*self, next),
            (Pending, Accepted) | (Pending, Rejected) | (Accepted, Delivered) | (Delivered, Paid)
        )
    }

    /// Check whether `next` is reachable from `self` along any forward
    /// path of legal transitions.
    ///
    /// Polling may skip intermediate states (the service can move an
    /// application through `delivered` to `paid` between two polls), so
    /// observation-side checks use reachability rather than single steps.
    pub fn can_reach(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        if *self == next {
            return true;
        }
        match (*self, next) {
            (Pending, Accepted | Rejected | Delivered | Paid) => true,
            (Accepted, Delivered | Paid) => true,
            (Delivered, Paid) => true,
            _ => false,
        }
    }

    /// Whether the acceptance decision has been made.
    pub fn is_decided(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Delivered => "delivered",
            ApplicationStatus::Paid => "paid",
            ApplicationStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A claim by this agent to perform a specific gig.
#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub gig_id: Option<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub gig_title: Option<String>,
    /// Some endpoints embed the gig record instead of a flat `gig_id`.
    #[serde(default)]
    pub gig: Option<EmbeddedGig>,
}

impl Application {
    /// Resolve the gig id, whether flat or embedded.
    pub fn gig_id(&self) -> Option<&str> {
        self.gig_id
            .as_deref()
            .or_else(|| self.gig.as_ref().map(|g| g.id.as_str()))
    }
}

/// Minimal gig record embedded in application listings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedGig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Response body of the apply endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyResponse {
    pub application: Application,
}

/// Response body of the applications listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationsResponse {
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub stats: Option<ApplicationStats>,
}

/// Aggregate counters returned alongside the applications listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationStats {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub accepted: u32,
    #[serde(default)]
    pub rejected: u32,
}

/// Completed-work artifact submitted against an accepted application.
#[derive(Debug, Clone, Serialize)]
pub struct Deliverable {
    pub gig_id: String,
    pub application_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Server acknowledgment of a submitted deliverable.
///
/// The marketplace does not guarantee a body shape here, so every field is
/// optional; a bare 2xx with an unparseable body still counts as a receipt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub gig_id: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}
