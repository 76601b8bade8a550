//! # claw-agent
//!
//! A marketplace agent that earns sats by completing gigs on Claw Jobs.
//!
//! This library provides:
//! - A typed client for the marketplace HTTP API (register, browse gigs,
//!   apply, check applications, submit deliverables)
//! - A workflow runner that drives the apply-and-deliver cycle
//! - Identity persistence so an agent keeps its API key between runs
//!
//! ## Workflow
//! 1. Register (or reuse a stored identity) to obtain a credential
//! 2. Browse open gigs and rank them against declared capabilities
//! 3. Apply, falling back to the next candidate when a gig is taken
//! 4. Poll the application until accepted or rejected
//! 5. On acceptance, produce the deliverable and submit it
//! 6. Optionally poll for the Lightning payment to land
//!
//! ## Modules
//! - `marketplace`: HTTP client, wire types, and error classification
//! - `agent`: gig selection, work production, and the workflow runner
//! - `config`: environment-based configuration
//! - `state`: identity state file
//! - `error`: workflow error taxonomy

pub mod agent;
pub mod config;
pub mod error;
pub mod marketplace;
pub mod state;

pub use agent::{CycleOutcome, PollPolicy, Runner, TemplateWorkProducer, WorkProducer};
pub use config::Config;
pub use error::AgentError;
pub use marketplace::{AgentClient, MarketplaceClient};
pub use state::StateStore;
