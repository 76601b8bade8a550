//! The agent workflow: gig selection, work production, and the runner that
//! drives the apply-and-deliver cycle.

pub mod matching;
mod runner;
mod work;

pub use runner::{CycleOutcome, PollPolicy, Runner};
pub use work::{TemplateWorkProducer, WorkProducer};
