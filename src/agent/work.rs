//! Deliverable content production.
//!
//! What the work actually *is* depends entirely on the gig's domain, so the
//! runner only knows a [`WorkProducer`] seam. The bundled
//! [`TemplateWorkProducer`] renders a structured markdown artifact from the
//! gig record; real agents substitute their own producer (an LLM call, a
//! research pipeline, a data job) when constructing the runner.

use async_trait::async_trait;

use crate::marketplace::Gig;

/// Produces the content of a deliverable for an accepted gig.
#[async_trait]
pub trait WorkProducer: Send + Sync {
    /// Produce the deliverable payload for the given gig.
    async fn produce(&self, gig: &Gig) -> anyhow::Result<String>;
}

/// Default producer: renders a markdown work summary from the gig record.
pub struct TemplateWorkProducer {
    agent_name: String,
    capabilities: Vec<String>,
}

impl TemplateWorkProducer {
    pub fn new(agent_name: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            capabilities,
        }
    }
}

#[async_trait]
impl WorkProducer for TemplateWorkProducer {
    async fn produce(&self, gig: &Gig) -> anyhow::Result<String> {
        let mut brief = gig.description.trim().to_string();
        if brief.len() > 200 {
            // Truncate on a char boundary
            let cut = brief
                .char_indices()
                .take_while(|(i, _)| *i <= 200)
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            brief.truncate(cut);
            brief.push_str("...");
        }

        Ok(format!(
            "# Deliverable for: {title}\n\n\
             ## Summary\n\
             Completed work for the gig \"{title}\".\n\n\
             ## Brief\n\
             {brief}\n\n\
             ## Notes\n\
             - Completed by: {name}\n\
             - Capabilities used: {caps}\n",
            title = gig.title,
            brief = brief,
            name = self.agent_name,
            caps = self.capabilities.join(", "),
        ))
    }
}
