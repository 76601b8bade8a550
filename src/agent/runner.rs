//! Agent workflow runner.
//!
//! Drives one full marketplace cycle: browse open gigs, pick a candidate,
//! apply, wait for the poster's decision, deliver on acceptance, and
//! optionally watch for the payment to land. `run_loop` repeats the cycle at
//! a fixed interval, logging and surviving per-cycle failures.
//!
//! # Execution Flow
//! 1. Browse open gigs and rank candidates against declared capabilities
//! 2. Apply, falling back to the next candidate when a gig is taken
//! 3. Poll the application until it leaves `pending` (bounded, backing off)
//! 4. On acceptance, produce the deliverable and submit it
//! 5. Optionally poll for payment confirmation

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::agent::matching;
use crate::agent::work::{TemplateWorkProducer, WorkProducer};
use crate::config::Config;
use crate::error::AgentError;
use crate::marketplace::{
    AgentClient, Application, ApplicationStatus, Deliverable, Gig, MarketplaceClient,
    RegisterRequest, SubmissionReceipt,
};
use crate::state::StateStore;

/// Upper bound on the interval between status polls, however far the
/// backoff has grown.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Bounded polling schedule for remote status waits.
///
/// The interval starts at `initial_interval` and doubles per attempt up to
/// `max_interval`; after `max_attempts` polls the wait times out. The
/// defaults (5s start, 60s cap, 30 attempts) bound a wait at roughly half an
/// hour.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            max_interval: MAX_POLL_INTERVAL,
            max_attempts: 30,
        }
    }
}

impl PollPolicy {
    /// Delay to sleep after the given attempt (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.initial_interval
            .saturating_mul(multiplier)
            .min(self.max_interval)
    }
}

/// What a single workflow cycle amounted to.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The marketplace had no open gigs this cycle.
    NoOpenGigs,
    /// The application was rejected by the gig poster.
    Rejected {
        gig_id: String,
        application_id: String,
    },
    /// Work was submitted; payment was not (yet) observed.
    Delivered { receipt: SubmissionReceipt },
    /// Work was submitted and payment confirmed.
    Paid { receipt: SubmissionReceipt },
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleOutcome::NoOpenGigs => write!(f, "no open gigs"),
            CycleOutcome::Rejected { gig_id, .. } => {
                write!(f, "application for gig {} rejected", gig_id)
            }
            CycleOutcome::Delivered { .. } => write!(f, "deliverable submitted"),
            CycleOutcome::Paid { .. } => write!(f, "deliverable submitted and paid"),
        }
    }
}

/// The agent workflow runner.
pub struct Runner {
    client: AgentClient,
    producer: Box<dyn WorkProducer>,
    capabilities: Vec<String>,
    poll: PollPolicy,
    await_payment: bool,
    run_interval: Duration,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("capabilities", &self.capabilities)
            .field("poll", &self.poll)
            .field("await_payment", &self.await_payment)
            .field("run_interval", &self.run_interval)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Create a runner from an authenticated client and a work producer.
    pub fn new(
        client: AgentClient,
        producer: Box<dyn WorkProducer>,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            client,
            producer,
            capabilities,
            poll: PollPolicy::default(),
            await_payment: false,
            run_interval: Duration::from_secs(300),
        }
    }

    /// Override the polling schedule.
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Enable or disable payment polling after delivery.
    pub fn with_await_payment(mut self, await_payment: bool) -> Self {
        self.await_payment = await_payment;
        self
    }

    /// Override the sleep between cycles in loop mode.
    pub fn with_run_interval(mut self, run_interval: Duration) -> Self {
        self.run_interval = run_interval;
        self
    }

    /// Build a runner from configuration: load or register the identity,
    /// then bind the authenticated client.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Auth` when registration fails (name taken or
    /// service unreachable). A stored identity skips registration entirely.
    pub async fn bootstrap(config: Config) -> Result<Self, AgentError> {
        let store = StateStore::load(&config.state_file).await;
        let market = MarketplaceClient::new(&config.api_url);

        let identity = match store.identity().await {
            Some(identity) => {
                info!("Already registered as {}", identity.name);
                identity
            }
            None => {
                info!("Registering agent '{}'", config.agent_name);
                let request = RegisterRequest::agent(
                    config.agent_name.clone(),
                    config.capabilities.clone(),
                    config.lightning_address.clone(),
                );
                let identity = market.register(&request).await.map_err(AgentError::auth)?;
                info!(
                    "Registered as {} (agent id {})",
                    identity.name, identity.agent_id
                );
                if let Err(e) = store.save_identity(&identity).await {
                    warn!("Could not persist agent state: {}", e);
                }
                identity
            }
        };

        let producer =
            TemplateWorkProducer::new(identity.name.clone(), config.capabilities.clone());
        let client = market.into_authenticated(identity);

        Ok(Self::new(client, Box::new(producer), config.capabilities)
            .with_poll_policy(PollPolicy {
                initial_interval: config.poll_interval,
                max_interval: MAX_POLL_INTERVAL,
                max_attempts: config.poll_max_attempts,
            })
            .with_await_payment(config.await_payment)
            .with_run_interval(config.run_interval))
    }

    /// Run one full cycle: browse, apply, await decision, deliver.
    pub async fn run_once(&self) -> Result<CycleOutcome, AgentError> {
        info!("{} - browsing open gigs", self.client.identity().name);
        let gigs = self
            .client
            .list_open_gigs()
            .await
            .map_err(AgentError::fetch)?;

        if gigs.is_empty() {
            info!("No open gigs available");
            return Ok(CycleOutcome::NoOpenGigs);
        }
        info!("Found {} open gigs", gigs.len());

        let candidates = matching::candidate_gigs(&gigs, &self.capabilities);
        let (gig, application) = self.apply_with_fallback(&candidates).await?;

        if application.status != ApplicationStatus::Pending {
            return Err(AgentError::Protocol(format!(
                "fresh application {} reported status '{}' instead of pending",
                application.id, application.status
            )));
        }
        info!(
            "Applied to gig '{}' ({} sats), application {}",
            gig.title, gig.reward_sats, application.id
        );

        match self.await_decision(&application.id).await? {
            ApplicationStatus::Rejected => {
                info!("Application {} was rejected", application.id);
                Ok(CycleOutcome::Rejected {
                    gig_id: gig.id.clone(),
                    application_id: application.id,
                })
            }
            ApplicationStatus::Accepted => {
                info!("Application {} accepted, starting work", application.id);
                let mut accepted = application.clone();
                accepted.status = ApplicationStatus::Accepted;
                let receipt = self.deliver(gig, &accepted).await?;

                if self.await_payment && self.await_payment_settled(&application.id).await? {
                    return Ok(CycleOutcome::Paid { receipt });
                }
                Ok(CycleOutcome::Delivered { receipt })
            }
            other => Err(AgentError::Protocol(format!(
                "application {} left pending with unexpected status '{}'",
                application.id, other
            ))),
        }
    }

    /// Run continuously, one cycle per `run_interval`.
    ///
    /// Cycle failures are logged and the loop continues; only process
    /// termination stops it.
    pub async fn run_loop(&self) {
        info!(
            "Starting agent loop (one cycle every {:?})",
            self.run_interval
        );
        loop {
            match self.run_once().await {
                Ok(outcome) => info!("Cycle finished: {}", outcome),
                Err(e) => error!("Cycle failed: {}", e),
            }
            debug!("Sleeping {:?} until next cycle", self.run_interval);
            sleep(self.run_interval).await;
        }
    }

    /// Apply to ranked candidates in order until one application sticks.
    ///
    /// A refusal (gig taken, closed, already applied) moves on to the next
    /// candidate; anything else aborts immediately.
    async fn apply_with_fallback<'a>(
        &self,
        candidates: &[&'a Gig],
    ) -> Result<(&'a Gig, Application), AgentError> {
        let mut last_refusal = None;
        for &gig in candidates {
            match self.client.apply(&gig.id, None).await {
                Ok(application) => return Ok((gig, application)),
                Err(e) => match AgentError::apply(e) {
                    AgentError::Apply(refusal) => {
                        warn!(
                            "Gig '{}' unavailable ({}), trying next candidate",
                            gig.title, refusal
                        );
                        last_refusal = Some(AgentError::Apply(refusal));
                    }
                    fatal => return Err(fatal),
                },
            }
        }
        Err(last_refusal.unwrap_or_else(|| {
            AgentError::Protocol("no candidate gigs to apply to".to_string())
        }))
    }

    /// Poll until the application leaves `pending`.
    ///
    /// The only transitions the service may surface here are
    /// `pending → accepted` and `pending → rejected`; anything else is a
    /// contract violation.
    async fn await_decision(&self, application_id: &str) -> Result<ApplicationStatus, AgentError> {
        let mut last = ApplicationStatus::Pending;
        for attempt in 0..self.poll.max_attempts {
            let status = self.fetch_status(application_id).await?;
            if status == ApplicationStatus::Unknown {
                return Err(AgentError::Protocol(format!(
                    "application {} reports an unrecognised status",
                    application_id
                )));
            }
            if !last.can_transition_to(status) {
                return Err(AgentError::Protocol(format!(
                    "illegal status transition {} -> {} for application {}",
                    last, status, application_id
                )));
            }
            last = status;
            if status.is_decided() {
                return Ok(status);
            }
            let delay = self.poll.delay_for(attempt);
            debug!(
                "Application {} still pending, next poll in {:?} (attempt {}/{})",
                application_id,
                delay,
                attempt + 1,
                self.poll.max_attempts
            );
            sleep(delay).await;
        }
        Err(AgentError::Timeout {
            what: "application decision",
            attempts: self.poll.max_attempts,
        })
    }

    /// Poll until payment is confirmed. Returns `false` on poll-budget
    /// exhaustion: payment settles server-side whether or not we watched it
    /// land, so a timeout here is not a failure of the run.
    async fn await_payment_settled(&self, application_id: &str) -> Result<bool, AgentError> {
        info!("Waiting for payment on application {}", application_id);
        let mut last = ApplicationStatus::Accepted;
        for attempt in 0..self.poll.max_attempts {
            let status = self.fetch_status(application_id).await?;
            if status == ApplicationStatus::Unknown {
                return Err(AgentError::Protocol(format!(
                    "application {} reports an unrecognised status",
                    application_id
                )));
            }
            // Between polls the service may pass through intermediate
            // states, so require forward reachability rather than a single
            // step.
            if !last.can_reach(status) {
                return Err(AgentError::Protocol(format!(
                    "illegal status regression {} -> {} for application {}",
                    last, status, application_id
                )));
            }
            last = status;
            if status == ApplicationStatus::Paid {
                info!("Payment confirmed for application {}", application_id);
                return Ok(true);
            }
            sleep(self.poll.delay_for(attempt)).await;
        }
        info!(
            "Payment for application {} not observed within the poll budget",
            application_id
        );
        Ok(false)
    }

    /// Produce and submit the deliverable for an accepted application.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Submit` without touching the network when the
    /// application is not in `accepted` state.
    pub async fn deliver(
        &self,
        gig: &Gig,
        application: &Application,
    ) -> Result<SubmissionReceipt, AgentError> {
        if application.status != ApplicationStatus::Accepted {
            return Err(AgentError::Submit(format!(
                "application {} is '{}', not accepted",
                application.id, application.status
            )));
        }

        info!("Working on '{}'", gig.title);
        let content = self
            .producer
            .produce(gig)
            .await
            .map_err(AgentError::Work)?;
        let deliverable = Deliverable {
            gig_id: gig.id.clone(),
            application_id: application.id.clone(),
            content,
            notes: Some(format!("Completed by {}", self.client.identity().name)),
        };

        let receipt = self
            .client
            .submit_deliverable(&deliverable)
            .await
            .map_err(AgentError::submit)?;
        info!("Deliverable submitted for application {}", application.id);
        Ok(receipt)
    }

    /// Look up the current status of one application in the listing.
    async fn fetch_status(&self, application_id: &str) -> Result<ApplicationStatus, AgentError> {
        let listing = self
            .client
            .applications()
            .await
            .map_err(AgentError::fetch)?;
        if let Some(stats) = &listing.stats {
            debug!(
                "Applications: {} total, {} accepted, {} pending",
                stats.total, stats.accepted, stats.pending
            );
        }
        listing
            .applications
            .iter()
            .find(|a| a.id == application_id)
            .map(|a| a.status)
            .ok_or_else(|| {
                AgentError::Protocol(format!(
                    "application {} missing from the applications listing",
                    application_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::{AgentIdentity, RetryPolicy};
    use mockito::{Matcher, Server, ServerGuard};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            max_attempts: 5,
        }
    }

    fn test_runner(server: &ServerGuard) -> Runner {
        let market = MarketplaceClient::with_retry_policy(
            server.url(),
            RetryPolicy {
                max_retries: 0,
                ..RetryPolicy::default()
            },
        );
        let client = market.into_authenticated(AgentIdentity {
            name: "TestBot".to_string(),
            api_key: "key-123".to_string(),
            agent_id: "user-1".to_string(),
            lightning_address: None,
        });
        let producer = TemplateWorkProducer::new("TestBot", vec!["research".to_string()]);
        Runner::new(client, Box::new(producer), vec!["research".to_string()])
            .with_poll_policy(fast_poll())
    }

    fn gig_listing_body() -> &'static str {
        r#"[{"id": "g1", "title": "Research task", "description": "dig in",
             "budget_sats": 100, "required_capabilities": ["research"]}]"#
    }

    fn applications_body(status: &str) -> String {
        format!(
            r#"{{"applications": [{{"id": "a1", "gig_id": "g1", "status": "{}"}}],
                 "stats": {{"total": 1}}}}"#,
            status
        )
    }

    #[test]
    fn poll_delay_doubles_and_caps() {
        let policy = PollPolicy {
            initial_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(60),
            max_attempts: 30,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn end_to_end_cycle_delivers_on_acceptance() {
        let mut server = Server::new_async().await;
        let gigs = server
            .mock("GET", "/gigs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gig_listing_body())
            .create_async()
            .await;
        let apply = server
            .mock("POST", "/gigs/g1/apply")
            .with_status(201)
            .with_body(r#"{"application": {"id": "a1", "gig_id": "g1", "status": "pending"}}"#)
            .create_async()
            .await;

        // First status poll sees pending, subsequent ones accepted.
        let polls = Arc::new(AtomicUsize::new(0));
        let polls_in_mock = Arc::clone(&polls);
        let applications = server
            .mock("GET", "/applications")
            .expect_at_least(2)
            .with_status(200)
            .with_body_from_request(move |_| {
                let n = polls_in_mock.fetch_add(1, Ordering::SeqCst);
                let status = if n == 0 { "pending" } else { "accepted" };
                applications_body(status).into_bytes()
            })
            .create_async()
            .await;

        let deliverables = server
            .mock("POST", "/deliverables")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "gig_id": "g1",
                "application_id": "a1"
            })))
            .with_status(201)
            .with_body(r#"{"id": "d1", "application_id": "a1"}"#)
            .create_async()
            .await;

        let outcome = test_runner(&server).run_once().await.unwrap();

        gigs.assert_async().await;
        apply.assert_async().await;
        applications.assert_async().await;
        deliverables.assert_async().await;

        match outcome {
            CycleOutcome::Delivered { receipt } => {
                assert_eq!(receipt.application_id.as_deref(), Some("a1"));
            }
            other => panic!("expected Delivered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn taken_gig_falls_back_to_next_candidate() {
        let mut server = Server::new_async().await;
        let _gigs = server
            .mock("GET", "/gigs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"id": "g1", "title": "Research A", "budget_sats": 100,
                      "required_capabilities": ["research"]},
                    {"id": "g2", "title": "Research B", "budget_sats": 150,
                      "required_capabilities": ["research"]}]"#,
            )
            .create_async()
            .await;
        let refused = server
            .mock("POST", "/gigs/g1/apply")
            .with_status(409)
            .with_body(r#"{"error": "gig already taken"}"#)
            .create_async()
            .await;
        let accepted_apply = server
            .mock("POST", "/gigs/g2/apply")
            .with_status(201)
            .with_body(r#"{"application": {"id": "a2", "gig_id": "g2", "status": "pending"}}"#)
            .create_async()
            .await;
        let _applications = server
            .mock("GET", "/applications")
            .with_status(200)
            .with_body(
                r#"{"applications": [{"id": "a2", "gig_id": "g2", "status": "rejected"}]}"#,
            )
            .create_async()
            .await;

        let outcome = test_runner(&server).run_once().await.unwrap();

        refused.assert_async().await;
        accepted_apply.assert_async().await;
        match outcome {
            CycleOutcome::Rejected {
                gig_id,
                application_id,
            } => {
                assert_eq!(gig_id, "g2");
                assert_eq!(application_id, "a2");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn all_candidates_refused_surfaces_apply_error() {
        let mut server = Server::new_async().await;
        let _gigs = server
            .mock("GET", "/gigs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gig_listing_body())
            .create_async()
            .await;
        let _apply = server
            .mock("POST", "/gigs/g1/apply")
            .with_status(409)
            .with_body(r#"{"error": "gig already taken"}"#)
            .create_async()
            .await;

        let err = test_runner(&server).run_once().await.unwrap_err();
        assert!(matches!(err, AgentError::Apply(_)));
    }

    #[tokio::test]
    async fn empty_listing_is_a_quiet_cycle() {
        let mut server = Server::new_async().await;
        let _gigs = server
            .mock("GET", "/gigs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let outcome = test_runner(&server).run_once().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::NoOpenGigs));
    }

    #[tokio::test]
    async fn deliver_refuses_non_accepted_application() {
        // No mocks: the guard must fire before any network call.
        let server = Server::new_async().await;
        let runner = test_runner(&server);

        let gig: Gig = serde_json::from_str(
            r#"{"id": "g1", "title": "Research task", "budget_sats": 100}"#,
        )
        .unwrap();
        let pending: Application =
            serde_json::from_str(r#"{"id": "a1", "gig_id": "g1", "status": "pending"}"#).unwrap();

        let err = runner.deliver(&gig, &pending).await.unwrap_err();
        assert!(matches!(err, AgentError::Submit(_)));
    }

    #[tokio::test]
    async fn decision_poll_times_out_after_max_attempts() {
        let mut server = Server::new_async().await;
        let _gigs = server
            .mock("GET", "/gigs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gig_listing_body())
            .create_async()
            .await;
        let _apply = server
            .mock("POST", "/gigs/g1/apply")
            .with_status(201)
            .with_body(r#"{"application": {"id": "a1", "gig_id": "g1", "status": "pending"}}"#)
            .create_async()
            .await;
        let _applications = server
            .mock("GET", "/applications")
            .expect_at_least(2)
            .with_status(200)
            .with_body(applications_body("pending"))
            .create_async()
            .await;

        let runner = test_runner(&server).with_poll_policy(PollPolicy {
            initial_interval: Duration::from_millis(2),
            max_interval: Duration::from_millis(4),
            max_attempts: 3,
        });

        let err = runner.run_once().await.unwrap_err();
        match err {
            AgentError::Timeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unrecognised_status_is_a_protocol_violation() {
        let mut server = Server::new_async().await;
        let _gigs = server
            .mock("GET", "/gigs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gig_listing_body())
            .create_async()
            .await;
        let _apply = server
            .mock("POST", "/gigs/g1/apply")
            .with_status(201)
            .with_body(r#"{"application": {"id": "a1", "gig_id": "g1", "status": "pending"}}"#)
            .create_async()
            .await;
        let _applications = server
            .mock("GET", "/applications")
            .with_status(200)
            .with_body(applications_body("escrowed"))
            .create_async()
            .await;

        let err = test_runner(&server).run_once().await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
    }

    #[tokio::test]
    async fn bootstrap_registers_once_and_reuses_stored_identity() {
        let mut server = Server::new_async().await;
        let register = server
            .mock("POST", "/auth/register")
            .expect(1)
            .with_status(201)
            .with_body(r#"{"api_key": "key-1", "user": {"id": "u1", "name": "TestBot"}}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(server.url(), "TestBot", vec!["research".to_string()]);
        config.state_file = dir.path().join("agent_state.json");

        let runner = Runner::bootstrap(config.clone()).await.unwrap();
        assert_eq!(runner.client.identity().api_key, "key-1");
        assert_eq!(runner.client.identity().agent_id, "u1");

        // Second bootstrap must load the state file, not re-register.
        let runner = Runner::bootstrap(config).await.unwrap();
        assert_eq!(runner.client.identity().api_key, "key-1");

        register.assert_async().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fatally_when_name_is_taken() {
        let mut server = Server::new_async().await;
        let _register = server
            .mock("POST", "/auth/register")
            .with_status(409)
            .with_body(r#"{"error": "name already registered"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(server.url(), "TakenBot", vec![]);
        config.state_file = dir.path().join("agent_state.json");

        let err = Runner::bootstrap(config).await.unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }

    #[tokio::test]
    async fn payment_polling_reports_paid_cycle() {
        let mut server = Server::new_async().await;
        let _gigs = server
            .mock("GET", "/gigs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gig_listing_body())
            .create_async()
            .await;
        let _apply = server
            .mock("POST", "/gigs/g1/apply")
            .with_status(201)
            .with_body(r#"{"application": {"id": "a1", "gig_id": "g1", "status": "pending"}}"#)
            .create_async()
            .await;

        // accepted for the decision poll, then delivered, then paid.
        let polls = Arc::new(AtomicUsize::new(0));
        let polls_in_mock = Arc::clone(&polls);
        let _applications = server
            .mock("GET", "/applications")
            .expect_at_least(3)
            .with_status(200)
            .with_body_from_request(move |_| {
                let n = polls_in_mock.fetch_add(1, Ordering::SeqCst);
                let status = match n {
                    0 => "accepted",
                    1 => "delivered",
                    _ => "paid",
                };
                applications_body(status).into_bytes()
            })
            .create_async()
            .await;
        let _deliverables = server
            .mock("POST", "/deliverables")
            .with_status(201)
            .with_body(r#"{"id": "d1", "application_id": "a1"}"#)
            .create_async()
            .await;

        let runner = test_runner(&server).with_await_payment(true);
        let outcome = runner.run_once().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Paid { .. }));
    }
}
