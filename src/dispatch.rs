//! The Idle → Loading → Success | Error controller.
//!
//! Every dispatch is tagged with a monotonically increasing `Ticket`. A
//! completion is applied only while its ticket is the one in flight, so a
//! response that arrives after a reset or logout is dropped.

use crate::error::AnalysisError;
use crate::gemini::Analyzer;
use crate::ledger::{self, Profile};
use crate::models::{AnalysisRequest, AnalysisResult, Plan, UserSession};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const LOADING_PHRASES: [(&str, &str); 7] = [
    ("🧬", "Scanning Website DNA"),
    ("🧠", "Parsing Semantic Structure"),
    ("🩺", "Checking SEO Vital Signs"),
    ("🔭", "Identifying Opportunity Gaps"),
    ("✨", "Dreaming up Viral Features"),
    ("🌊", "Calibrating User Flows"),
    ("🚀", "Finalizing Strategy"),
];

pub const LOADING_INTERVAL: Duration = Duration::from_millis(1500);

pub const FALLBACK_ERROR: &str = "Something went wrong during analysis. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Idle,
    Loading,
    Success(AnalysisResult),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Started(Ticket),
    /// No credits left. Status is untouched; the caller shows the plans.
    CreditExhausted,
    /// A dispatch is already in flight.
    Busy,
    /// A result or error is still shown; `reset` first.
    NeedsReset,
    SignedOut,
}

/// Cycles the loading phrases on a fixed period. The task is aborted when
/// the ticker is dropped.
pub struct LoadingTicker {
    handle: JoinHandle<()>,
    rx: watch::Receiver<usize>,
}

impl LoadingTicker {
    pub fn start(period: Duration) -> Self {
        let (tx, rx) = watch::channel(0usize);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // first tick completes immediately
            interval.tick().await;
            let mut step = 0usize;
            loop {
                interval.tick().await;
                step = (step + 1) % LOADING_PHRASES.len();
                if tx.send(step).is_err() {
                    break;
                }
            }
        });
        Self { handle, rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.rx.clone()
    }
}

impl Drop for LoadingTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct Dispatcher {
    session: Option<UserSession>,
    status: Status,
    next_id: u64,
    in_flight: Option<Ticket>,
    ticker: Option<LoadingTicker>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            session: None,
            status: Status::Idle,
            next_id: 0,
            in_flight: None,
            ticker: None,
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn session(&self) -> Option<&UserSession> {
        self.session.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.status {
            Status::Success(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            Status::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Receiver for loading-phrase steps while a dispatch is in flight.
    pub fn loading_updates(&self) -> Option<watch::Receiver<usize>> {
        self.ticker.as_ref().map(LoadingTicker::subscribe)
    }

    pub fn login(&mut self, profile: Profile) -> &UserSession {
        self.reset();
        self.session.insert(ledger::login(profile))
    }

    /// Destroys the session. Anything in flight is discarded.
    pub fn logout(&mut self) {
        self.reset();
        if let Some(session) = self.session.take() {
            ledger::logout(session);
        }
    }

    /// Simulated plan change; returns the new balance.
    pub fn upgrade(&mut self, plan: Plan) -> Option<u32> {
        let session = self.session.take()?;
        let session = ledger::apply_plan(session, plan);
        let credits = session.credits;
        self.session = Some(session);
        Some(credits)
    }

    /// Idle → Loading, if the session may dispatch.
    pub fn begin(&mut self) -> DispatchOutcome {
        let Some(session) = self.session.as_ref() else {
            return DispatchOutcome::SignedOut;
        };
        match self.status {
            Status::Idle => {}
            Status::Loading => return DispatchOutcome::Busy,
            Status::Success(_) | Status::Error(_) => return DispatchOutcome::NeedsReset,
        }
        if !ledger::can_dispatch(session) {
            info!("No credits left for {}, showing plans", session.email);
            return DispatchOutcome::CreditExhausted;
        }

        self.next_id += 1;
        let ticket = Ticket(self.next_id);
        self.in_flight = Some(ticket);
        self.status = Status::Loading;
        self.ticker = Some(LoadingTicker::start(LOADING_INTERVAL));
        debug!("Dispatch {:?} started", ticket);
        DispatchOutcome::Started(ticket)
    }

    /// Applies the outcome of `ticket`. Returns false when the ticket is
    /// stale and the outcome was ignored.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> bool {
        if self.in_flight != Some(ticket) || self.status != Status::Loading {
            warn!("Ignoring stale completion for {:?}", ticket);
            return false;
        }
        self.in_flight = None;
        self.ticker = None;

        match outcome {
            Ok(result) => {
                self.session = self.session.take().map(ledger::consume_credit);
                self.status = Status::Success(result);
                info!("Analysis {:?} succeeded", ticket);
            }
            Err(e) => {
                let message = e.to_string();
                let message = if message.trim().is_empty() {
                    FALLBACK_ERROR.to_string()
                } else {
                    message
                };
                warn!("Analysis {:?} failed: {}", ticket, message);
                self.status = Status::Error(message);
            }
        }
        true
    }

    /// Back to Idle from anywhere. Safe to call repeatedly.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.ticker = None;
        self.status = Status::Idle;
    }

    pub async fn run<A>(&mut self, analyzer: &A, request: &AnalysisRequest) -> DispatchOutcome
    where
        A: Analyzer + ?Sized,
    {
        let outcome = self.begin();
        if let DispatchOutcome::Started(ticket) = outcome {
            let result = analyzer.analyze(request).await;
            self.complete(ticket, result);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::RequestDraft;
    use crate::models::{Difficulty, FeatureRecommendation, Impact, SeoBlock};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Canned {
        outcome: Result<AnalysisResult, AnalysisError>,
        calls: AtomicU32,
    }

    impl Canned {
        fn new(outcome: Result<AnalysisResult, AnalysisError>) -> Self {
            Self {
                outcome,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Analyzer for Canned {
        async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            seo: SeoBlock {
                title_tag: "EcoStore | Reusable Bottles".to_string(),
                meta_description: "Reusable bottles for everyday life.".to_string(),
                keywords: vec!["reusable bottles".to_string()],
                header_suggestions: vec!["H1: Hydrate Sustainably".to_string()],
            },
            content_improvements: vec!["Add social proof".to_string()],
            accessibility_tips: vec!["Label form inputs".to_string()],
            recommended_features: vec![FeatureRecommendation {
                name: "Refill Finder".to_string(),
                description: "Map of refill stations".to_string(),
                impact: Impact::Medium,
                difficulty: Difficulty::Hard,
                tech_stack_suggestion: None,
                implementation_example: None,
            }],
            summary: "Good foundation, needs engagement hooks.".to_string(),
        }
    }

    fn eco_store() -> AnalysisRequest {
        RequestDraft::new()
            .business_name("EcoStore")
            .target_audience("eco-conscious millennials")
            .description("sells reusable bottles")
            .current_content("")
            .submit()
            .unwrap()
    }

    fn signed_in() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.login(Profile {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            avatar: None,
        });
        dispatcher
    }

    fn credits(dispatcher: &Dispatcher) -> u32 {
        dispatcher.session().unwrap().credits
    }

    #[tokio::test]
    async fn eco_store_scenario_succeeds_and_spends_one_credit() {
        let mut dispatcher = signed_in();
        assert_eq!(credits(&dispatcher), 5);
        let analyzer = Canned::new(Ok(sample_result()));

        let outcome = dispatcher.run(&analyzer, &eco_store()).await;
        assert!(matches!(outcome, DispatchOutcome::Started(_)));
        assert_eq!(credits(&dispatcher), 4);
        let result = dispatcher.result().unwrap();
        assert!(!result.summary.is_empty());
        assert!(dispatcher.loading_updates().is_none());
    }

    #[tokio::test]
    async fn zero_credits_never_reaches_loading() {
        let mut dispatcher = signed_in();
        let analyzer = Canned::new(Ok(sample_result()));
        for _ in 0..5 {
            dispatcher.run(&analyzer, &eco_store()).await;
            dispatcher.reset();
        }
        assert_eq!(credits(&dispatcher), 0);

        let outcome = dispatcher.run(&analyzer, &eco_store()).await;
        assert_eq!(outcome, DispatchOutcome::CreditExhausted);
        assert_eq!(dispatcher.status(), &Status::Idle);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 5);
        assert!(dispatcher.loading_updates().is_none());
    }

    #[tokio::test]
    async fn empty_response_lands_in_error_without_spending() {
        let mut dispatcher = signed_in();
        let analyzer = Canned::new(Err(AnalysisError::EmptyResponse));

        dispatcher.run(&analyzer, &eco_store()).await;
        assert_eq!(dispatcher.error(), Some("No response generated from AI."));
        assert_eq!(credits(&dispatcher), 5);
    }

    #[tokio::test]
    async fn blank_error_message_uses_fallback() {
        let mut dispatcher = signed_in();
        let analyzer = Canned::new(Err(AnalysisError::transport("")));

        dispatcher.run(&analyzer, &eco_store()).await;
        assert_eq!(dispatcher.error(), Some(FALLBACK_ERROR));
    }

    #[tokio::test]
    async fn second_begin_while_loading_is_busy() {
        let mut dispatcher = signed_in();
        let first = dispatcher.begin();
        assert!(matches!(first, DispatchOutcome::Started(_)));
        assert_eq!(dispatcher.begin(), DispatchOutcome::Busy);
        assert_eq!(dispatcher.status(), &Status::Loading);
    }

    #[tokio::test]
    async fn finished_state_requires_reset_before_next_dispatch() {
        let mut dispatcher = signed_in();
        let analyzer = Canned::new(Err(AnalysisError::EmptyResponse));
        dispatcher.run(&analyzer, &eco_store()).await;

        assert_eq!(dispatcher.run(&analyzer, &eco_store()).await, DispatchOutcome::NeedsReset);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        dispatcher.reset();
        assert!(matches!(dispatcher.begin(), DispatchOutcome::Started(_)));
    }

    #[tokio::test]
    async fn completion_after_reset_is_ignored() {
        let mut dispatcher = signed_in();
        let DispatchOutcome::Started(ticket) = dispatcher.begin() else {
            panic!("dispatch should start");
        };
        dispatcher.reset();

        assert!(!dispatcher.complete(ticket, Ok(sample_result())));
        assert_eq!(dispatcher.status(), &Status::Idle);
        assert_eq!(credits(&dispatcher), 5);
    }

    #[tokio::test]
    async fn only_latest_ticket_is_applied() {
        let mut dispatcher = signed_in();
        let DispatchOutcome::Started(old) = dispatcher.begin() else {
            panic!("dispatch should start");
        };
        dispatcher.reset();
        let DispatchOutcome::Started(new) = dispatcher.begin() else {
            panic!("dispatch should start");
        };

        assert!(!dispatcher.complete(old, Err(AnalysisError::EmptyResponse)));
        assert_eq!(dispatcher.status(), &Status::Loading);
        assert!(dispatcher.complete(new, Ok(sample_result())));
        assert_eq!(credits(&dispatcher), 4);
    }

    #[tokio::test]
    async fn reset_is_idempotent_from_success_and_error() {
        let mut dispatcher = signed_in();
        dispatcher.run(&Canned::new(Ok(sample_result())), &eco_store()).await;
        for _ in 0..3 {
            dispatcher.reset();
            assert_eq!(dispatcher.status(), &Status::Idle);
            assert!(dispatcher.result().is_none());
        }

        dispatcher
            .run(&Canned::new(Err(AnalysisError::ParseError("eof".into()))), &eco_store())
            .await;
        assert!(dispatcher.error().is_some());
        for _ in 0..3 {
            dispatcher.reset();
            assert_eq!(dispatcher.status(), &Status::Idle);
            assert!(dispatcher.error().is_none());
        }
    }

    #[tokio::test]
    async fn logout_discards_in_flight_result() {
        let mut dispatcher = signed_in();
        let DispatchOutcome::Started(ticket) = dispatcher.begin() else {
            panic!("dispatch should start");
        };
        dispatcher.logout();
        assert!(dispatcher.session().is_none());
        assert!(!dispatcher.complete(ticket, Ok(sample_result())));
        assert_eq!(dispatcher.begin(), DispatchOutcome::SignedOut);
    }

    #[tokio::test]
    async fn upgrade_refills_credits() {
        let mut dispatcher = signed_in();
        assert_eq!(dispatcher.upgrade(Plan::Pro), Some(50));
        assert_eq!(dispatcher.session().unwrap().plan, Plan::Pro);
        assert_eq!(dispatcher.upgrade(Plan::Premium), Some(999));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_cycles_phrases_on_its_period() {
        let ticker = LoadingTicker::start(LOADING_INTERVAL);
        let rx = ticker.subscribe();
        assert_eq!(LOADING_PHRASES[*rx.borrow()].1, "Scanning Website DNA");
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(LOADING_PHRASES[*rx.borrow()].1, "Checking SEO Vital Signs");
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_stops_when_loading_ends() {
        let mut dispatcher = signed_in();
        let DispatchOutcome::Started(ticket) = dispatcher.begin() else {
            panic!("dispatch should start");
        };
        let mut rx = dispatcher.loading_updates().unwrap();
        dispatcher.complete(ticket, Err(AnalysisError::EmptyResponse));
        assert!(dispatcher.loading_updates().is_none());

        let changed = tokio::time::timeout(Duration::from_secs(30), rx.changed())
            .await
            .expect("sender should be dropped once the task is aborted");
        assert!(changed.is_err());
    }
}
