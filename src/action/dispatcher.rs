//! One-in-flight-per-kind guard around the mutating pull operations.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::event_log::{EventLevel, EventLog, EventTag};
use crate::network::MarketApi;

use super::kind::{ActionKind, ActionOutcome, ActionParams, ActionPhase, ActionReply, ActionRequest};

/// Per-kind phase board.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    phases: BTreeMap<ActionKind, ActionPhase>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self {
            phases: ActionKind::ALL
                .into_iter()
                .map(|kind| (kind, ActionPhase::Idle))
                .collect(),
        }
    }

    pub fn phase(&self, kind: ActionKind) -> &ActionPhase {
        static IDLE: ActionPhase = ActionPhase::Idle;
        self.phases.get(&kind).unwrap_or(&IDLE)
    }

    pub fn is_in_flight(&self, kind: ActionKind) -> bool {
        self.phase(kind).is_in_flight()
    }

    /// Snapshot of every kind's phase.
    pub fn board(&self) -> BTreeMap<ActionKind, ActionPhase> {
        self.phases.clone()
    }

    /// Mark the request's kind InFlight. A kind already in flight is
    /// rejected without side effects.
    pub fn begin(&mut self, params: ActionParams) -> SyncResult<ActionRequest> {
        let kind = params.kind();
        if self.is_in_flight(kind) {
            debug!("Rejecting {} request: one already in flight", kind);
            return Err(SyncError::ActionInFlight(kind));
        }

        let request = ActionRequest::new(params);
        self.phases.insert(
            kind,
            ActionPhase::InFlight {
                request: request.clone(),
            },
        );
        info!("Dispatching {} request", kind);
        Ok(request)
    }

    /// Record the completion of an in-flight request and write its Event
    /// Log record. Completions for a kind that is not in flight are ignored.
    pub fn settle(
        &mut self,
        kind: ActionKind,
        result: SyncResult<ActionReply>,
        log: &mut EventLog,
    ) -> Option<&ActionOutcome> {
        let request = match self.phases.get(&kind) {
            Some(ActionPhase::InFlight { request }) => request.clone(),
            _ => {
                warn!("Ignoring {} completion with no request in flight", kind);
                return None;
            }
        };

        let (message, level) = match &result {
            Ok(reply) => describe_success(&request.params, reply),
            Err(e) => {
                warn!("{} request failed: {}", kind, e);
                (format!("{} failed: {}", label(kind), e), EventLevel::Error)
            }
        };
        log.record(message, level, Some(tag(kind)));

        let outcome = ActionOutcome {
            request,
            result: result.map_err(|e| e.to_string()),
            completed_at: Utc::now(),
        };
        self.phases.insert(kind, ActionPhase::Settled(outcome));

        self.phase(kind).outcome()
    }

    /// Consume a Settled outcome and return the kind to Idle.
    /// InFlight and Idle kinds are left alone.
    pub fn acknowledge(&mut self, kind: ActionKind) -> Option<ActionOutcome> {
        match self.phases.get(&kind) {
            Some(ActionPhase::Settled(_)) => match self.phases.insert(kind, ActionPhase::Idle) {
                Some(ActionPhase::Settled(outcome)) => Some(outcome),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Issue the external call for `params`.
pub async fn execute(api: &dyn MarketApi, params: &ActionParams) -> SyncResult<ActionReply> {
    let reply = match params {
        ActionParams::Order {
            agent_id,
            side,
            amount,
        } => ActionReply::Order(api.trade(agent_id, *side, *amount).await?),
        ActionParams::InjectShock(request) => ActionReply::Shock(api.inject_shock(request).await?),
        ActionParams::Analysis { question } => {
            ActionReply::Analysis(api.run_analysis(question.as_deref()).await?)
        }
        ActionParams::RiskAnalysis => ActionReply::Risk(api.run_risk_analysis().await?),
        ActionParams::TestSuite { test_name } => {
            ActionReply::Tests(api.run_tests(test_name).await?)
        }
        ActionParams::AudioSummary { text } => {
            ActionReply::Audio(api.fetch_audio_summary(text).await?)
        }
    };
    Ok(reply)
}

fn label(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Order => "Order",
        ActionKind::InjectShock => "Shock injection",
        ActionKind::Analysis => "Analysis",
        ActionKind::RiskAnalysis => "Risk analysis",
        ActionKind::TestSuite => "Test suite",
        ActionKind::AudioSummary => "Audio summary",
    }
}

fn tag(kind: ActionKind) -> EventTag {
    match kind {
        ActionKind::Order => EventTag::Trade,
        ActionKind::InjectShock => EventTag::Shock,
        ActionKind::Analysis => EventTag::Analysis,
        ActionKind::RiskAnalysis => EventTag::Risk,
        ActionKind::TestSuite => EventTag::Test,
        ActionKind::AudioSummary => EventTag::Audio,
    }
}

fn cached_suffix(cached: bool) -> &'static str {
    if cached {
        " (cached)"
    } else {
        ""
    }
}

fn describe_success(params: &ActionParams, reply: &ActionReply) -> (String, EventLevel) {
    match reply {
        ActionReply::Order(receipt) => (
            format!(
                "{} {} of {}: {}",
                receipt.action.as_str().to_uppercase(),
                receipt.amount,
                receipt.agent_id,
                receipt.status
            ),
            EventLevel::Success,
        ),
        ActionReply::Shock(shock) => (
            format!("Injected {} [{}]", shock.summary(), shock.id),
            EventLevel::Success,
        ),
        ActionReply::Analysis(result) => (
            format!(
                "Analysis by {}: {} tokens in {}ms{}",
                result.model,
                result.total_tokens(),
                result.latency_ms,
                cached_suffix(result.cached)
            ),
            EventLevel::Success,
        ),
        ActionReply::Risk(result) => {
            let level = if result.risk_level.is_elevated() {
                EventLevel::Warn
            } else {
                EventLevel::Success
            };
            (
                format!(
                    "Risk level {} ({}){}",
                    result.risk_level,
                    result.model,
                    cached_suffix(result.cached)
                ),
                level,
            )
        }
        ActionReply::Tests(run) => {
            let name = match params {
                ActionParams::TestSuite { test_name } => test_name.as_str(),
                _ => "tests",
            };
            let level = if run.all_passed() {
                EventLevel::Success
            } else {
                EventLevel::Warn
            };
            let mut message = format!("Test run {}: {}", name, run.summary);
            if let Some(run_id) = &run.run_id {
                message.push_str(&format!(" (run {})", run_id));
            }
            (message, level)
        }
        ActionReply::Audio(summary) => (
            format!("Audio summary ready: {}", summary.audio_url),
            EventLevel::Success,
        ),
    }
}
