use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{
    AnalysisResult, AudioSummary, InjectShockRequest, RiskResult, ShockEvent, TestRunResult,
    TradeReceipt, TradeSide,
};

/// Category of mutating request. At most one of each kind is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Order,
    InjectShock,
    Analysis,
    RiskAnalysis,
    TestSuite,
    AudioSummary,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        Self::Order,
        Self::InjectShock,
        Self::Analysis,
        Self::RiskAnalysis,
        Self::TestSuite,
        Self::AudioSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::InjectShock => "inject_shock",
            Self::Analysis => "analysis",
            Self::RiskAnalysis => "risk_analysis",
            Self::TestSuite => "test_suite",
            Self::AudioSummary => "audio_summary",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of one mutating request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ActionParams {
    Order {
        agent_id: String,
        side: TradeSide,
        amount: f64,
    },
    InjectShock(InjectShockRequest),
    Analysis {
        question: Option<String>,
    },
    RiskAnalysis,
    TestSuite {
        test_name: String,
    },
    AudioSummary {
        text: String,
    },
}

impl ActionParams {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Order { .. } => ActionKind::Order,
            Self::InjectShock(_) => ActionKind::InjectShock,
            Self::Analysis { .. } => ActionKind::Analysis,
            Self::RiskAnalysis => ActionKind::RiskAnalysis,
            Self::TestSuite { .. } => ActionKind::TestSuite,
            Self::AudioSummary { .. } => ActionKind::AudioSummary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub params: ActionParams,
    pub submitted_at: DateTime<Utc>,
}

impl ActionRequest {
    pub fn new(params: ActionParams) -> Self {
        Self {
            kind: params.kind(),
            params,
            submitted_at: Utc::now(),
        }
    }
}

/// Successful response of a mutating request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ActionReply {
    Order(TradeReceipt),
    Shock(ShockEvent),
    Analysis(AnalysisResult),
    Risk(RiskResult),
    Tests(TestRunResult),
    Audio(AudioSummary),
}

impl ActionReply {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Order(_) => ActionKind::Order,
            Self::Shock(_) => ActionKind::InjectShock,
            Self::Analysis(_) => ActionKind::Analysis,
            Self::Risk(_) => ActionKind::RiskAnalysis,
            Self::Tests(_) => ActionKind::TestSuite,
            Self::Audio(_) => ActionKind::AudioSummary,
        }
    }
}

/// Terminal result of one request. Failures carry the reason as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub request: ActionRequest,
    pub result: Result<ActionReply, String>,
    pub completed_at: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn reply(&self) -> Option<&ActionReply> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// Per-kind lifecycle: Idle → InFlight → Settled → Idle.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum ActionPhase {
    #[default]
    Idle,
    InFlight {
        request: ActionRequest,
    },
    Settled(ActionOutcome),
}

impl ActionPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight { .. })
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }

    pub fn outcome(&self) -> Option<&ActionOutcome> {
        match self {
            Self::Settled(outcome) => Some(outcome),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShockType;

    #[test]
    fn test_params_map_to_kind() {
        let order = ActionParams::Order {
            agent_id: "sentinel".into(),
            side: TradeSide::Sell,
            amount: 25.0,
        };
        assert_eq!(order.kind(), ActionKind::Order);
        assert_eq!(
            ActionParams::InjectShock(InjectShockRequest::new(ShockType::Cyber)).kind(),
            ActionKind::InjectShock
        );
        assert_eq!(ActionParams::RiskAnalysis.kind(), ActionKind::RiskAnalysis);
    }

    #[test]
    fn test_kind_display_is_snake_case() {
        assert_eq!(ActionKind::RiskAnalysis.to_string(), "risk_analysis");
        assert_eq!(
            serde_json::to_value(ActionKind::AudioSummary).unwrap(),
            serde_json::json!("audio_summary")
        );
    }

    #[test]
    fn test_phase_defaults_idle() {
        let phase = ActionPhase::default();
        assert!(!phase.is_in_flight());
        assert!(phase.outcome().is_none());
    }
}
