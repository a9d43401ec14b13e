use serde::{Deserialize, Serialize};

use super::agent::AgentPatch;
use super::shock::ShockEvent;
use super::snapshot::{AggregatePatch, MarketSnapshot};

/// Every frame on the push stream, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    // 1. Price tick
    Tick(TickMessage),

    // 2. Disruption notice
    Shock { shock: ShockEvent },

    // 3. Free-form server event
    Event(EventNotice),

    // 4. Sent once on accept, carries a full snapshot
    Connected { snapshot: MarketSnapshot },

    // 5. Keep-alive
    Ping,
}

impl StreamMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tick(_) => "tick",
            Self::Shock { .. } => "shock",
            Self::Event(_) => "event",
            Self::Connected { .. } => "connected",
            Self::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TickMessage {
    #[serde(default)]
    pub tick_number: Option<u64>,
    #[serde(default)]
    pub agents: Vec<AgentPatch>,
    #[serde(default)]
    pub total_market_cap: Option<f64>,
    /// Count only; the full list comes from pulls
    #[serde(default)]
    pub active_shocks: Option<u32>,
    #[serde(default)]
    pub cascade_probability: Option<f64>,
}

impl TickMessage {
    pub fn aggregate_patch(&self) -> AggregatePatch {
        AggregatePatch {
            tick_number: self.tick_number,
            total_market_cap: self.total_market_cap,
            cascade_probability: self.cascade_probability,
            active_shocks: self.active_shocks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventNotice {
    pub message: String,
    /// Unix seconds
    pub timestamp: f64,
    pub level: NoticeLevel,
}
