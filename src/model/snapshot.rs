use serde::{Deserialize, Serialize};

use super::agent::{Agent, Sector};
use super::shock::ShockEvent;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SectorSummary {
    pub id: Sector,
    pub avg_price_change_pct: f64,
    pub total_market_cap: f64,
    pub agent_count: u32,
}

/// Full authoritative state from `GET /market/snapshot`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketSnapshot {
    pub tick_number: u64,
    pub total_market_cap: f64,
    pub cascade_probability: f64,
    #[serde(default)]
    pub active_shocks: Vec<ShockEvent>,
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub sectors: Vec<SectorSummary>,
}

/// Scalar market-wide values carried alongside the agent map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub tick_number: u64,
    pub total_market_cap: f64,
    pub cascade_probability: f64,
    pub active_shocks: u32,
}

impl From<&MarketSnapshot> for AggregateMetrics {
    fn from(snapshot: &MarketSnapshot) -> Self {
        Self {
            tick_number: snapshot.tick_number,
            total_market_cap: snapshot.total_market_cap,
            cascade_probability: snapshot.cascade_probability,
            active_shocks: snapshot.active_shocks.len() as u32,
        }
    }
}

/// Subset of aggregate fields carried by a push tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregatePatch {
    pub tick_number: Option<u64>,
    pub total_market_cap: Option<f64>,
    pub cascade_probability: Option<f64>,
    pub active_shocks: Option<u32>,
}

impl AggregatePatch {
    pub fn apply_to(&self, metrics: &mut AggregateMetrics) {
        if let Some(v) = self.tick_number {
            metrics.tick_number = v;
        }
        if let Some(v) = self.total_market_cap {
            metrics.total_market_cap = v;
        }
        if let Some(v) = self.cascade_probability {
            metrics.cascade_probability = v;
        }
        if let Some(v) = self.active_shocks {
            metrics.active_shocks = v;
        }
    }
}
