//! Merges pull snapshots and push deltas into one consistent market state.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::model::{
    Agent, AgentPatch, AggregateMetrics, AggregatePatch, MarketSnapshot, SectorSummary,
    ShockEvent,
};

/// Agent map keyed by id. Shared with published views, copied on write.
pub type AgentMap = Arc<BTreeMap<String, AgentEntry>>;

/// One agent as currently known.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentEntry {
    /// Full attribute set from a pull.
    Full(Agent),
    /// Id first seen on the stream; only pushed fields are known.
    Partial(AgentPatch),
}

impl AgentEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::Full(agent) => &agent.id,
            Self::Partial(patch) => &patch.id,
        }
    }

    pub fn price(&self) -> Option<f64> {
        match self {
            Self::Full(agent) => Some(agent.price),
            Self::Partial(patch) => patch.price,
        }
    }

    pub fn price_change_pct(&self) -> Option<f64> {
        match self {
            Self::Full(agent) => Some(agent.price_change_pct),
            Self::Partial(patch) => patch.price_change_pct,
        }
    }

    pub fn as_agent(&self) -> Option<&Agent> {
        match self {
            Self::Full(agent) => Some(agent),
            Self::Partial(_) => None,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial(_))
    }

    /// Field-level overwrite. Last message wins.
    pub fn apply(&mut self, patch: &AgentPatch) {
        match self {
            Self::Full(agent) => patch.apply_to(agent),
            Self::Partial(known) => known.merge(patch),
        }
    }
}

/// Owner of the entity snapshot, aggregate metrics and shock state.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    agents: AgentMap,
    metrics: AggregateMetrics,
    sectors: Arc<Vec<SectorSummary>>,
    active_shocks: Arc<Vec<ShockEvent>>,
    latest_shock: Option<ShockEvent>,
    generation: u64,
    ticks_since_pull: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the base layer wholesale. Nothing of the previous generation
    /// survives except `latest_shock`, which pulls never touch.
    pub fn apply_pull_snapshot(&mut self, snapshot: MarketSnapshot) {
        let metrics = AggregateMetrics::from(&snapshot);

        let MarketSnapshot {
            active_shocks,
            agents,
            sectors,
            ..
        } = snapshot;

        let agents: BTreeMap<String, AgentEntry> = agents
            .into_iter()
            .map(|agent| (agent.id.clone(), AgentEntry::Full(agent)))
            .collect();

        self.generation += 1;
        debug!(
            "Applied pull generation {}: tick {} with {} agents ({} push ticks since last pull)",
            self.generation,
            metrics.tick_number,
            agents.len(),
            self.ticks_since_pull
        );

        self.agents = Arc::new(agents);
        self.metrics = metrics;
        self.sectors = Arc::new(sectors);
        self.active_shocks = Arc::new(active_shocks);
        self.ticks_since_pull = 0;
    }

    /// Overwrite the supplied agent and aggregate fields, in order.
    pub fn apply_push_tick(&mut self, deltas: &[AgentPatch], aggregate: AggregatePatch) {
        if !deltas.is_empty() {
            let agents = Arc::make_mut(&mut self.agents);
            for delta in deltas {
                match agents.get_mut(&delta.id) {
                    Some(entry) => entry.apply(delta),
                    None => {
                        trace!("Unknown agent {} on stream, inserting partial", delta.id);
                        agents.insert(delta.id.clone(), AgentEntry::Partial(delta.clone()));
                    }
                }
            }
        }

        aggregate.apply_to(&mut self.metrics);
        self.ticks_since_pull += 1;
    }

    /// Remember the most recent disruption notice.
    pub fn apply_push_event_notice(&mut self, shock: ShockEvent) {
        self.latest_shock = Some(shock);
    }

    pub fn agents(&self) -> &AgentMap {
        &self.agents
    }

    pub fn agent(&self, id: &str) -> Option<&AgentEntry> {
        self.agents.get(id)
    }

    pub fn metrics(&self) -> AggregateMetrics {
        self.metrics
    }

    pub fn sectors(&self) -> &Arc<Vec<SectorSummary>> {
        &self.sectors
    }

    pub fn active_shocks(&self) -> &Arc<Vec<ShockEvent>> {
        &self.active_shocks
    }

    pub fn latest_shock(&self) -> Option<&ShockEvent> {
        self.latest_shock.as_ref()
    }

    /// Number of pulls applied so far. Zero until the first load completes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ticks_since_pull(&self) -> u64 {
        self.ticks_since_pull
    }
}
