use std::collections::BTreeMap;
use std::sync::Arc;

use crate::action::{ActionKind, ActionPhase};
use crate::event_log::EventRecord;
use crate::model::{AggregateMetrics, SectorSummary, ShockEvent};
use crate::network::ConnectionState;

use super::reconciler::{AgentEntry, AgentMap, Reconciler};

/// Immutable snapshot of everything an observer may display.
///
/// Published once per engine step. Cloning is cheap: the agent map and
/// lists are shared with the engine until it next writes them.
#[derive(Debug, Clone, Default)]
pub struct MarketView {
    pub connection: ConnectionState,
    pub agents: AgentMap,
    pub metrics: AggregateMetrics,
    pub sectors: Arc<Vec<SectorSummary>>,
    pub active_shocks: Arc<Vec<ShockEvent>>,
    pub latest_shock: Option<ShockEvent>,
    /// Pulls applied so far; zero means no snapshot has loaded yet
    pub generation: u64,
    pub events: Vec<EventRecord>,
    pub actions: BTreeMap<ActionKind, ActionPhase>,
    pub last_pull_error: Option<String>,
}

impl MarketView {
    pub(crate) fn compose(
        connection: ConnectionState,
        reconciler: &Reconciler,
        events: Vec<EventRecord>,
        actions: BTreeMap<ActionKind, ActionPhase>,
        last_pull_error: Option<String>,
    ) -> Self {
        Self {
            connection,
            agents: Arc::clone(reconciler.agents()),
            metrics: reconciler.metrics(),
            sectors: Arc::clone(reconciler.sectors()),
            active_shocks: Arc::clone(reconciler.active_shocks()),
            latest_shock: reconciler.latest_shock().cloned(),
            generation: reconciler.generation(),
            events,
            actions,
            last_pull_error,
        }
    }

    /// Live data only while connected; otherwise this is the stale snapshot.
    pub fn is_live(&self) -> bool {
        self.connection.is_live()
    }

    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }

    pub fn agent(&self, id: &str) -> Option<&AgentEntry> {
        self.agents.get(id)
    }

    pub fn action(&self, kind: ActionKind) -> Option<&ActionPhase> {
        self.actions.get(&kind)
    }

    /// Agents ordered by absolute price change, largest first.
    pub fn top_movers(&self, limit: usize) -> Vec<&AgentEntry> {
        let mut movers: Vec<&AgentEntry> = self
            .agents
            .values()
            .filter(|entry| entry.price_change_pct().is_some())
            .collect();
        movers.sort_by(|a, b| {
            let a = a.price_change_pct().unwrap_or_default().abs();
            let b = b.price_change_pct().unwrap_or_default().abs();
            b.total_cmp(&a)
        });
        movers.truncate(limit);
        movers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::agent::sample_agent;
    use crate::model::{AgentPatch, AggregatePatch, MarketSnapshot};

    #[test]
    fn test_compose_shares_reconciler_state() {
        let mut rec = Reconciler::new();
        let mut flat = sample_agent("flat", 10.0);
        flat.price_change_pct = 0.5;
        let mut crash = sample_agent("crash", 10.0);
        crash.price_change_pct = -8.0;
        rec.apply_pull_snapshot(MarketSnapshot {
            tick_number: 4,
            total_market_cap: 20.0,
            cascade_probability: 0.4,
            active_shocks: vec![],
            agents: vec![flat, crash],
            sectors: vec![],
        });
        rec.apply_push_tick(
            &[AgentPatch {
                price_change_pct: Some(3.0),
                ..AgentPatch::new("partial")
            }],
            AggregatePatch::default(),
        );

        let view = MarketView::compose(
            ConnectionState::Connected,
            &rec,
            vec![],
            BTreeMap::new(),
            None,
        );

        assert!(view.is_live());
        assert!(view.is_loaded());
        assert!(Arc::ptr_eq(&view.agents, rec.agents()));

        let movers: Vec<&str> = view.top_movers(2).into_iter().map(AgentEntry::id).collect();
        assert_eq!(movers, vec!["crash", "partial"]);
    }

    #[test]
    fn test_default_view_is_stale_and_empty() {
        let view = MarketView::default();
        assert!(!view.is_live());
        assert!(!view.is_loaded());
        assert!(view.agents.is_empty());
    }
}
