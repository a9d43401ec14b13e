#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::SinkExt;
use tokio::sync::{watch, Notify};
use url::Url;

use aex_sync::model::{
    Agent, AgentDetail, AnalysisResult, AudioSummary, GraphData, InflowDirection,
    InjectShockRequest, MarketSnapshot, RiskLevel, RiskResult, Sector, ShockEvent,
    TestRunResult, TradeReceipt, TradeSide,
};
use aex_sync::{Connector, MarketApi, MarketView, SyncConfig, SyncError, SyncResult, Transport};

pub fn agent(id: &str, price: f64) -> Agent {
    Agent {
        id: id.to_string(),
        name: format!("{} Agent", id),
        sector: Sector::FraudAml,
        price,
        price_change_pct: 0.0,
        market_cap: price * 10_000.0,
        usage_score: 0.6,
        performance_score: 0.7,
        reliability_score: 0.8,
        risk_score: 0.25,
        inflow_velocity: 0.0,
        inflow_direction: InflowDirection::Flat,
        volatility: 0.05,
        total_backing: 50_000.0,
    }
}

pub fn snapshot(tick: u64, agents: Vec<Agent>) -> MarketSnapshot {
    MarketSnapshot {
        tick_number: tick,
        total_market_cap: agents.iter().map(|a| a.market_cap).sum(),
        cascade_probability: 0.05,
        active_shocks: vec![],
        agents,
        sectors: vec![],
    }
}

pub fn test_config() -> SyncConfig {
    SyncConfig::builder()
        .api_url("http://aex.test")
        .reconnect_delay(Duration::from_secs(3))
        .resync_interval(Duration::from_secs(10))
        .build()
}

/// In-memory pull interface with call counters and an analysis gate.
pub struct FakeApi {
    pub snapshot: Mutex<MarketSnapshot>,
    pub snapshot_calls: AtomicUsize,
    pub fail_snapshots: AtomicBool,
    pub analysis_calls: AtomicUsize,
    pub trade_calls: AtomicUsize,
    /// When set, `run_analysis` waits for `release_analysis`
    pub hold_analysis: AtomicBool,
    analysis_gate: Notify,
    /// When set, `fetch_snapshot` waits for `release_snapshot`
    pub hold_snapshots: AtomicBool,
    snapshot_gate: Notify,
}

impl FakeApi {
    pub fn new(snapshot: MarketSnapshot) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
            snapshot_calls: AtomicUsize::new(0),
            fail_snapshots: AtomicBool::new(false),
            analysis_calls: AtomicUsize::new(0),
            trade_calls: AtomicUsize::new(0),
            hold_analysis: AtomicBool::new(false),
            analysis_gate: Notify::new(),
            hold_snapshots: AtomicBool::new(false),
            snapshot_gate: Notify::new(),
        })
    }

    pub fn set_snapshot(&self, snapshot: MarketSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn release_analysis(&self) {
        self.analysis_gate.notify_one();
    }

    pub fn release_snapshot(&self) {
        self.snapshot_gate.notify_one();
    }
}

#[async_trait]
impl MarketApi for FakeApi {
    async fn fetch_agents(&self) -> SyncResult<Vec<Agent>> {
        Ok(self.snapshot.lock().unwrap().agents.clone())
    }

    async fn fetch_agent(&self, id: &str) -> SyncResult<AgentDetail> {
        let agent = self
            .snapshot
            .lock()
            .unwrap()
            .agents
            .iter()
            .find(|a| a.id == id)
            .cloned();
        match agent {
            Some(agent) => Ok(AgentDetail {
                price_history: vec![agent.price],
                agent,
            }),
            None => Err(SyncError::ApiError {
                status: 404,
                body: "Agent not found".into(),
            }),
        }
    }

    async fn fetch_snapshot(&self) -> SyncResult<MarketSnapshot> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_snapshots.load(Ordering::SeqCst) {
            self.snapshot_gate.notified().await;
        }
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(SyncError::ApiError {
                status: 503,
                body: "Service Unavailable".into(),
            });
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn trade(&self, agent_id: &str, side: TradeSide, amount: f64) -> SyncResult<TradeReceipt> {
        self.trade_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TradeReceipt {
            status: "executed".into(),
            agent_id: agent_id.to_string(),
            amount,
            action: side,
        })
    }

    async fn inject_shock(&self, request: &InjectShockRequest) -> SyncResult<ShockEvent> {
        Ok(ShockEvent {
            id: "shock_1".into(),
            shock_type: request.shock_type,
            severity: request.severity.unwrap_or(0.5),
            description: request.description.clone().unwrap_or_default(),
            timestamp: 1_700_000_000.0,
            ticks_remaining: 5,
            source: "manual".into(),
        })
    }

    async fn run_analysis(&self, _question: Option<&str>) -> SyncResult<AnalysisResult> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_analysis.load(Ordering::SeqCst) {
            self.analysis_gate.notified().await;
        }
        Ok(AnalysisResult {
            text: "Stable".into(),
            model: "test-model".into(),
            input_tokens: 10,
            output_tokens: 5,
            latency_ms: 42,
            cached: false,
        })
    }

    async fn run_risk_analysis(&self) -> SyncResult<RiskResult> {
        Ok(RiskResult {
            text: "Elevated contagion".into(),
            risk_level: RiskLevel::High,
            model: "test-model".into(),
            cached: false,
        })
    }

    async fn run_tests(&self, _test_name: &str) -> SyncResult<TestRunResult> {
        Ok(TestRunResult {
            results: vec![],
            summary: "0/0 PASSED".into(),
            run_id: None,
        })
    }

    async fn fetch_audio_summary(&self, _text: &str) -> SyncResult<AudioSummary> {
        Err(SyncError::ApiError {
            status: 500,
            body: "TTS unavailable".into(),
        })
    }

    async fn fetch_contagion_graph(&self, _shock_id: Option<&str>) -> SyncResult<GraphData> {
        Ok(GraphData {
            nodes: vec![],
            edges: vec![],
            query_type: "contagion".into(),
        })
    }
}

/// Controls for one scripted push connection.
pub struct ScriptedLink {
    pub frames: fmpsc::UnboundedSender<Result<String, SyncError>>,
    pub outbound: fmpsc::UnboundedReceiver<String>,
}

impl ScriptedLink {
    pub fn push(&self, frame: &str) {
        self.frames
            .unbounded_send(Ok(frame.to_string()))
            .expect("stream closed");
    }

    /// Simulate the peer going away.
    pub fn close(self) {
        self.frames.close_channel();
    }
}

/// Hands out queued transports in order, then refuses connections.
#[derive(Default)]
pub struct ScriptedConnector {
    pub attempts: AtomicUsize,
    transports: Mutex<VecDeque<Transport>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept_next(&self) -> ScriptedLink {
        let (frame_tx, frame_rx) = fmpsc::unbounded();
        let (out_tx, out_rx) = fmpsc::unbounded::<String>();
        let sink = out_tx.sink_map_err(|_| SyncError::ChannelClosed);

        self.transports
            .lock()
            .unwrap()
            .push_back(Transport::new(frame_rx, sink));

        ScriptedLink {
            frames: frame_tx,
            outbound: out_rx,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &Url) -> Result<Transport, SyncError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.transports
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SyncError::ConnectionError("Connection refused".into()))
    }
}

/// Wait until the published view satisfies `pred`.
pub async fn wait_for_view(
    rx: &mut watch::Receiver<Arc<MarketView>>,
    pred: impl FnMut(&Arc<MarketView>) -> bool,
) -> Arc<MarketView> {
    let view = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(pred))
        .await
        .expect("timed out waiting for view")
        .expect("engine stopped");
    Arc::clone(&view)
}

/// Live, loaded, and the connect notice has been logged.
pub fn settled_live(view: &Arc<MarketView>) -> bool {
    view.is_live()
        && view.is_loaded()
        && view
            .events
            .iter()
            .any(|e| e.message == "Connected to market stream")
}
