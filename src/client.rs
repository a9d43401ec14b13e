use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::action::{ActionKind, ActionOutcome, ActionParams, ActionRequest};
use crate::config::SyncConfig;
use crate::engine::{EngineCommand, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::model::{AgentDetail, GraphData, InjectShockRequest, TradeSide};
use crate::network::{Connector, HttpMarketApi, MarketApi, WsConnector};
use crate::state::MarketView;

/// Handle to a running sync engine.
///
/// Observers read state through [`MarketClient::view`] or
/// [`MarketClient::subscribe`]; everything that changes state goes through
/// the engine's command queue.
pub struct MarketClient {
    // Channel to send commands to the engine
    command_sender: mpsc::Sender<EngineCommand>,

    view: watch::Receiver<Arc<MarketView>>,

    // Read-only pass-through calls skip the engine
    api: Arc<dyn MarketApi>,

    shutdown: CancellationToken,
    engine: Option<JoinHandle<()>>,
}

impl MarketClient {
    /// Start syncing against the backend named by `config`, over HTTP and
    /// WebSocket.
    pub fn start(config: SyncConfig) -> SyncResult<Self> {
        let api = HttpMarketApi::new(&config.api_url, config.request_timeout)?;
        Ok(Self::with_parts(config, Arc::new(api), Arc::new(WsConnector)))
    }

    /// Start with caller-provided pull and push implementations.
    pub fn with_parts(
        config: SyncConfig,
        api: Arc<dyn MarketApi>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (command_sender, command_receiver) =
            mpsc::channel(config.command_channel_capacity.max(1));
        let (view_sender, view) = watch::channel(Arc::new(MarketView::default()));
        let shutdown = CancellationToken::new();

        let engine = SyncEngine::new(
            &config,
            Arc::clone(&api),
            connector,
            command_receiver,
            view_sender,
            shutdown.clone(),
        );

        // Spawn the engine in background
        let engine = tokio::spawn(engine.run());
        info!("Market client started against {}", config.api_url);

        Self {
            command_sender,
            view,
            api,
            shutdown,
            engine: Some(engine),
        }
    }

    /// Latest published view.
    pub fn view(&self) -> Arc<MarketView> {
        Arc::clone(&self.view.borrow())
    }

    /// A receiver notified after every engine step.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MarketView>> {
        self.view.clone()
    }

    /// Submit a mutating request. Fails with [`SyncError::ActionInFlight`] if
    /// the same kind is already outstanding. The outcome shows up in the
    /// view once the call settles.
    pub async fn dispatch(&self, params: ActionParams) -> SyncResult<ActionRequest> {
        let (reply, rx) = oneshot::channel();
        self.command(EngineCommand::Dispatch { params, reply }).await?;
        rx.await.map_err(|_| SyncError::ChannelClosed)?
    }

    pub async fn buy(&self, agent_id: &str, amount: f64) -> SyncResult<ActionRequest> {
        self.order(agent_id, TradeSide::Buy, amount).await
    }

    pub async fn sell(&self, agent_id: &str, amount: f64) -> SyncResult<ActionRequest> {
        self.order(agent_id, TradeSide::Sell, amount).await
    }

    async fn order(&self, agent_id: &str, side: TradeSide, amount: f64) -> SyncResult<ActionRequest> {
        self.dispatch(ActionParams::Order {
            agent_id: agent_id.to_string(),
            side,
            amount,
        })
        .await
    }

    pub async fn inject_shock(&self, request: InjectShockRequest) -> SyncResult<ActionRequest> {
        self.dispatch(ActionParams::InjectShock(request)).await
    }

    pub async fn run_analysis(&self, question: Option<&str>) -> SyncResult<ActionRequest> {
        self.dispatch(ActionParams::Analysis {
            question: question.map(str::to_string),
        })
        .await
    }

    pub async fn run_risk_analysis(&self) -> SyncResult<ActionRequest> {
        self.dispatch(ActionParams::RiskAnalysis).await
    }

    pub async fn run_tests(&self, test_name: &str) -> SyncResult<ActionRequest> {
        self.dispatch(ActionParams::TestSuite {
            test_name: test_name.to_string(),
        })
        .await
    }

    pub async fn audio_summary(&self, text: &str) -> SyncResult<ActionRequest> {
        self.dispatch(ActionParams::AudioSummary {
            text: text.to_string(),
        })
        .await
    }

    /// Wait until `kind` is Settled and return its outcome without
    /// acknowledging it.
    pub async fn settled(&self, kind: ActionKind) -> SyncResult<ActionOutcome> {
        let mut view = self.view.clone();
        let current = view
            .wait_for(|v| v.action(kind).is_some_and(|phase| phase.is_settled()))
            .await
            .map_err(|_| SyncError::ChannelClosed)?;

        current
            .action(kind)
            .and_then(|phase| phase.outcome())
            .cloned()
            .ok_or(SyncError::ChannelClosed)
    }

    /// Consume a Settled outcome, returning the kind to Idle.
    pub async fn acknowledge(&self, kind: ActionKind) -> SyncResult<Option<ActionOutcome>> {
        let (reply, rx) = oneshot::channel();
        self.command(EngineCommand::Acknowledge { kind, reply })
            .await?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn clear_events(&self) -> SyncResult<()> {
        self.command(EngineCommand::ClearEvents).await
    }

    /// Fetch and apply a fresh snapshot now.
    pub async fn refresh(&self) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.command(EngineCommand::Refresh { reply }).await?;
        rx.await.map_err(|_| SyncError::ChannelClosed)?
    }

    /// Ask the connection manager to connect now.
    pub async fn connect(&self) -> SyncResult<()> {
        self.command(EngineCommand::Connect).await
    }

    /// Agent detail with price history. Not merged into the view.
    pub async fn fetch_agent(&self, id: &str) -> SyncResult<AgentDetail> {
        self.api.fetch_agent(id).await
    }

    pub async fn fetch_contagion_graph(&self, shock_id: Option<&str>) -> SyncResult<GraphData> {
        self.api.fetch_contagion_graph(shock_id).await
    }

    /// Stop the engine: cancels the resync timer and any pending reconnect,
    /// closes the stream, and waits for the engine task to finish.
    pub async fn teardown(mut self) {
        self.shutdown.cancel();
        if let Some(engine) = self.engine.take() {
            if let Err(e) = engine.await {
                error!("Sync engine ended abnormally: {}", e);
            }
        }
    }

    async fn command(&self, cmd: EngineCommand) -> SyncResult<()> {
        self.command_sender
            .send(cmd)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }
}

impl Drop for MarketClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
