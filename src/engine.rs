//! The single task that owns all synchronization state.
//!
//! Every input source feeds its own bounded queue. The engine drains them in
//! one `select!` loop, mutates the decoder, reconciler, event log and
//! dispatcher without locks, and publishes an immutable [`MarketView`] after
//! each step.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::action::{execute, ActionDispatcher, ActionKind, ActionOutcome, ActionParams, ActionReply, ActionRequest};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::event_log::{EventLevel, EventLog, EventTag};
use crate::model::{MarketSnapshot, StreamMessage};
use crate::network::{
    ConnectionManager, ConnectionState, Connector, LinkEvent, MarketApi, MessageDecoder,
};
use crate::state::{MarketView, Reconciler};

const PULL_CHANNEL_CAPACITY: usize = 8;

/// Requests from a [`crate::MarketClient`] handle.
#[derive(Debug)]
pub(crate) enum EngineCommand {
    Dispatch {
        params: ActionParams,
        reply: oneshot::Sender<SyncResult<ActionRequest>>,
    },
    Acknowledge {
        kind: ActionKind,
        reply: oneshot::Sender<Option<ActionOutcome>>,
    },
    ClearEvents,
    Refresh {
        reply: oneshot::Sender<SyncResult<()>>,
    },
    Connect,
}

#[derive(Debug)]
enum PullTrigger {
    Initial,
    Resync,
    Manual(oneshot::Sender<SyncResult<()>>),
}

struct PullCompletion {
    trigger: PullTrigger,
    result: SyncResult<MarketSnapshot>,
}

struct ActionCompletion {
    kind: ActionKind,
    result: SyncResult<ActionReply>,
}

pub(crate) struct SyncEngine {
    api: Arc<dyn MarketApi>,
    link: ConnectionManager,
    connection: ConnectionState,

    decoder: MessageDecoder,
    reconciler: Reconciler,
    log: EventLog,
    dispatcher: ActionDispatcher,

    resync_interval: Duration,
    pulls_outstanding: usize,
    last_pull_error: Option<String>,

    link_rx: mpsc::Receiver<LinkEvent>,
    pull_tx: mpsc::Sender<PullCompletion>,
    pull_rx: mpsc::Receiver<PullCompletion>,
    action_tx: mpsc::Sender<ActionCompletion>,
    action_rx: mpsc::Receiver<ActionCompletion>,
    command_rx: mpsc::Receiver<EngineCommand>,

    view_tx: watch::Sender<Arc<MarketView>>,
    shutdown: CancellationToken,
}

impl SyncEngine {
    pub(crate) fn new(
        config: &SyncConfig,
        api: Arc<dyn MarketApi>,
        connector: Arc<dyn Connector>,
        command_rx: mpsc::Receiver<EngineCommand>,
        view_tx: watch::Sender<Arc<MarketView>>,
        shutdown: CancellationToken,
    ) -> Self {
        // An unusable API URL surfaces as a connect failure notice
        let stream_url = config
            .stream_url()
            .map(String::from)
            .unwrap_or_else(|_| config.api_url.clone());

        let (link_tx, link_rx) = mpsc::channel(config.link_channel_capacity.max(1));
        let link = ConnectionManager::new(
            stream_url,
            connector,
            config.reconnect_delay,
            link_tx,
            config.command_channel_capacity,
        );

        let (pull_tx, pull_rx) = mpsc::channel(PULL_CHANNEL_CAPACITY);
        let (action_tx, action_rx) = mpsc::channel(ActionKind::ALL.len());

        Self {
            api,
            connection: link.state(),
            link,
            decoder: MessageDecoder::new(),
            reconciler: Reconciler::new(),
            log: EventLog::with_capacity(config.event_log_capacity),
            dispatcher: ActionDispatcher::new(),
            resync_interval: config.resync_interval,
            pulls_outstanding: 0,
            last_pull_error: None,
            link_rx,
            pull_tx,
            pull_rx,
            action_tx,
            action_rx,
            command_rx,
            view_tx,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Sync engine started");

        self.link.connect();
        self.spawn_pull(PullTrigger::Initial);
        self.publish();

        let period = self.resync_interval.max(Duration::from_millis(1));
        let mut resync = interval_at(Instant::now() + period, period);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                // Pull completions first so a fresh base layer lands before queued deltas
                Some(done) = self.pull_rx.recv() => self.on_pull(done),

                Some(event) = self.link_rx.recv() => self.on_link_event(event),

                Some(done) = self.action_rx.recv() => {
                    self.dispatcher.settle(done.kind, done.result, &mut self.log);
                }

                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => {
                        info!("All client handles dropped, stopping engine");
                        break;
                    }
                },

                _ = resync.tick() => self.on_resync(),
            }

            self.publish();
        }

        // Stop accepting link events so a blocked link task can finish
        self.link_rx.close();
        self.link.teardown().await;
        self.connection = ConnectionState::Disconnected;
        self.publish();
        info!("Sync engine stopped");
    }

    // Called ahead of any reply so callers observe their own change
    fn publish(&self) {
        let view = MarketView::compose(
            self.connection,
            &self.reconciler,
            self.log.entries(),
            self.dispatcher.board(),
            self.last_pull_error.clone(),
        );
        self.view_tx.send_replace(Arc::new(view));
    }

    fn spawn_pull(&mut self, trigger: PullTrigger) {
        let api = Arc::clone(&self.api);
        let tx = self.pull_tx.clone();
        self.pulls_outstanding += 1;

        tokio::spawn(async move {
            let result = api.fetch_snapshot().await;
            if tx.send(PullCompletion { trigger, result }).await.is_err() {
                debug!("Discarding snapshot fetched after shutdown");
            }
        });
    }

    fn on_resync(&mut self) {
        if self.pulls_outstanding > 0 {
            debug!("Skipping resync: pull already outstanding");
            return;
        }
        self.spawn_pull(PullTrigger::Resync);
    }

    fn on_pull(&mut self, done: PullCompletion) {
        self.pulls_outstanding = self.pulls_outstanding.saturating_sub(1);

        match done.result {
            Ok(snapshot) => {
                self.reconciler.apply_pull_snapshot(snapshot);
                self.last_pull_error = None;
                if let PullTrigger::Manual(reply) = done.trigger {
                    self.publish();
                    let _ = reply.send(Ok(()));
                }
            }
            Err(e) => {
                self.last_pull_error = Some(e.to_string());
                match done.trigger {
                    PullTrigger::Manual(reply) => {
                        warn!("Manual refresh failed: {}", e);
                        self.publish();
                        let _ = reply.send(Err(e));
                    }
                    PullTrigger::Initial => warn!("Initial snapshot load failed: {}", e),
                    PullTrigger::Resync => warn!("Resync failed: {}", e),
                }
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::State(state) => {
                debug!("Connection state -> {}", state);
                self.connection = state;
            }
            LinkEvent::Notice { message, level } => {
                self.log.record(message, level, Some(EventTag::System));
            }
            LinkEvent::Frame(raw) => {
                if let Some(message) = self.decoder.decode(&raw) {
                    self.on_message(message);
                }
            }
        }
    }

    fn on_message(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::Tick(tick) => {
                let aggregate = tick.aggregate_patch();
                self.reconciler.apply_push_tick(&tick.agents, aggregate);
            }
            StreamMessage::Shock { shock } => {
                self.log
                    .record(shock.summary(), EventLevel::Warn, Some(EventTag::Shock));
                self.reconciler.apply_push_event_notice(shock);
            }
            StreamMessage::Event(notice) => {
                self.log
                    .record(notice.message, notice.level.into(), Some(EventTag::Event));
            }
            StreamMessage::Connected { snapshot } => {
                debug!("Stream greeting carried snapshot at tick {}", snapshot.tick_number);
                self.reconciler.apply_pull_snapshot(snapshot);
            }
            StreamMessage::Ping => trace!("ping"),
        }
    }

    fn on_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Dispatch { params, reply } => {
                let result = self.dispatcher.begin(params);
                if let Ok(request) = &result {
                    self.spawn_action(request);
                    self.publish();
                }
                let _ = reply.send(result);
            }
            EngineCommand::Acknowledge { kind, reply } => {
                let outcome = self.dispatcher.acknowledge(kind);
                self.publish();
                let _ = reply.send(outcome);
            }
            EngineCommand::ClearEvents => self.log.clear(),
            EngineCommand::Refresh { reply } => self.spawn_pull(PullTrigger::Manual(reply)),
            EngineCommand::Connect => self.link.connect(),
        }
    }

    // Runs to completion even if the engine stops first
    fn spawn_action(&self, request: &ActionRequest) {
        let api = Arc::clone(&self.api);
        let tx = self.action_tx.clone();
        let kind = request.kind;
        let params = request.params.clone();

        tokio::spawn(async move {
            let result = execute(api.as_ref(), &params).await;
            if tx.send(ActionCompletion { kind, result }).await.is_err() {
                debug!("Discarding {} result after shutdown", kind);
            }
        });
    }
}
