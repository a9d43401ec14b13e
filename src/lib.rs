pub mod action;
pub mod client;
pub mod config;
mod engine;
mod error;
pub mod event_log;
pub mod model;
pub mod network;
pub mod state;

pub use action::{ActionKind, ActionOutcome, ActionParams, ActionPhase, ActionReply, ActionRequest};
pub use client::MarketClient;
pub use config::{SyncConfig, SyncConfigBuilder};
pub use error::{SyncError, SyncResult};
pub use event_log::{EventLevel, EventLog, EventRecord, EventTag};
pub use network::{ConnectionState, Connector, HttpMarketApi, MarketApi, Transport, WsConnector};
pub use state::{AgentEntry, MarketView};
