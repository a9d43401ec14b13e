pub mod connection;
pub mod decoder;
pub mod rest;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState, LinkEvent};
pub use decoder::{DecoderStats, MessageDecoder};
pub use rest::{HttpMarketApi, MarketApi, DEFAULT_ANALYSIS_QUESTION};
pub use transport::{Connector, FrameSink, FrameStream, Transport, WsConnector};
