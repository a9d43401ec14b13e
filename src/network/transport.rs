//! The seam between the connection manager and the wire.

use std::pin::Pin;

use async_trait::async_trait;
use futures::future;
use futures::sink::Sink;
use futures::stream::{BoxStream, Stream};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

use crate::error::SyncError;

pub type FrameStream = BoxStream<'static, Result<String, SyncError>>;
pub type FrameSink = Pin<Box<dyn Sink<String, Error = SyncError> + Send>>;

/// An established push connection: inbound text frames plus an outbound sink.
///
/// The stream ending (`None`) means the peer closed the connection.
pub struct Transport {
    pub frames: FrameStream,
    pub sink: FrameSink,
}

impl Transport {
    pub fn new<St, Si>(frames: St, sink: Si) -> Self
    where
        St: Stream<Item = Result<String, SyncError>> + Send + 'static,
        Si: Sink<String, Error = SyncError> + Send + 'static,
    {
        Self {
            frames: frames.boxed(),
            sink: Box::pin(sink),
        }
    }
}

/// Opens push connections. Swapped out in tests for scripted transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Transport, SyncError>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Transport, SyncError> {
        let (ws_stream, _) = connect_async(url.as_str()).await?;

        // 'write' sends frames to the server.
        // 'read' listens for frames from the server.
        let (write, read) = ws_stream.split();

        let frames = read.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!("Server sent close frame: {:?}", frame);
                    None
                }
                // Ping/pong replies are handled by tungstenite
                Ok(_) => None,
                Err(e) => Some(Err(SyncError::from(e))),
            })
        });

        let sink = write.with(|text: String| {
            future::ready(Ok::<_, SyncError>(Message::Text(text.into())))
        });

        Ok(Transport::new(frames, sink))
    }
}
