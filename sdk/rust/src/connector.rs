//! Transports that turn a stream URL into a sequence of message payloads.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use std::pin::Pin;
use url::Url;

use crate::error::StreamError;

/// Raw `data` payloads, one per message. Comments and keep-alives are not
/// yielded. The stream ending means the server closed the connection.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection. Resolves once the server has accepted it.
    async fn open(&self, url: &Url) -> Result<MessageStream, StreamError>;
}

/// Server-sent events over HTTP.
#[derive(Debug, Clone, Default)]
pub struct SseConnector {
    client: reqwest::Client,
}

impl SseConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connector for SseConnector {
    async fn open(&self, url: &Url) -> Result<MessageStream, StreamError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let messages = response.bytes_stream().eventsource().map(|event| {
            event
                .map(|event| event.data)
                .map_err(|e| StreamError::Protocol(e.to_string()))
        });

        Ok(Box::pin(messages))
    }
}
