//! Streaming transports for the remote agent backends.
//!
//! Every backend implements [`Backend`]: it opens one streaming completion
//! request and hands back the raw response body as a [`ByteStream`]. Framing,
//! parsing and assembly of that body happen in `chatkit-stream`.

pub mod coze;
pub mod dip;
mod http;

pub use coze::CozeBackend;
pub use dip::DipBackend;

use async_trait::async_trait;
use chatkit_config::{AppConfig, BackendKind};
use chatkit_core::error::{BackendError, StreamError};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Raw response body of a streaming turn.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, StreamError>> + Send>>;

/// Host application context sent along with a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppContext {
    pub title: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// One user turn.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub query: String,
    pub context: Option<AppContext>,
    pub conversation_id: Option<String>,
    /// Id of the assistant message to regenerate
    pub regenerate_message_id: Option<String>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: AppContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn regenerate(mut self, message_id: impl Into<String>) -> Self {
        self.regenerate_message_id = Some(message_id.into());
        self
    }

    /// The query with the context block prefixed, as the backends expect it.
    pub fn full_query(&self) -> String {
        match &self.context {
            Some(ctx) if !ctx.title.is_empty() => {
                let data = serde_json::to_string_pretty(&ctx.data).unwrap_or_default();
                format!("【上下文: {}】\n{}\n\n{}", ctx.title, data, self.query)
            }
            _ => self.query.clone(),
        }
    }
}

/// A remote agent that answers over a streaming HTTP response.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    /// Send the request and return the response body once the backend has
    /// accepted it. A non-2xx status is an error; nothing is streamed.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, BackendError>;
}

/// Build the backend named by `config.backend.kind`.
pub fn build_from_config(config: &AppConfig) -> Result<Box<dyn Backend>, BackendError> {
    let capacity = config.stream.channel_capacity.max(1);
    match config.backend.kind {
        BackendKind::Dip => Ok(Box::new(DipBackend::from_config(&config.backend, capacity)?)),
        BackendKind::Coze => Ok(Box::new(CozeBackend::from_config(&config.backend, capacity)?)),
    }
}
