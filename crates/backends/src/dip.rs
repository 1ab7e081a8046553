//! DIP agent factory backend.
//!
//! `POST {base_url}/app/{agent_key}/chat/completion` with incremental
//! streaming turned on; the response is a stream of JSON patch frames.

use async_trait::async_trait;
use chatkit_config::{BackendConfig, BackendKind};
use chatkit_core::error::BackendError;
use serde_json::json;

use crate::http::{client, post_streaming, trim_base_url};
use crate::{Backend, ByteStream, ChatRequest};

pub struct DipBackend {
    base_url: String,
    agent_key: String,
    agent_id: Option<String>,
    agent_version: String,
    executor_version: String,
    token: Option<String>,
    capacity: usize,
    client: reqwest::Client,
}

impl DipBackend {
    pub fn new(base_url: impl Into<String>, agent_key: impl Into<String>) -> Result<Self, BackendError> {
        Ok(Self {
            base_url: trim_base_url(&base_url.into()),
            agent_key: agent_key.into(),
            agent_id: None,
            agent_version: "latest".into(),
            executor_version: "v2".into(),
            token: None,
            capacity: 64,
            client: client()?,
        })
    }

    pub fn from_config(config: &BackendConfig, capacity: usize) -> Result<Self, BackendError> {
        let agent_key = config
            .agent_key
            .clone()
            .ok_or_else(|| BackendError::NotConfigured("backend.agent_key is required for dip".into()))?;

        let mut backend = Self::new(&config.base_url, agent_key)?;
        backend.agent_id = config.agent_id.clone();
        backend.agent_version = config.agent_version.clone();
        backend.executor_version = config.executor_version.clone();
        backend.token = config.token.clone();
        backend.capacity = capacity;
        Ok(backend)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn completion_url(&self) -> String {
        format!("{}/app/{}/chat/completion", self.base_url, self.agent_key)
    }

    pub fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({
            "agent_id": self.agent_id,
            "agent_version": self.agent_version,
            "executor_version": self.executor_version,
            "query": request.full_query(),
            "stream": true,
            "inc_stream": true,
            "chat_option": {
                "is_need_history": true,
                "is_need_doc_retrival_post_process": true,
                "is_need_progress": true,
                "enable_dependency_cache": true,
            },
        });

        if let Some(ctx) = &request.context {
            body["custom_querys"] = ctx.data.clone();
        }
        if let Some(id) = &request.conversation_id {
            body["conversation_id"] = json!(id);
        }
        if let Some(id) = &request.regenerate_message_id {
            body["regenerate_assistant_message_id"] = json!(id);
        }
        body
    }
}

#[async_trait]
impl Backend for DipBackend {
    fn name(&self) -> &str {
        "dip"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Dip
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, BackendError> {
        post_streaming(
            &self.client,
            "dip",
            &self.completion_url(),
            self.token.as_deref(),
            &self.request_body(request),
            self.capacity,
        )
        .await
    }
}
