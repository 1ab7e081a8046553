//! Coze v3 chat backend.

use async_trait::async_trait;
use chatkit_config::{BackendConfig, BackendKind};
use chatkit_core::error::BackendError;
use serde_json::json;

use crate::http::{client, post_streaming, trim_base_url};
use crate::{Backend, ByteStream, ChatRequest};

pub struct CozeBackend {
    base_url: String,
    bot_id: String,
    user_id: String,
    token: Option<String>,
    capacity: usize,
    client: reqwest::Client,
}

impl CozeBackend {
    pub fn new(base_url: impl Into<String>, bot_id: impl Into<String>) -> Result<Self, BackendError> {
        Ok(Self {
            base_url: trim_base_url(&base_url.into()),
            bot_id: bot_id.into(),
            user_id: "chatkit".into(),
            token: None,
            capacity: 64,
            client: client()?,
        })
    }

    pub fn from_config(config: &BackendConfig, capacity: usize) -> Result<Self, BackendError> {
        let bot_id = config
            .bot_id
            .clone()
            .ok_or_else(|| BackendError::NotConfigured("backend.bot_id is required for coze".into()))?;

        let mut backend = Self::new(&config.base_url, bot_id)?;
        if let Some(user_id) = &config.user_id {
            backend.user_id = user_id.clone();
        }
        backend.token = config.token.clone();
        backend.capacity = capacity;
        Ok(backend)
    }

    pub fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({
            "bot_id": self.bot_id,
            "user_id": self.user_id,
            "stream": true,
            "additional_messages": [{
                "role": "user",
                "content": request.full_query(),
                "content_type": "text",
            }],
        });
        if let Some(id) = &request.conversation_id {
            body["conversation_id"] = json!(id);
        }
        body
    }
}

#[async_trait]
impl Backend for CozeBackend {
    fn name(&self) -> &str {
        "coze"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Coze
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, BackendError> {
        let url = format!("{}/v3/chat", self.base_url);
        post_streaming(
            &self.client,
            "coze",
            &url,
            self.token.as_deref(),
            &self.request_body(request),
            self.capacity,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use httpmock::prelude::*;

    #[test]
    fn body_carries_user_message() {
        let mut config = BackendConfig::default();
        config.bot_id = Some("bot-7".into());
        config.user_id = Some("u-1".into());
        let backend = CozeBackend::from_config(&config, 8).unwrap();

        let body = backend.request_body(&ChatRequest::new("hello").with_conversation("c-2"));
        assert_eq!(body["bot_id"], "bot-7");
        assert_eq!(body["user_id"], "u-1");
        assert_eq!(body["stream"], true);
        assert_eq!(body["conversation_id"], "c-2");
        assert_eq!(body["additional_messages"][0]["content"], "hello");
        assert_eq!(body["additional_messages"][0]["content_type"], "text");
    }

    #[tokio::test]
    async fn posts_to_v3_chat() {
        let payload = "event: conversation.chat.completed\ndata: {}\n\n";
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/chat")
                    .header("authorization", "Bearer pat")
                    .json_body_includes(json!({"bot_id": "bot", "stream": true}).to_string());
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(payload);
            })
            .await;
        let mut backend = CozeBackend::new(format!("{}/", server.base_url()), "bot").unwrap();
        backend.token = Some("pat".into());

        let stream = backend.open_stream(&ChatRequest::new("hi")).await.unwrap();
        let body: Vec<u8> = stream.map(|c| c.unwrap()).collect::<Vec<_>>().await.concat();
        assert_eq!(String::from_utf8(body).unwrap(), payload);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forbidden_is_an_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/chat");
                then.status(403).body("{\"code\":4100}");
            })
            .await;
        let backend = CozeBackend::new(server.base_url(), "bot").unwrap();

        let err = backend.open_stream(&ChatRequest::new("hi")).await.err().unwrap();
        assert!(matches!(err, BackendError::AuthenticationFailed(_)));
    }
}
