//! `chatkit chat`: Stream one live turn.

use chatkit_backends::{AppContext, ChatRequest};
use chatkit_config::AppConfig;
use chatkit_core::error::StreamError;
use chatkit_stream::{FinishReason, StopHandle, Transcript, Turn, drive};
use std::time::Duration;
use tracing::{info, warn};

pub struct ChatOptions {
    pub message: String,
    pub context_title: Option<String>,
    pub context_data: Option<String>,
    pub conversation: Option<String>,
    pub regenerate: Option<String>,
    pub json: bool,
}

impl ChatOptions {
    fn request(&self) -> Result<ChatRequest, Box<dyn std::error::Error>> {
        let mut request = ChatRequest::new(&self.message);
        if let Some(title) = &self.context_title {
            let data = match &self.context_data {
                Some(raw) => serde_json::from_str(raw)
                    .map_err(|e| format!("--context-data is not valid JSON: {e}"))?,
                None => serde_json::Value::Null,
            };
            request = request.with_context(AppContext {
                title: title.clone(),
                data,
            });
        }
        if let Some(id) = &self.conversation {
            request = request.with_conversation(id);
        }
        if let Some(id) = &self.regenerate {
            request = request.regenerate(id);
        }
        Ok(request)
    }
}

pub async fn run(options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let backend = chatkit_backends::build_from_config(&config)?;
    let request = options.request()?;

    let mut transcript = Transcript::new();
    transcript.push_user(&options.message);
    let turn = match &request.regenerate_message_id {
        Some(id) => Turn::regenerate(id.clone()),
        None => Turn::new(),
    };
    transcript.start_assistant_turn(&turn.display_id);

    let body = backend.open_stream(&request).await?;
    let mut assembler = super::build_assembler(&config, backend.kind());

    let stop = StopHandle::new();
    let on_interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping turn");
            on_interrupt.stop();
        }
    });

    let turn_future = drive(body, &mut assembler, turn, &mut transcript, &stop);
    let outcome = match config.stream.turn_timeout_secs {
        0 => turn_future.await?,
        secs => tokio::time::timeout(Duration::from_secs(secs), turn_future)
            .await
            .map_err(|_| StreamError::TimedOut { after_secs: secs })??,
    };

    if outcome.reason == FinishReason::Closed {
        warn!("Stream closed before the backend finished the answer");
    }
    if let Some(conversation_id) = outcome
        .turn
        .document
        .to_value()
        .pointer("/message/conversation_id")
        .and_then(|v| v.as_str())
    {
        info!(conversation_id, "Continue with --conversation");
    }

    super::print_transcript(&transcript, options.json)
}
