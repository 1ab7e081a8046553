//! Shared HTTP plumbing: client construction, status mapping and the body
//! pump that feeds a [`ByteStream`].

use chatkit_core::error::{BackendError, StreamError};
use futures::StreamExt;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::ByteStream;

pub(crate) fn client() -> Result<reqwest::Client, BackendError> {
    // No total timeout: a turn may stream for minutes. The host bounds it.
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| BackendError::NotConfigured(format!("HTTP client: {e}")))
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// POST `body` to `url` and stream the response body back.
pub(crate) async fn post_streaming(
    client: &reqwest::Client,
    backend: &'static str,
    url: &str,
    token: Option<&str>,
    body: &serde_json::Value,
    capacity: usize,
) -> Result<ByteStream, BackendError> {
    debug!(backend, url, "Opening stream");

    let mut request = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("Accept", "text/event-stream")
        .json(body);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }

    let response = request
        .send()
        .await
        .map_err(|e| BackendError::Network(e.to_string()))?;

    let status = response.status().as_u16();

    if status == 401 || status == 403 {
        return Err(BackendError::AuthenticationFailed(
            "Invalid token or insufficient permissions".into(),
        ));
    }

    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();
        warn!(backend, status, body = %error_body, "Backend rejected the turn");
        return Err(BackendError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    let (tx, rx) = tokio::sync::mpsc::channel(capacity);

    // The pump stops as soon as the receiver is dropped, which drops the
    // response and closes the connection.
    tokio::spawn(async move {
        let mut byte_stream = response.bytes_stream();
        while let Some(chunk) = byte_stream.next().await {
            let item = chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| StreamError::Transport(e.to_string()));
            let failed = item.is_err();
            if tx.send(item).await.is_err() {
                debug!(backend, "Stream receiver dropped");
                return;
            }
            if failed {
                return;
            }
        }
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}
