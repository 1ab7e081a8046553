//! `chatkit replay`: Assemble a recorded SSE capture.

use chatkit_config::{AppConfig, BackendKind};
use chatkit_core::error::StreamError;
use chatkit_stream::{StopHandle, Transcript, Turn, drive};
use futures::stream;
use std::path::Path;
use tracing::info;

pub async fn run(
    file: &Path,
    backend: Option<&str>,
    chunk_size: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let kind = match backend {
        Some(name) => BackendKind::parse(name).ok_or_else(|| format!("Unknown backend: {name}"))?,
        None => config.backend.kind,
    };

    let capture = std::fs::read(file).map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let chunks: Vec<Result<Vec<u8>, StreamError>> = capture
        .chunks(chunk_size.max(1))
        .map(|c| Ok(c.to_vec()))
        .collect();

    let mut assembler = super::build_assembler(&config, kind);
    let mut transcript = Transcript::new();
    let turn = Turn::new();
    transcript.start_assistant_turn(&turn.display_id);

    let outcome = drive(
        stream::iter(chunks),
        &mut assembler,
        turn,
        &mut transcript,
        &StopHandle::new(),
    )
    .await?;

    info!(
        reason = %outcome.reason,
        applied = outcome.turn.frames_applied,
        skipped = outcome.turn.frames_skipped,
        "Replay finished"
    );
    super::print_transcript(&transcript, json)
}
