//! The async pull loop.
//!
//! [`drive`] owns the byte stream for the length of one turn. It pulls one
//! chunk at a time and reduces every frame decoded from that chunk before
//! pulling the next, so frames are applied strictly in arrival order and
//! nothing is read ahead of the assembler.

use chatkit_core::error::StreamError;
use chatkit_core::render::RenderSink;
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::assembler::{Assembler, Turn};
use crate::decoder::SseDecoder;

/// Why the pull loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The backend sent the `end` patch
    End,
    /// The `[DONE]` sentinel arrived
    Done,
    /// The stream closed without either
    Closed,
    /// The host asked the loop to stop
    Stopped,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::End => "end",
            Self::Done => "done",
            Self::Closed => "closed",
            Self::Stopped => "stopped",
        })
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reason: FinishReason,
    pub turn: Turn,
}

/// Cloneable stop signal for a running [`drive`] loop.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

/// Owns the stream while a turn runs; dropping it releases the reader on
/// every exit path, including cancellation of the driver future.
struct ReaderGuard<S> {
    stream: Pin<Box<S>>,
    display_id: String,
}

impl<S> ReaderGuard<S> {
    fn new(stream: S, display_id: &str) -> Self {
        Self {
            stream: Box::pin(stream),
            display_id: display_id.to_string(),
        }
    }
}

impl<S> Drop for ReaderGuard<S> {
    fn drop(&mut self) {
        debug!(display_id = %self.display_id, "Stream reader released");
    }
}

/// Run one turn over `stream` until `end`, `[DONE]`, close, stop, or a
/// transport error.
pub async fn drive<S, B, E>(
    stream: S,
    assembler: &mut Assembler,
    mut turn: Turn,
    sink: &mut dyn RenderSink,
    stop: &StopHandle,
) -> Result<TurnOutcome, StreamError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<StreamError>,
{
    let mut reader = ReaderGuard::new(stream, &turn.display_id);
    let mut decoder = SseDecoder::new();
    assembler.begin_turn();
    debug!(
        display_id = %turn.display_id,
        strategy = assembler.strategy_name(),
        "Starting turn"
    );

    let reason = loop {
        if stop.is_stopped() {
            break FinishReason::Stopped;
        }

        let next = tokio::select! {
            biased;
            _ = stop.stopped() => break FinishReason::Stopped,
            item = reader.stream.next() => item,
        };

        let closed = next.is_none();
        let frames = match next {
            Some(Ok(chunk)) => decoder.push(chunk.as_ref()),
            Some(Err(e)) => {
                let error: StreamError = e.into();
                warn!(display_id = %turn.display_id, error = %error, "Stream transport failed");
                return Err(error);
            }
            None => decoder.finish(),
        };

        // Frames after `end` in the same chunk are not applied.
        if frames.iter().any(|frame| turn.apply(assembler, frame, sink)) {
            break FinishReason::End;
        }
        if decoder.saw_done() {
            break FinishReason::Done;
        }
        if closed {
            break FinishReason::Closed;
        }
    };

    info!(
        display_id = %turn.display_id,
        reason = %reason,
        applied = turn.frames_applied,
        skipped = turn.frames_skipped,
        "Turn finished"
    );
    drop(reader);
    Ok(TurnOutcome { reason, turn })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::DipStrategy;
    use chatkit_core::render::RenderEvent;
    use futures::stream;

    fn assembler() -> Assembler {
        Assembler::with_defaults(Box::new(DipStrategy::new()))
    }

    type Chunks = stream::Iter<std::vec::IntoIter<Result<Vec<u8>, StreamError>>>;

    fn chunks(parts: &[&str]) -> Chunks {
        let owned: Vec<Result<Vec<u8>, StreamError>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    const ID: &str = r#"data: {"key":["message","id"],"action":"upsert","content":"m-1"}"#;
    const STEP: &str = r#"data: {"key":["message","content","progress",0],"action":"append","content":{"stage":"llm","answer":"Hi"}}"#;
    const END: &str = r#"data: {"action":"end"}"#;

    #[tokio::test]
    async fn stops_at_end_patch() {
        let mut sink: Vec<RenderEvent> = Vec::new();
        let body = format!("{ID}\n\n{STEP}\n\n{END}\n\n{STEP}\n\n");
        let outcome = drive(chunks(&[&body]), &mut assembler(), Turn::new(), &mut sink, &StopHandle::new())
            .await
            .unwrap();

        assert_eq!(outcome.reason, FinishReason::End);
        assert_eq!(outcome.turn.display_id, "m-1");
        assert_eq!(outcome.turn.frames_applied, 3);
        // rename + one text delta; the step after `end` is never applied
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn done_sentinel_finishes_turn() {
        let mut sink: Vec<RenderEvent> = Vec::new();
        let outcome = drive(
            chunks(&[&format!("{STEP}\n"), "data: [DONE]\n"]),
            &mut assembler(),
            Turn::new(),
            &mut sink,
            &StopHandle::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.reason, FinishReason::Done);
        assert!(!outcome.turn.finished);
    }

    #[tokio::test]
    async fn close_flushes_trailing_line() {
        let mut sink: Vec<RenderEvent> = Vec::new();
        let outcome = drive(chunks(&[STEP]), &mut assembler(), Turn::regenerate("m-9"), &mut sink, &StopHandle::new())
            .await
            .unwrap();
        assert_eq!(outcome.reason, FinishReason::Closed);
        assert_eq!(outcome.turn.frames_applied, 1);
        assert_eq!(
            sink,
            vec![RenderEvent::TextDelta { display_id: "m-9".into(), slot: 0, text: "Hi".into() }]
        );
    }

    #[tokio::test]
    async fn transport_error_is_surfaced() {
        let parts: Vec<Result<Vec<u8>, StreamError>> = vec![
            Ok(format!("{ID}\n").into_bytes()),
            Err(StreamError::Transport("reset by peer".into())),
        ];
        let mut sink: Vec<RenderEvent> = Vec::new();
        let err = drive(stream::iter(parts), &mut assembler(), Turn::new(), &mut sink, &StopHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Transport(ref msg) if msg == "reset by peer"));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn stop_before_start() {
        let stop = StopHandle::new();
        stop.stop();
        let mut sink: Vec<RenderEvent> = Vec::new();
        let outcome = drive(chunks(&[STEP]), &mut assembler(), Turn::new(), &mut sink, &stop)
            .await
            .unwrap();
        assert_eq!(outcome.reason, FinishReason::Stopped);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn stop_wakes_a_pending_stream() {
        let stop = StopHandle::new();
        let remote = stop.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            remote.stop();
        });

        let pending = stream::pending::<Result<Vec<u8>, StreamError>>();
        let mut sink: Vec<RenderEvent> = Vec::new();
        let outcome = drive(pending, &mut assembler(), Turn::new(), &mut sink, &stop)
            .await
            .unwrap();
        assert_eq!(outcome.reason, FinishReason::Stopped);
    }

    #[tokio::test]
    async fn stream_is_released_on_every_exit() {
        struct Released(Arc<AtomicBool>);
        impl Drop for Released {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let released = Arc::new(AtomicBool::new(false));
        let marker = Released(released.clone());
        let parts: Vec<Result<Vec<u8>, StreamError>> = vec![
            Ok(format!("{END}\n").into_bytes()),
            Ok(format!("{STEP}\n").into_bytes()),
        ];
        let tracked = stream::iter(parts).map(move |item| {
            let _ = &marker;
            item
        });

        let mut sink: Vec<RenderEvent> = Vec::new();
        let outcome = drive(tracked, &mut assembler(), Turn::new(), &mut sink, &StopHandle::new())
            .await
            .unwrap();
        assert_eq!(outcome.reason, FinishReason::End);
        assert!(released.load(Ordering::SeqCst));
    }
}
