//! Incremental assembly of a streamed agent answer.
//!
//! Bytes from the backend flow through four stages:
//!
//! - [`SseDecoder`] splits the byte stream into [`Frame`]s,
//! - a [`BackendStrategy`] turns each frame into a [`PatchEvent`],
//! - [`merge`] applies the patch to an immutable [`Document`],
//! - the [`Whitelist`] maps the patch path to render callbacks.
//!
//! [`Assembler`] ties the stages together for one frame, and [`drive`] runs
//! a whole turn over an async byte stream.
//!
//! [`Frame`]: chatkit_core::event::Frame
//! [`PatchEvent`]: chatkit_core::event::PatchEvent
//! [`Document`]: chatkit_core::document::Document

pub mod assembler;
pub mod decoder;
pub mod driver;
pub mod identity;
pub mod merge;
pub mod strategy;
pub mod transcript;
pub mod whitelist;

pub use assembler::{Assembler, Reduction, Turn};
pub use decoder::SseDecoder;
pub use driver::{FinishReason, StopHandle, TurnOutcome, drive};
pub use identity::reconcile;
pub use merge::merge;
pub use strategy::{BackendStrategy, CozeStrategy, DipStrategy};
pub use transcript::Transcript;
pub use whitelist::{DispatchContext, Handler, PathPattern, Whitelist};
