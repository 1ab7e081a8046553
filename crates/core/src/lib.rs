//! # ChatKit Core
//!
//! Domain types, traits, and error definitions for the ChatKit streaming
//! answer assembler. This crate has no async or I/O dependencies; it defines
//! the model that the stream, tools, and backend crates implement against.
//!
//! ## Design Philosophy
//!
//! The assembled answer is a dynamically shaped tree ([`Document`]) that is
//! rebuilt immutably after every patch event. Everything that renders the
//! answer sits behind the [`RenderSink`] trait so hosts can plug in their own
//! message list, and tests can record callbacks with a plain `Vec`.

pub mod error;
pub mod path;
pub mod document;
pub mod event;
pub mod render;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use path::{Path, PathSegment};
pub use document::{Document, Node};
pub use event::{Action, Frame, PatchEvent};
pub use render::{RenderBlock, RenderEvent, RenderSink, ToolBlock};
pub use message::{ChatMessage, MessageBlock, Role};
