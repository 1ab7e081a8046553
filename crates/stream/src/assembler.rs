//! The assembler: one frame in, one new document out.
//!
//! `reduce` is the single entry point hosts call per decoded frame:
//!
//! 1. the backend strategy parses the frame (unparseable frames are skipped
//!    and the previous document is kept),
//! 2. the patch is merged into a new document (a refused merge skips the
//!    frame the same way),
//! 3. the display id is reconciled with `message.id`,
//! 4. the whitelist dispatches render side effects under the current id.
//!
//! Identity reconciliation runs before dispatch and for every merged patch,
//! inert or not, so a patch that both sets `message.id` and produces output
//! already renders under the new id.

use chatkit_core::document::Document;
use chatkit_core::event::Frame;
use chatkit_core::message::ChatMessage;
use chatkit_core::render::RenderSink;
use chatkit_tools::{ExtractorRegistry, SkillFilter};
use tracing::{debug, info, trace};

use crate::identity::reconcile;
use crate::merge::try_merge;
use crate::strategy::BackendStrategy;
use crate::whitelist::{Collaborators, DEFAULT_PROGRESS_ROOTS, Whitelist};

/// Result of reducing one frame.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub document: Document,
    /// Display id after this frame (renamed if the frame set `message.id`)
    pub display_id: String,
    /// The frame was the `end` event
    pub finished: bool,
    /// Whether the frame parsed into a patch (false means it was skipped)
    pub applied: bool,
}

/// Per-host assembler: a backend strategy plus the read-only dispatch
/// collaborators. Build it once and reuse it for every turn.
pub struct Assembler {
    strategy: Box<dyn BackendStrategy>,
    whitelist: Whitelist,
    extractors: ExtractorRegistry,
    filter: SkillFilter,
}

impl Assembler {
    pub fn new(
        strategy: Box<dyn BackendStrategy>,
        whitelist: Whitelist,
        extractors: ExtractorRegistry,
        filter: SkillFilter,
    ) -> Self {
        Self {
            strategy,
            whitelist,
            extractors,
            filter,
        }
    }

    /// Standard whitelist, built-in extractors and the default skill filter.
    pub fn with_defaults(strategy: Box<dyn BackendStrategy>) -> Self {
        Self::new(
            strategy,
            Whitelist::standard(DEFAULT_PROGRESS_ROOTS),
            chatkit_tools::default_registry(),
            SkillFilter::default(),
        )
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Reset per-turn strategy state. Call before the first frame of a turn.
    pub fn begin_turn(&mut self) {
        self.strategy.reset();
    }

    /// Reduce one frame against the previous document.
    pub fn reduce(
        &mut self,
        frame: &Frame,
        prev: &Document,
        display_id: &str,
        sink: &mut dyn RenderSink,
    ) -> Reduction {
        let Some(event) = self.strategy.parse(frame) else {
            debug!(display_id, event_type = %frame.event_type, "Skipping frame");
            return Reduction {
                document: prev.clone(),
                display_id: display_id.to_string(),
                finished: false,
                applied: false,
            };
        };

        if event.is_end() {
            debug!(display_id, seq = ?event.sequence, "Received end");
            return Reduction {
                document: prev.clone(),
                display_id: display_id.to_string(),
                finished: true,
                applied: true,
            };
        }

        trace!(
            display_id,
            seq = ?event.sequence,
            action = %event.action,
            path = %event.path,
            "Merging patch"
        );
        let Some(document) = try_merge(prev, &event.path, event.action, &event.content) else {
            return Reduction {
                document: prev.clone(),
                display_id: display_id.to_string(),
                finished: false,
                applied: false,
            };
        };

        let display_id = match reconcile(&document, display_id) {
            Some(new_id) => {
                info!(old_id = display_id, new_id = %new_id, "Message id assigned");
                sink.on_identity_renamed(display_id, &new_id);
                new_id
            }
            None => display_id.to_string(),
        };

        let tools = Collaborators {
            extractors: &self.extractors,
            filter: &self.filter,
        };
        self.whitelist
            .dispatch(&event, &document, &display_id, tools, sink);

        Reduction {
            document,
            display_id,
            finished: false,
            applied: true,
        }
    }
}

/// State of one assistant turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub document: Document,
    pub display_id: String,
    pub finished: bool,
    pub frames_applied: usize,
    pub frames_skipped: usize,
}

impl Turn {
    /// A fresh turn under a generated `assistant-<uuid>` id.
    pub fn new() -> Self {
        Self::regenerate(ChatMessage::local_assistant_id())
    }

    /// A turn that streams into an existing message, e.g. when regenerating
    /// an answer.
    pub fn regenerate(display_id: impl Into<String>) -> Self {
        Self {
            document: Document::new(),
            display_id: display_id.into(),
            finished: false,
            frames_applied: 0,
            frames_skipped: 0,
        }
    }

    /// Reduce `frame` into this turn. Returns whether the turn has finished.
    pub fn apply(&mut self, assembler: &mut Assembler, frame: &Frame, sink: &mut dyn RenderSink) -> bool {
        let reduction = assembler.reduce(frame, &self.document, &self.display_id, sink);
        if reduction.applied {
            self.frames_applied += 1;
        } else {
            self.frames_skipped += 1;
        }
        self.document = reduction.document;
        self.display_id = reduction.display_id;
        self.finished |= reduction.finished;
        self.finished
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self::new()
    }
}
