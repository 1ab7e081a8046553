//! Whitelist dispatcher.
//!
//! Most patches only grow the document. The few that should change what the
//! user sees are listed here as `(action, path pattern)` rules, each with a
//! handler that reads the merged document and drives the [`RenderSink`].
//! A patch that matches no rule is merged and otherwise ignored.

use chatkit_core::document::{Document, Node};
use chatkit_core::event::{Action, PatchEvent};
use chatkit_core::path::{Path, PathSegment};
use chatkit_core::render::{RenderSink, ToolBlock};
use chatkit_tools::{ExtractorRegistry, SkillFilter, SkillStep};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::strategy::MIDDLE_ANSWER_PROGRESS;

/// Progress roots the standard rules are registered under by default.
pub const DEFAULT_PROGRESS_ROOTS: &[&str] = &[MIDDLE_ANSWER_PROGRESS, "message.content.progress"];

// ── Patterns ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Key(String),
    Index(usize),
    AnyIndex,
}

/// A path pattern in dotted form, where `[*]` matches any array index:
/// `message.content.progress[*].answer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    /// Parse the dotted form. Returns `None` for empty keys, unbalanced
    /// brackets, or an index that is neither a number nor `*`.
    pub fn parse(pattern: &str) -> Option<Self> {
        let mut segments = Vec::new();
        if pattern.is_empty() {
            return Some(Self { segments });
        }

        for part in pattern.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if key.is_empty() {
                return None;
            }
            segments.push(PatternSegment::Key(key.to_string()));

            while !rest.is_empty() {
                let inner = rest.strip_prefix('[')?;
                let close = inner.find(']')?;
                segments.push(match &inner[..close] {
                    "*" => PatternSegment::AnyIndex,
                    n => PatternSegment::Index(n.parse().ok()?),
                });
                rest = &inner[close + 1..];
            }
        }

        Some(Self { segments })
    }

    /// Extend the pattern with a dotted suffix (`[*].answer`, `.answer`).
    pub fn join(&self, suffix: &str) -> Option<Self> {
        let joined = format!("{self}{suffix}");
        Self::parse(&joined)
    }

    pub fn matches(&self, path: &Path) -> bool {
        let segments = path.segments();
        segments.len() == self.segments.len()
            && self.segments.iter().zip(segments).all(|(p, s)| match (p, s) {
                (PatternSegment::Key(k), PathSegment::Key(key)) => k == key,
                (PatternSegment::Index(i), PathSegment::Index(idx)) => i == idx,
                (PatternSegment::AnyIndex, PathSegment::Index(_)) => true,
                _ => false,
            })
    }

    /// Position of the first `[*]` in the pattern.
    fn first_wildcard(&self) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| *s == PatternSegment::AnyIndex)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PatternSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PatternSegment::Key(key) => write!(f, ".{key}")?,
                PatternSegment::Index(idx) => write!(f, "[{idx}]")?,
                PatternSegment::AnyIndex => f.write_str("[*]")?,
            }
        }
        Ok(())
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Everything a rule handler may read, plus the sink it writes to.
pub struct DispatchContext<'a> {
    /// The document after the patch was merged
    pub document: &'a Document,
    /// Content of the patch
    pub content: &'a Value,
    pub display_id: &'a str,
    /// Path of the patch
    pub path: &'a Path,
    /// Index matched by the first `[*]` of the rule, with the path up to it
    pub slot: Option<(usize, Path)>,
    pub extractors: &'a ExtractorRegistry,
    pub filter: &'a SkillFilter,
    pub sink: &'a mut dyn RenderSink,
}

impl<'a> DispatchContext<'a> {
    /// The progress step the patch landed in, read from the merged document.
    pub fn slot_node(&self) -> Option<(usize, &'a Node)> {
        let (index, path) = self.slot.as_ref()?;
        Some((*index, self.document.get(path)?))
    }
}

/// A whitelist rule's side effect.
pub trait Handler: Send + Sync {
    fn handle(&self, ctx: &mut DispatchContext<'_>);
}

impl<F> Handler for F
where
    F: Fn(&mut DispatchContext<'_>) + Send + Sync,
{
    fn handle(&self, ctx: &mut DispatchContext<'_>) {
        self(ctx)
    }
}

/// Extractor registry and skill filter, lent to the handlers.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub extractors: &'a ExtractorRegistry,
    pub filter: &'a SkillFilter,
}

struct Rule {
    action: Action,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

/// Ordered `(action, pattern) → handler` table. The first matching rule wins.
#[derive(Default)]
pub struct Whitelist {
    rules: Vec<Rule>,
}

impl Whitelist {
    /// An empty whitelist: every patch is inert.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard rules for each progress root. Roots that do not parse
    /// as a pattern are skipped.
    pub fn standard<S: AsRef<str>>(progress_roots: &[S]) -> Self {
        let mut whitelist = Self::new();
        whitelist.register(Action::Upsert, pattern("error"), noop);
        whitelist.register(Action::Upsert, pattern("message"), noop);

        for root in progress_roots {
            let root = root.as_ref();
            let Some(root_pattern) = PathPattern::parse(root) else {
                debug!(root, "Skipping invalid progress root");
                continue;
            };
            let rules: [(Action, &str, fn(&mut DispatchContext<'_>)); 4] = [
                (Action::Append, "[*]", on_progress_step),
                (Action::Append, "[*].answer", on_llm_answer),
                (Action::Append, "[*].answer.answer", on_skill_answer),
                (Action::Upsert, "[*].answer", on_skill_answer_replaced),
            ];
            for (action, suffix, handler) in rules {
                if let Some(p) = root_pattern.join(suffix) {
                    whitelist.register(action, p, handler);
                }
            }
        }
        whitelist
    }

    /// Add a rule after the existing ones.
    pub fn register(&mut self, action: Action, pattern: PathPattern, handler: impl Handler + 'static) {
        self.rules.push(Rule {
            action,
            pattern,
            handler: Arc::new(handler),
        });
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the handler of the first rule matching `event`.
    /// Returns whether a rule matched.
    pub fn dispatch(
        &self,
        event: &PatchEvent,
        document: &Document,
        display_id: &str,
        tools: Collaborators<'_>,
        sink: &mut dyn RenderSink,
    ) -> bool {
        let Some(rule) = self
            .rules
            .iter()
            .find(|r| r.action == event.action && r.pattern.matches(&event.path))
        else {
            trace!(action = %event.action, path = %event.path, "No whitelist rule");
            return false;
        };

        let slot = rule.pattern.first_wildcard().and_then(|pos| {
            let index = event.path.segments().get(pos)?.as_index()?;
            let prefix: Path = event.path.segments()[..=pos].iter().cloned().collect();
            Some((index, prefix))
        });

        trace!(action = %event.action, path = %event.path, rule = %rule.pattern, "Dispatching");
        let mut ctx = DispatchContext {
            document,
            content: &event.content,
            display_id,
            path: &event.path,
            slot,
            extractors: tools.extractors,
            filter: tools.filter,
            sink,
        };
        rule.handler.handle(&mut ctx);
        true
    }
}

fn pattern(s: &str) -> PathPattern {
    PathPattern {
        segments: vec![PatternSegment::Key(s.to_string())],
    }
}

fn noop(_ctx: &mut DispatchContext<'_>) {}

fn stage(step: &Node) -> Option<&str> {
    step.get_key("stage")?.as_str()
}

fn emit_text(ctx: &mut DispatchContext<'_>, slot: usize, step: &Node) {
    let text = step.get_key("answer").and_then(Node::as_str).unwrap_or("");
    ctx.sink.on_text_delta(ctx.display_id, slot, text);
}

/// Extract the step's block and hand it to the sink, unless the skill is
/// hidden or the answer is not renderable yet.
fn emit_tool_block(ctx: &mut DispatchContext<'_>, slot: usize, step: &Node) {
    let Some(skill) = SkillStep::from_value(&step.to_value()) else {
        return;
    };
    if skill.name().is_empty() {
        return;
    }
    if ctx.filter.is_hidden(&skill) {
        trace!(tool = skill.name(), slot, "Skill hidden");
        return;
    }
    if let Some(block) = ctx.extractors.extract(skill.name(), &skill) {
        let block = ToolBlock {
            slot,
            consume_time_ms: skill.consume_time_ms(),
            block,
        };
        ctx.sink.on_tool_block(ctx.display_id, skill.name(), block);
    }
}

/// `append <root>[*]`: a new step, or a step replaced wholesale.
fn on_progress_step(ctx: &mut DispatchContext<'_>) {
    let Some((slot, step)) = ctx.slot_node() else {
        return;
    };
    match stage(&step) {
        Some("llm") => emit_text(ctx, slot, &step),
        Some("skill") => emit_tool_block(ctx, slot, &step),
        other => trace!(slot, stage = ?other, "Progress step without a renderable stage"),
    }
}

/// `append <root>[*].answer`: more LLM text for the step.
fn on_llm_answer(ctx: &mut DispatchContext<'_>) {
    let Some((slot, step)) = ctx.slot_node() else {
        return;
    };
    if stage(&step) == Some("llm") {
        emit_text(ctx, slot, &step);
    }
}

/// `append <root>[*].answer.answer`: a skill streaming its own answer.
fn on_skill_answer(ctx: &mut DispatchContext<'_>) {
    let Some((slot, step)) = ctx.slot_node() else {
        return;
    };
    if stage(&step) == Some("skill") {
        emit_tool_block(ctx, slot, &step);
    }
}

/// `upsert <root>[*].answer`: a skill's answer replaced in one go.
fn on_skill_answer_replaced(ctx: &mut DispatchContext<'_>) {
    if ctx.content.is_null() {
        return;
    }
    on_skill_answer(ctx);
}
