//! Path-scoped immutable merge.
//!
//! A merge never touches the previous document. It rebuilds the chain of
//! containers from the root down to the patched leaf and reuses every other
//! subtree as-is, so the cost of a patch is proportional to the depth of its
//! path and the width of the containers on it, not to the size of the answer.

use chatkit_core::document::{Document, Node, Object};
use chatkit_core::event::Action;
use chatkit_core::path::{Path, PathSegment};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Largest number of `null` slots a single patch may pad an array with.
pub const MAX_INDEX_GAP: usize = 1024;

/// Apply one patch to `doc` and return the new document.
///
/// - `upsert` replaces the value at `path`.
/// - `append` at an index sets that array slot; `append` at a key
///   concatenates when both the current leaf and `content` are strings and
///   replaces the leaf otherwise.
/// - `end`, and any patch with an empty path, return `doc` itself.
///
/// Missing containers on the way are created: an array when the next segment
/// is an index, an object when it is a key. A node of the wrong kind on the
/// way is replaced the same way.
///
/// A patch whose index lies more than [`MAX_INDEX_GAP`] past the end of its
/// array is refused and `doc` is returned unchanged; see [`try_merge`].
pub fn merge(doc: &Document, path: &Path, action: Action, content: &Value) -> Document {
    try_merge(doc, path, action, content).unwrap_or_else(|| doc.clone())
}

/// Like [`merge`], but `None` when the patch is refused.
pub fn try_merge(doc: &Document, path: &Path, action: Action, content: &Value) -> Option<Document> {
    if path.is_empty() {
        return Some(doc.clone());
    }

    let root = match action {
        Action::End => return Some(doc.clone()),
        Action::Upsert => update(doc.root(), path.segments(), &|_| Node::from(content.clone())),
        Action::Append => match path.last() {
            Some(PathSegment::Index(_)) => {
                update(doc.root(), path.segments(), &|_| Node::from(content.clone()))
            }
            _ => update(doc.root(), path.segments(), &|current| concat(current, content)),
        },
    };

    match root {
        Some(root) => Some(Document::from_root(root)),
        None => {
            warn!(path = %path, action = %action, "Refusing patch: array index out of range");
            None
        }
    }
}

fn concat(current: Option<&Node>, content: &Value) -> Node {
    match (current, content) {
        (Some(Node::String(prefix)), Value::String(suffix)) => {
            let mut joined = String::with_capacity(prefix.len() + suffix.len());
            joined.push_str(prefix);
            joined.push_str(suffix);
            Node::string(joined)
        }
        _ => Node::from(content.clone()),
    }
}

/// Rebuild `node` with the value at `segments` produced by `leaf`.
/// `segments` is never empty. `None` when an index is out of range.
fn update(node: &Node, segments: &[PathSegment], leaf: &dyn Fn(Option<&Node>) -> Node) -> Option<Node> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(leaf(Some(node)));
    };

    match head {
        PathSegment::Key(key) => {
            // Cloning the map clones child handles, not child trees.
            let mut map: Object = match node {
                Node::Object(map) => (**map).clone(),
                _ => Object::new(),
            };
            let child = descend(map.get(key), rest, leaf)?;
            map.insert(key.clone(), child);
            Some(Node::Object(Arc::new(map)))
        }
        PathSegment::Index(index) => {
            let mut items: Vec<Node> = match node {
                Node::Array(items) => (**items).clone(),
                _ => Vec::new(),
            };
            if *index > items.len().saturating_add(MAX_INDEX_GAP) {
                return None;
            }
            let len = index.checked_add(1)?;
            let child = descend(items.get(*index), rest, leaf)?;
            if len > items.len() {
                items.resize(len, Node::Null);
            }
            items[*index] = child;
            Some(Node::Array(Arc::new(items)))
        }
    }
}

fn descend(child: Option<&Node>, rest: &[PathSegment], leaf: &dyn Fn(Option<&Node>) -> Node) -> Option<Node> {
    if rest.is_empty() {
        Some(leaf(child))
    } else {
        update(child.unwrap_or(&Node::Null), rest, leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatkit_core::path;
    use serde_json::json;

    fn progress(i: usize) -> Path {
        path!["message", "content", "progress", i]
    }

    #[test]
    fn upsert_into_empty_document() {
        let doc = merge(&Document::new(), &path!["message", "id"], Action::Upsert, &json!("m-42"));
        assert_eq!(doc.to_value(), json!({"message": {"id": "m-42"}}));
    }

    #[test]
    fn append_builds_and_extends_llm_answer() {
        let d1 = merge(&Document::new(), &path!["message", "id"], Action::Upsert, &json!("m-42"));
        let d2 = merge(&d1, &progress(0), Action::Append, &json!({"stage": "llm", "answer": "Hel"}));

        let steps = d2.get(&path!["message", "content", "progress"]).unwrap();
        assert_eq!(steps.as_array().map(<[Node]>::len), Some(1));
        assert_eq!(d2.get(&progress(0).child("answer")).and_then(Node::as_str), Some("Hel"));

        let d3 = merge(&d2, &progress(0).child("answer"), Action::Append, &json!("lo"));
        assert_eq!(d3.get(&progress(0).child("answer")).and_then(Node::as_str), Some("Hello"));

        // Untouched subtrees are shared, not copied.
        let id_before = d1.get(&path!["message", "id"]).unwrap();
        let id_after = d3.get(&path!["message", "id"]).unwrap();
        assert!(id_before.ptr_eq(id_after));

        // Earlier versions are unchanged.
        assert_eq!(d2.get(&progress(0).child("answer")).and_then(Node::as_str), Some("Hel"));
        assert!(d1.get(&path!["message", "content"]).is_none());
    }

    #[test]
    fn end_and_empty_path_return_same_root() {
        let doc = Document::from(json!({"message": {"id": "x"}}));
        assert!(merge(&doc, &Path::root(), Action::End, &Value::Null).ptr_eq(&doc));
        assert!(merge(&doc, &Path::root(), Action::Upsert, &json!({"a": 1})).ptr_eq(&doc));
        assert!(merge(&doc, &path!["message", "id"], Action::End, &json!("y")).ptr_eq(&doc));
    }

    #[test]
    fn siblings_keep_their_references() {
        let doc = Document::from(json!({
            "message": {"id": "m", "content": {"progress": [{"stage": "llm", "answer": "a"}, {"stage": "skill"}]}},
            "error": null
        }));
        let next = merge(&doc, &progress(1).child("answer"), Action::Upsert, &json!({"ok": true}));

        let slot0_before = doc.get(&progress(0)).unwrap();
        let slot0_after = next.get(&progress(0)).unwrap();
        assert!(slot0_before.ptr_eq(slot0_after));

        let message_before = doc.get(&path!["message"]).unwrap();
        let message_after = next.get(&path!["message"]).unwrap();
        assert!(!message_before.ptr_eq(message_after));
    }

    #[test]
    fn append_at_index_pads_with_null() {
        let doc = merge(&Document::new(), &path!["steps", 2usize], Action::Append, &json!("c"));
        assert_eq!(doc.to_value(), json!({"steps": [null, null, "c"]}));
    }

    #[test]
    fn append_at_index_replaces_slot() {
        let doc = Document::from(json!({"steps": [{"stage": "llm", "answer": "old"}]}));
        let next = merge(&doc, &path!["steps", 0usize], Action::Append, &json!({"stage": "llm", "answer": "new"}));
        assert_eq!(next.to_value(), json!({"steps": [{"stage": "llm", "answer": "new"}]}));
    }

    #[test]
    fn append_non_string_replaces_leaf() {
        let doc = Document::from(json!({"answer": "text"}));
        let next = merge(&doc, &path!["answer"], Action::Append, &json!({"choices": []}));
        assert_eq!(next.to_value(), json!({"answer": {"choices": []}}));

        let doc = Document::from(json!({"answer": {"partial": true}}));
        let next = merge(&doc, &path!["answer"], Action::Append, &json!("text"));
        assert_eq!(next.to_value(), json!({"answer": "text"}));
    }

    #[test]
    fn append_string_onto_missing_leaf() {
        let next = merge(&Document::new(), &path!["a", "b"], Action::Append, &json!("x"));
        assert_eq!(next.to_value(), json!({"a": {"b": "x"}}));
    }

    #[test]
    fn container_kind_follows_next_segment() {
        let next = merge(&Document::new(), &path!["list", 1usize, "name"], Action::Upsert, &json!("n"));
        assert_eq!(next.to_value(), json!({"list": [null, {"name": "n"}]}));
    }

    #[test]
    fn wrong_kind_on_chain_is_replaced() {
        let doc = Document::from(json!({"message": "oops", "keep": [1, 2]}));
        let next = merge(&doc, &path!["message", "id"], Action::Upsert, &json!("m"));
        assert_eq!(next.to_value(), json!({"message": {"id": "m"}, "keep": [1, 2]}));

        let next = merge(&doc, &path!["keep", "first"], Action::Upsert, &json!(0));
        assert_eq!(next.to_value(), json!({"message": "oops", "keep": {"first": 0}}));
    }

    #[test]
    fn index_far_past_the_end_is_refused() {
        let doc = Document::from(json!({"message": {"content": {"progress": [{"stage": "llm"}]}}}));
        for index in [usize::MAX, 4_000_000_000_000, 1 + MAX_INDEX_GAP + 1] {
            let path = progress(index);
            assert!(try_merge(&doc, &path, Action::Append, &json!({"stage": "llm"})).is_none());
            assert!(merge(&doc, &path, Action::Append, &json!({"stage": "llm"})).ptr_eq(&doc));
            assert!(merge(&doc, &path.child("answer"), Action::Upsert, &json!("x")).ptr_eq(&doc));
        }
    }

    #[test]
    fn index_within_gap_is_padded() {
        let doc = Document::from(json!({"steps": ["a"]}));
        let next = try_merge(&doc, &path!["steps", 1 + MAX_INDEX_GAP], Action::Append, &json!("z")).unwrap();
        let steps = next.get(&path!["steps"]).and_then(Node::as_array).unwrap();
        assert_eq!(steps.len(), MAX_INDEX_GAP + 2);
        assert_eq!(steps[MAX_INDEX_GAP + 1].as_str(), Some("z"));
    }

    #[test]
    fn upsert_null_keeps_key() {
        let doc = Document::from(json!({"error": {"code": 1}}));
        let next = merge(&doc, &path!["error"], Action::Upsert, &Value::Null);
        assert_eq!(next.to_value(), json!({"error": null}));
    }
}
