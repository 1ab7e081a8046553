//! The in-progress assistant answer as a persistent tree.
//!
//! A [`Document`] has no fixed schema. It is a tree of [`Node`]s whose
//! strings and containers live behind `Arc`, so cloning a node shares it
//! instead of copying it. The merge engine relies on this to rebuild only
//! the chain of ancestors above a patched leaf; every other subtree of the
//! new root is the very same allocation as in the previous root, which
//! [`Node::ptr_eq`] can observe.

use crate::path::{Path, PathSegment};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Object node storage. Sorted, so serialization is deterministic.
pub type Object = BTreeMap<String, Node>;

/// One node of a [`Document`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<Vec<Node>>),
    Object(Arc<Object>),
}

impl Node {
    pub fn empty_object() -> Self {
        Self::Object(Arc::new(Object::new()))
    }

    pub fn empty_array() -> Self {
        Self::Array(Arc::new(Vec::new()))
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Child addressed by one path segment, if this node has it.
    pub fn get(&self, segment: &PathSegment) -> Option<&Node> {
        match (self, segment) {
            (Self::Object(map), PathSegment::Key(key)) => map.get(key),
            (Self::Array(items), PathSegment::Index(idx)) => items.get(*idx),
            _ => None,
        }
    }

    pub fn get_key(&self, key: &str) -> Option<&Node> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn get_index(&self, index: usize) -> Option<&Node> {
        match self {
            Self::Array(items) => items.get(index),
            _ => None,
        }
    }

    /// Walk a sequence of segments from this node.
    pub fn pointer(&self, segments: &[PathSegment]) -> Option<&Node> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.get(segment))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Self::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(map) => Some(&**map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reference identity for strings and containers, value equality for
    /// the inline scalars.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => Arc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Deep conversion to a `serde_json::Value`.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.to_string()),
            Self::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }

    /// Human-readable kind name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s.into()),
            Value::Array(items) => {
                Self::Array(Arc::new(items.into_iter().map(Node::from).collect()))
            }
            Value::Object(map) => Self::Object(Arc::new(
                map.into_iter().map(|(k, v)| (k, Node::from(v))).collect(),
            )),
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => serializer.collect_seq(items.iter()),
            Self::Object(map) => serializer.collect_map(map.iter()),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Node::from)
    }
}

/// One assistant answer being assembled for a single turn.
///
/// Cheap to clone: a clone shares the whole tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    root: Node,
}

impl Document {
    /// An empty answer: `{}`.
    pub fn new() -> Self {
        Self {
            root: Node::empty_object(),
        }
    }

    pub fn from_root(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    pub fn get(&self, path: &Path) -> Option<&Node> {
        self.root.pointer(path.segments())
    }

    /// The canonical id assigned by the backend (`message.id`), once present.
    pub fn message_id(&self) -> Option<&str> {
        self.root.get_key("message")?.get_key("id")?.as_str()
    }

    pub fn is_empty(&self) -> bool {
        match &self.root {
            Node::Null => true,
            Node::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Whether both documents share the same root allocation.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        self.root.ptr_eq(&other.root)
    }

    pub fn to_value(&self) -> Value {
        self.root.to_value()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self::from_root(Node::from(value))
    }
}
