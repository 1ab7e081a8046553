//! Paths into the assembled answer document.
//!
//! The backend addresses every patch with a `key` array such as
//! `["message", "content", "middle_answer", "progress", 0, "answer"]`.
//! Strings are object keys, non-negative integers are array indices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array index
    Index(usize),
    /// Object key
    Key(String),
}

impl PathSegment {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Key(_) => None,
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Index(_) => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A root-relative path into a [`Document`](crate::Document).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Append a segment, builder style.
    pub fn child(mut self, segment: impl Into<PathSegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Render the dotted/indexed form used by the whitelist,
    /// e.g. `message.content.progress[3].answer`.
    pub fn to_json_path(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Index(idx) => {
                    out.push('[');
                    out.push_str(&idx.to_string());
                    out.push(']');
                }
                PathSegment::Key(key) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(key);
                }
            }
        }
        out
    }

    /// Parse the dotted/indexed form back into a path.
    ///
    /// Returns `None` for unbalanced brackets, non-numeric indices, or empty keys.
    pub fn parse(json_path: &str) -> Option<Self> {
        let mut segments = Vec::new();
        if json_path.is_empty() {
            return Some(Self(segments));
        }

        for (n, part) in json_path.split('.').enumerate() {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if key.is_empty() {
                // Only a leading index (`[0].foo`) may omit its key.
                if n > 0 || rest.is_empty() {
                    return None;
                }
            } else {
                segments.push(PathSegment::Key(key.to_string()));
            }
            while !rest.is_empty() {
                let close = rest.find(']')?;
                if !rest.starts_with('[') {
                    return None;
                }
                let index: usize = rest[1..close].parse().ok()?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
            }
        }

        Some(Self(segments))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_path())
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl FromIterator<PathSegment> for Path {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build a [`Path`] from a mix of keys and indices.
///
/// ```
/// use chatkit_core::{path, PathSegment};
///
/// let p = path!["message", "content", "progress", 0usize, "answer"];
/// assert_eq!(p.to_json_path(), "message.content.progress[0].answer");
/// ```
#[macro_export]
macro_rules! path {
    () => { $crate::path::Path::root() };
    ($($seg:expr),+ $(,)?) => {
        $crate::path::Path::from(vec![$($crate::path::PathSegment::from($seg)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_path_rendering() {
        let p = path!["message", "content", "middle_answer", "progress", 0usize];
        assert_eq!(p.to_json_path(), "message.content.middle_answer.progress[0]");

        let p = path!["message", "content", "progress", 3usize, "answer", "answer"];
        assert_eq!(p.to_json_path(), "message.content.progress[3].answer.answer");
    }

    #[test]
    fn json_path_of_root_and_leading_index() {
        assert_eq!(Path::root().to_json_path(), "");
        assert_eq!(path![2usize, "x"].to_json_path(), "[2].x");
    }

    #[test]
    fn deserialize_mixed_key_array() {
        let p: Path = serde_json::from_str(r#"["message","content","progress",0,"answer"]"#).unwrap();
        assert_eq!(p.len(), 5);
        assert_eq!(p.segments()[3], PathSegment::Index(0));
        assert_eq!(p.last(), Some(&PathSegment::Key("answer".into())));
    }

    #[test]
    fn negative_index_is_rejected() {
        let parsed: std::result::Result<Path, _> = serde_json::from_str(r#"["progress",-1]"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn parse_roundtrips_rendered_form() {
        for s in [
            "message.id",
            "message.content.progress[12].answer",
            "a[0][1].b",
            "[0].x",
        ] {
            let p = Path::parse(s).unwrap();
            assert_eq!(p.to_json_path(), s);
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Path::parse("a..b").is_none());
        assert!(Path::parse("a[x]").is_none());
        assert!(Path::parse("a[1").is_none());
    }

    #[test]
    fn child_builder() {
        let p = Path::root().child("message").child("id");
        assert_eq!(p, path!["message", "id"]);
        assert_eq!(p.to_string(), "message.id");
    }
}
