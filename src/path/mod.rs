//! Path value types for addressing fields in both the definition tree and the
//! underlying data model.
//!
//! A path is an ordered list of segments. In string form segments are joined
//! with `/`; a `*` segment (legacy spelling `${index}`) is a wildcard standing
//! in for any list index.

use itertools::Itertools;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Canonical wildcard token in string form.
pub const WILDCARD: &str = "*";

/// Older configurations spell the wildcard as a template placeholder.
const LEGACY_WILDCARD: &str = "${index}";

/// A single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named property of an object.
    Named(String),
    /// A concrete list index.
    Index(usize),
    /// Any list index.
    Wildcard,
}

impl Segment {
    fn parse(raw: &str) -> Segment {
        if raw == WILDCARD || raw == LEGACY_WILDCARD {
            Segment::Wildcard
        } else if let Ok(index) = raw.parse::<usize>() {
            Segment::Index(index)
        } else {
            Segment::Named(raw.to_string())
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Segment::Wildcard)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Named(name) => write!(f, "{}", name),
            Segment::Index(index) => write!(f, "{}", index),
            Segment::Wildcard => write!(f, "{}", WILDCARD),
        }
    }
}

/// An immutable ordered sequence of segments identifying a field location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

/// Concrete segments captured when a wildcard on one side matched a concrete
/// segment on the other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchCaptures {
    /// Concrete segments of `self` captured by the other path's wildcards.
    pub from_self: Vec<Segment>,
    /// Concrete segments of the other path captured by `self`'s wildcards.
    pub from_other: Vec<Segment>,
}

impl Path {
    /// An empty path, addressing the schema root.
    pub fn root() -> Path {
        Path::default()
    }

    /// Parses the `/`-joined string form. Empty interior segments are kept as
    /// empty names; the empty string parses to the root path.
    pub fn parse(raw: &str) -> Path {
        if raw.is_empty() {
            return Path::root();
        }
        Path {
            segments: raw.split('/').map(Segment::parse).collect(),
        }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Path {
        Path { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(Segment::is_wildcard)
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: Segment) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Path { segments }
    }

    /// Exact structural match: equal length, and per position the segments are
    /// equal or either side is a wildcard. Wildcard-vs-concrete positions
    /// capture the concrete segment, in order, per side.
    pub fn matches(&self, other: &Path) -> Option<MatchCaptures> {
        if self.len() != other.len() {
            return None;
        }
        let mut captures = MatchCaptures::default();
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            match (a, b) {
                (Segment::Wildcard, Segment::Wildcard) => {}
                (Segment::Wildcard, concrete) => captures.from_other.push(concrete.clone()),
                (concrete, Segment::Wildcard) => captures.from_self.push(concrete.clone()),
                (a, b) if a == b => {}
                _ => return None,
            }
        }
        Some(captures)
    }

    /// The sub-or-super-path relation used by the dependency matcher: the two
    /// paths are compared segment-wise up to the shorter length, and any
    /// ancestor-or-descendant prefix alignment counts as related. Wildcards
    /// match any segment. Note the deliberate truncation: `a/b` is related to
    /// `a/b/c/d` and vice versa.
    pub fn is_related(&self, other: &Path) -> bool {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| match (a, b) {
                (Segment::Wildcard, _) | (_, Segment::Wildcard) => true,
                (a, b) => a == b,
            })
    }

    /// Captures the concrete segments of `other` bound to `self`'s wildcards
    /// over the shared prefix. Used to later substitute a concrete changed
    /// path into wildcard-bearing dependent paths.
    pub fn captures_from(&self, other: &Path) -> Vec<Segment> {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .filter_map(|(a, b)| match (a, b) {
                (Segment::Wildcard, concrete) if !concrete.is_wildcard() => Some(concrete.clone()),
                _ => None,
            })
            .collect()
    }

    /// Positional wildcard substitution: each wildcard segment is replaced by
    /// `base`'s segment at the same position, when `base` has one. All other
    /// segments pass through unchanged.
    pub fn resolve_against(&self, base: &Path) -> Path {
        let segments = self
            .segments
            .iter()
            .enumerate()
            .map(|(position, segment)| match segment {
                Segment::Wildcard => base
                    .segments
                    .get(position)
                    .cloned()
                    .unwrap_or(Segment::Wildcard),
                other => other.clone(),
            })
            .collect();
        Path { segments }
    }

    /// Replaces wildcard segments left-to-right from a capture list. Surplus
    /// wildcards (more wildcards than captures) are left in place.
    pub fn substitute(&self, captures: &[Segment]) -> Path {
        let mut next_capture = captures.iter();
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Wildcard => next_capture.next().cloned().unwrap_or(Segment::Wildcard),
                other => other.clone(),
            })
            .collect();
        Path { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.iter().join("/"))
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Path {
        Path::parse(raw)
    }
}

impl From<String> for Path {
    fn from(raw: String) -> Path {
        Path::parse(&raw)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Path, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.contains("//") || raw.starts_with('/') || raw.ends_with('/') {
            return Err(D::Error::custom(format!("path '{}' has an empty segment", raw)));
        }
        Ok(Path::parse(&raw))
    }
}
