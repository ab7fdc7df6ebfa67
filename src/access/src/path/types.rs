/// Resource path type definitions and validation
///
/// A resource path names a navigable unit (route or section) as a
/// `/`-separated hierarchy such as `/families/loans/payments`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result type for path operations
pub type PathResult<T> = Result<T, PathError>;

/// Errors that can occur while parsing a resource path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Empty path string provided
    EmptyPath,
    /// Path does not start with the separator
    MissingLeadingSeparator(String),
    /// Path contains an empty segment (`//`)
    EmptySegment(String),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "Resource path cannot be empty"),
            Self::MissingLeadingSeparator(p) => {
                write!(f, "Resource path must start with '/': '{}'", p)
            }
            Self::EmptySegment(p) => write!(f, "Resource path has an empty segment: '{}'", p),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for crate::error::AccessError {
    fn from(err: PathError) -> Self {
        crate::error::AccessError::InvalidPath(err.to_string())
    }
}

/// A parsed, normalized hierarchical resource path
///
/// - `/` is the root and has no segments
/// - a single trailing separator is ignored (`/reports/` == `/reports`)
/// - segments are compared case-sensitively
///
/// A path `P` *covers* `P` itself and every `P/...`, never `Pxyz`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath {
    /// Normalized path string
    raw: String,
    /// Parsed segments
    segments: Vec<String>,
}

impl ResourcePath {
    /// Segment separator
    pub const SEPARATOR: char = '/';

    /// Parses a resource path
    ///
    /// # Arguments
    ///
    /// * `s` - The path string (e.g., "/families/loans")
    ///
    /// # Returns
    ///
    /// Returns the normalized path or a `PathError`
    pub fn new(s: &str) -> PathResult<Self> {
        if s.is_empty() {
            return Err(PathError::EmptyPath);
        }

        let Some(rest) = s.strip_prefix(Self::SEPARATOR) else {
            return Err(PathError::MissingLeadingSeparator(s.to_string()));
        };

        let rest = rest.strip_suffix(Self::SEPARATOR).unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in rest.split(Self::SEPARATOR) {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            segments.push(segment.to_string());
        }

        Ok(Self {
            raw: format!("{}{}", Self::SEPARATOR, segments.join("/")),
            segments,
        })
    }

    /// The root path `/`, which covers every path
    pub fn root() -> Self {
        Self {
            raw: Self::SEPARATOR.to_string(),
            segments: Vec::new(),
        }
    }

    /// Returns the segments of this path
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the normalized path string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of segments (the root has depth 0)
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this path is the root
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Checks whether this path equals `other` or is one of its ancestors
    pub fn covers(&self, other: &ResourcePath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// Returns the parent path, or `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        let parent_segments = self.segments[..self.segments.len() - 1].to_vec();
        if parent_segments.is_empty() {
            return Some(Self::root());
        }

        Some(Self {
            raw: format!("{}{}", Self::SEPARATOR, parent_segments.join("/")),
            segments: parent_segments,
        })
    }
}

impl FromStr for ResourcePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.raw
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
