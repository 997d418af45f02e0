//! Dot separated addresses into the value store
use crate::error::{Error, Result};

/// Ordered, non-empty list of segments
///
/// Normalization drops empty segments, so `a..b.` and `a.b` address the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub const SEPARATOR: char = '.';

    /// Build a path from segments, splitting segments that contain a separator
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments: Vec<String> = segments
            .into_iter()
            .flat_map(|segment| {
                segment
                    .as_ref()
                    .split(Self::SEPARATOR)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        if segments.is_empty() {
            return Err(Error::InvalidPath(String::new()));
        }

        Ok(Self { segments })
    }

    pub fn parse(path: &str) -> Result<Self> {
        Self::new([path]).map_err(|_| Error::InvalidPath(path.to_string()))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Paths are never empty; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// A new path with `segment` appended
    pub fn join(&self, segment: impl AsRef<str>) -> Result<Self> {
        Self::new(self.segments.iter().map(String::as_str).chain([segment.as_ref()]))
    }

    /// `true` if `other` is this path or lies below it
    pub fn contains(&self, other: &Path) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl std::str::FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}
