//! Slash-separated node paths

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const INFO_SEGMENT: &str = ".info";
const CONNECTED_SEGMENT: &str = "connected";

/// Location of a node in the store tree, e.g. `calendar/uid/20240101/memo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The tree root.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Reserved path publishing the connection's online flag.
    #[must_use]
    pub fn connected() -> Self {
        Self {
            segments: vec![INFO_SEGMENT.to_string(), CONNECTED_SEGMENT.to_string()],
        }
    }

    /// Parse a path. Leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        if trimmed == ".info/connected" {
            return Ok(Self::connected());
        }

        let mut path = Self::root();
        for segment in trimmed.split('/') {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    /// Append one validated segment.
    pub fn child(&self, segment: impl AsRef<str>) -> Result<Self> {
        let segment = segment.as_ref();
        validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Append an array index segment.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(index.to_string());
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether this is the reserved connectivity path.
    #[must_use]
    pub fn is_connected_signal(&self) -> bool {
        self.segments.first().is_some_and(|first| first == INFO_SEGMENT)
    }

    /// True when `other` equals this path or lies below it.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// True when one path contains the other.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// The part of this path below `prefix`, or `None` when `prefix` does not
    /// contain it.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        self.segments
            .strip_prefix(prefix.segments.as_slice())
            .map(|rest| Self {
                segments: rest.to_vec(),
            })
    }

    /// The longer of two overlapping paths.
    #[must_use]
    pub fn deeper<'a>(&'a self, other: &'a Self) -> &'a Self {
        if self.segments.len() >= other.segments.len() {
            self
        } else {
            other
        }
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidInput("path segment must not be empty".into()));
    }
    if let Some(bad) = segment
        .chars()
        .find(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
    {
        return Err(Error::InvalidInput(format!(
            "path segment '{segment}' contains forbidden character {bad:?}"
        )));
    }
    Ok(())
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.segments.join("/"))
        }
    }
}

impl FromStr for StorePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let path = StorePath::parse("/calendar/u1/20240101/").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.to_string(), "calendar/u1/20240101");
        assert_eq!(StorePath::parse("").unwrap(), StorePath::root());
        assert_eq!(StorePath::root().to_string(), "/");
    }

    #[test]
    fn parse_rejects_forbidden_segments() {
        assert!(StorePath::parse("calendar//x").is_err());
        assert!(StorePath::parse("calendar/a.b").is_err());
        assert!(StorePath::parse("calendar/$x").is_err());
        assert!(StorePath::parse(".info/other").is_err());
    }

    #[test]
    fn connected_path_is_reserved() {
        let path = StorePath::parse(".info/connected").unwrap();
        assert!(path.is_connected_signal());
        assert!(!StorePath::parse("calendar").unwrap().is_connected_signal());
    }

    #[test]
    fn containment_and_overlap() {
        let day = StorePath::parse("calendar/u1/20240101").unwrap();
        let memo = day.child("memo").unwrap();
        let other_day = StorePath::parse("calendar/u1/20240102").unwrap();

        assert!(day.contains(&memo));
        assert!(!memo.contains(&day));
        assert!(memo.overlaps(&day));
        assert!(!day.overlaps(&other_day));
        assert_eq!(day.deeper(&memo), &memo);
        assert!(StorePath::root().contains(&day));
        assert_eq!(memo.strip_prefix(&day).unwrap().to_string(), "memo");
        assert!(day.strip_prefix(&day).unwrap().is_root());
        assert_eq!(day.strip_prefix(&other_day), None);
    }

    #[test]
    fn index_appends_numeric_segment() {
        let notes = StorePath::parse("calendar/u1/20240101/note").unwrap();
        assert_eq!(notes.index(3).to_string(), "calendar/u1/20240101/note/3");
    }
}
