use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use super::StoreError;

lazy_static! {
    static ref SEGMENT_RE: Regex = Regex::new(r"^[^/.#$\[\]]+$").unwrap();
}

/// Slash-separated address of a node in the session tree.
///
/// The empty path addresses the root. Segments are validated on construction so that
/// a `StorePath` can always be rendered back into a key without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let mut path = Self::root();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        if !is_valid_segment(segment) {
            return Err(StoreError::InvalidPath(format!("{}/{}", self, segment)));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Appends a segment known at compile time to be valid.
    pub(crate) fn join(&self, segment: &'static str) -> Self {
        debug_assert!(is_valid_segment(segment), "invalid literal segment {}", segment);
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &StorePath) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// A change at one path is visible to a subscriber of the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Segments of `other` below `self`, if `self` contains it.
    pub fn relative<'a>(&self, other: &'a StorePath) -> Option<&'a [String]> {
        if self.contains(other) {
            Some(&other.segments[self.segments.len()..])
        } else {
            None
        }
    }

    /// Proper ancestors from the top down, excluding the root.
    pub fn ancestors(&self) -> Vec<StorePath> {
        (1..self.segments.len())
            .map(|len| StorePath {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

pub fn is_valid_segment(segment: &str) -> bool {
    SEGMENT_RE.is_match(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_empty_segments() {
        let path = StorePath::parse("/sessions//s1/state/").unwrap();
        assert_eq!(path.to_string(), "sessions/s1/state");
        assert_eq!(path.segments().len(), 3);
        assert!(StorePath::parse("").unwrap().is_root());
    }

    #[test]
    fn rejects_reserved_characters() {
        for bad in ["a.b", "a#b", "a$b", "a[0]", "a]"] {
            assert!(StorePath::root().child(bad).is_err(), "{} accepted", bad);
        }
        assert!(StorePath::root().child("").is_err());
        assert!(StorePath::root().child("user-42_x").is_ok());
    }

    #[test]
    fn containment_and_overlap() {
        let state = StorePath::parse("s/state").unwrap();
        let score = StorePath::parse("s/state/score/p1").unwrap();
        let answers = StorePath::parse("s/answers").unwrap();

        assert!(state.contains(&score));
        assert!(!score.contains(&state));
        assert!(score.overlaps(&state));
        assert!(!answers.overlaps(&state));
        assert!(StorePath::root().contains(&answers));
        assert_eq!(
            state.relative(&score).unwrap(),
            &["score".to_string(), "p1".to_string()]
        );
    }

    #[test]
    fn ancestors_exclude_self_and_root() {
        let path = StorePath::parse("a/b/c").unwrap();
        let ancestors: Vec<String> = path.ancestors().iter().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["a", "a/b"]);
        assert!(StorePath::parse("a").unwrap().ancestors().is_empty());
    }
}
