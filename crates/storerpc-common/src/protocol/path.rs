//! Procedure paths and mode selectors.
//!
//! A procedure is addressed by an ordered list of segments (`["user", "get"]`)
//! written in dotted form (`"user.get"`) on the wire and in hook callbacks.
//! Client-side endpoint paths additionally end in a mode selector
//! (`$now` or `$later`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ResolutionError;

/// How a resolved remote operation is invoked by the store client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Invoke once, immediately.
    #[serde(rename = "$now")]
    Now,
    /// Hand back a trigger; invoke on demand, any number of times.
    #[serde(rename = "$later")]
    Later,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Now => "$now",
            Mode::Later => "$later",
        }
    }
}

impl FromStr for Mode {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "$now" => Ok(Mode::Now),
            "$later" => Ok(Mode::Later),
            other => Err(ResolutionError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, ordered list of path segments.
///
/// # Example
///
/// ```
/// use storerpc_common::protocol::ProcedurePath;
///
/// let path = ProcedurePath::parse("user.get");
/// assert_eq!(path.segments(), ["user", "get"]);
/// assert_eq!(path.to_string(), "user.get");
/// assert_eq!(ProcedurePath::from_url_suffix("/user/get"), path);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProcedurePath {
    segments: Vec<String>,
}

impl ProcedurePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parses a dotted path, ignoring empty segments.
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Parses the part of a URL path that follows the handler prefix.
    ///
    /// Both `/` and `.` separate segments, so `user/get` and `user.get`
    /// address the same procedure.
    pub fn from_url_suffix(suffix: &str) -> Self {
        Self::parse(&suffix.replace('/', "."))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns a new path with every segment of `other` appended.
    pub fn concat(&self, other: &ProcedurePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Splits off the last segment.
    pub fn split_last(&self) -> Option<(&str, ProcedurePath)> {
        let (last, rest) = self.segments.split_last()?;
        Some((last.as_str(), ProcedurePath::new(rest.to_vec())))
    }
}

impl fmt::Display for ProcedurePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<Vec<String>> for ProcedurePath {
    fn from(segments: Vec<String>) -> Self {
        Self::new(segments)
    }
}

impl From<&str> for ProcedurePath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("$now".parse::<Mode>(), Ok(Mode::Now));
        assert_eq!("$later".parse::<Mode>(), Ok(Mode::Later));
        assert_eq!(
            "now".parse::<Mode>(),
            Err(ResolutionError::UnknownMode("now".into()))
        );
    }

    #[test]
    fn test_mode_serde_uses_selector_names() {
        assert_eq!(serde_json::to_string(&Mode::Later).unwrap(), "\"$later\"");
    }

    #[test]
    fn test_parse_skips_empty_segments() {
        let path = ProcedurePath::parse(".user..get.");
        assert_eq!(path.segments(), ["user", "get"]);
    }

    #[test]
    fn test_from_url_suffix() {
        assert_eq!(ProcedurePath::from_url_suffix("user/get").to_string(), "user.get");
        assert_eq!(ProcedurePath::from_url_suffix("/admin/user.list").len(), 3);
        assert!(ProcedurePath::from_url_suffix("").is_empty());
    }

    #[test]
    fn test_join_does_not_mutate() {
        let base = ProcedurePath::parse("user");
        let extended = base.join("get");
        assert_eq!(base.len(), 1);
        assert_eq!(extended.to_string(), "user.get");
    }

    #[test]
    fn test_split_last() {
        let path = ProcedurePath::parse("a.b.c");
        let (last, rest) = path.split_last().unwrap();
        assert_eq!(last, "c");
        assert_eq!(rest.to_string(), "a.b");
        assert!(ProcedurePath::default().split_last().is_none());
    }
}
