//! Hierarchical facet paths
//!
//! A facet is a `/`-delimited absolute path such as `/genre/anime/shounen`.
//! The root facet `/` has no segments. A `/` or `\` inside a segment is
//! escaped with a backslash.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ShowdexError;
use crate::Result;

/// Separator between segments in the indexed (byte) form of a facet
pub const FACET_SEP_BYTE: u8 = 0u8;

/// Immutable hierarchical classification path
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Facet {
    segments: Vec<String>,
}

impl Facet {
    /// The root facet `/`
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Build a facet from already-split path segments
    pub fn from_path<I, S>(path: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments = Vec::new();
        for segment in path {
            let segment = segment.into();
            Self::check_segment(&segment)?;
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Parse the `/a/b` string form
    pub fn from_string(text: &str) -> Result<Self> {
        let rest = text.strip_prefix('/').ok_or_else(|| {
            ShowdexError::Facet(format!("facet '{}' must start with '/'", text))
        })?;

        if rest.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = rest.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some(escaped @ ('/' | '\\')) => current.push(escaped),
                    Some(other) => {
                        return Err(ShowdexError::Facet(format!(
                            "invalid escape '\\{}' in facet '{}'",
                            other, text
                        )))
                    }
                    None => {
                        return Err(ShowdexError::Facet(format!(
                            "dangling escape at end of facet '{}'",
                            text
                        )))
                    }
                },
                '/' => {
                    Self::check_segment(&current)?;
                    segments.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            }
        }
        Self::check_segment(&current)?;
        segments.push(current);

        Ok(Self { segments })
    }

    fn check_segment(segment: &str) -> Result<()> {
        if segment.is_empty() {
            return Err(ShowdexError::Facet("empty facet segment".to_string()));
        }
        if segment.as_bytes().contains(&FACET_SEP_BYTE) {
            return Err(ShowdexError::Facet(
                "facet segment contains a NUL byte".to_string(),
            ));
        }
        Ok(())
    }

    /// Path segments, root first
    pub fn to_path(&self) -> Vec<&str> {
        self.segments.iter().map(String::as_str).collect()
    }

    /// Canonical string form, exact inverse of [`Facet::from_string`]
    pub fn to_path_str(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            for ch in segment.chars() {
                if ch == '/' || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
        }
        out
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments below the root
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Parent facet, `None` for the root
    pub fn parent(&self) -> Option<Facet> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Facet {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// Child facet with one more segment
    pub fn child(&self, segment: impl Into<String>) -> Result<Facet> {
        let segment = segment.into();
        Self::check_segment(&segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Facet { segments })
    }

    /// True if `self` is a leading (or equal) subsequence of `other`
    pub fn is_prefix_of(&self, other: &Facet) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments[..] == other.segments[..self.segments.len()]
    }

    /// Byte encoding used for index terms
    pub fn encoded(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push(FACET_SEP_BYTE);
            }
            out.extend_from_slice(segment.as_bytes());
        }
        out
    }

    /// Inverse of [`Facet::encoded`]
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for part in bytes.split(|b| *b == FACET_SEP_BYTE) {
            let segment = std::str::from_utf8(part)
                .map_err(|e| ShowdexError::Facet(format!("invalid facet bytes: {}", e)))?;
            Self::check_segment(segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_str())
    }
}

impl FromStr for Facet {
    type Err = ShowdexError;

    fn from_str(s: &str) -> Result<Self> {
        Facet::from_string(s)
    }
}

impl Serialize for Facet {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_path_str())
    }
}

impl<'de> Deserialize<'de> for Facet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Facet::from_string(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root() {
        let root = Facet::root();
        assert!(root.is_root());
        assert_eq!(root.to_path_str(), "/");
        assert!(root.to_path().is_empty());
        assert_eq!(Facet::from_string("/").unwrap(), root);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_parse_and_print() {
        let facet = Facet::from_string("/genre/anime/shounen").unwrap();
        assert_eq!(facet.to_path(), vec!["genre", "anime", "shounen"]);
        assert_eq!(facet.to_path_str(), "/genre/anime/shounen");
        assert_eq!(facet.depth(), 3);
        assert_eq!(facet.parent().unwrap().to_path_str(), "/genre/anime");
    }

    #[test]
    fn test_escaping_round_trip() {
        let facet = Facet::from_path(["AC/DC", "back\\slash"]).unwrap();
        let text = facet.to_path_str();
        assert_eq!(text, "/AC\\/DC/back\\\\slash");
        assert_eq!(Facet::from_string(&text).unwrap(), facet);
    }

    #[test]
    fn test_malformed() {
        assert!(Facet::from_string("").is_err());
        assert!(Facet::from_string("a/b").is_err());
        assert!(Facet::from_string("/a//b").is_err());
        assert!(Facet::from_string("/a/").is_err());
        assert!(Facet::from_string("/a\\").is_err());
        assert!(Facet::from_string("/a\\x").is_err());
        assert!(Facet::from_path(["ok", ""]).is_err());
    }

    #[test]
    fn test_is_prefix_of() {
        let root = Facet::root();
        let a = Facet::from_string("/a").unwrap();
        let ab = Facet::from_string("/a/b").unwrap();
        let ac = Facet::from_string("/a/c").unwrap();

        assert!(root.is_prefix_of(&ab));
        assert!(a.is_prefix_of(&ab));
        assert!(ab.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(!ac.is_prefix_of(&ab));
        assert!(root.is_prefix_of(&root));
    }

    #[test]
    fn test_encoded() {
        let facet = Facet::from_string("/a/bc").unwrap();
        assert_eq!(facet.encoded(), b"a\0bc".to_vec());
        assert_eq!(Facet::from_encoded(&facet.encoded()).unwrap(), facet);
        assert_eq!(Facet::from_encoded(&[]).unwrap(), Facet::root());
    }

    #[test]
    fn test_serde() {
        let facet = Facet::from_string("/a/b").unwrap();
        let json = serde_json::to_string(&facet).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: Facet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, facet);
    }
}
