//! Host version parsing and ordering.
//!
//! Two spellings are accepted: the package tag the host embeds in its
//! internal package names (`v1_19_R1`) and the dotted release form
//! (`1.19.2`). Both compare on the same `(major, minor, patch, revision)`
//! key so catalog bounds can be written in either form.

use crate::error::ReflectError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Internal revision from a package tag (`R1`), absent for dotted versions.
    pub revision: Option<u32>,
}

impl HostVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: None,
        }
    }

    /// The tag substituted for `{v}` in catalog names, e.g. `v1_19_R1`.
    pub fn package_tag(&self) -> String {
        format!("v{}_{}_R{}", self.major, self.minor, self.revision.unwrap_or(1))
    }

    /// Whether this version is at or after `major.minor`, ignoring patch.
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    fn parse_tag(tag: &str) -> Option<Self> {
        let mut parts = tag.strip_prefix('v')?.split('_');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let revision = parts.next()?.strip_prefix('R')?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            major,
            minor,
            patch: 0,
            revision: Some(revision),
        })
    }

    fn parse_dotted(text: &str) -> Option<Self> {
        let mut parts = text.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }
}

impl FromStr for HostVersion {
    type Err = ReflectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::parse_tag(s)
            .or_else(|| Self::parse_dotted(s))
            .ok_or_else(|| ReflectError::InvalidVersion(s.to_string()))
    }
}

impl TryFrom<String> for HostVersion {
    type Error = ReflectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HostVersion> for String {
    fn from(v: HostVersion) -> Self {
        v.to_string()
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(_) => f.write_str(&self.package_tag()),
            None if self.patch == 0 => write!(f, "{}.{}", self.major, self.minor),
            None => write!(f, "{}.{}.{}", self.major, self.minor, self.patch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_spellings() {
        let tag: HostVersion = "v1_19_R1".parse().unwrap();
        assert_eq!((tag.major, tag.minor, tag.revision), (1, 19, Some(1)));
        assert_eq!(tag.package_tag(), "v1_19_R1");

        let dotted: HostVersion = "1.19.2".parse().unwrap();
        assert_eq!((dotted.major, dotted.minor, dotted.patch), (1, 19, 2));
        assert_eq!(dotted.to_string(), "1.19.2");
        assert_eq!(dotted.package_tag(), "v1_19_R1");
    }

    #[test]
    fn rejects_garbage() {
        assert!("v1_19".parse::<HostVersion>().is_err());
        assert!("1.x".parse::<HostVersion>().is_err());
        assert!("".parse::<HostVersion>().is_err());
    }

    #[test]
    fn orders_by_release() {
        let old: HostVersion = "v1_8_R3".parse().unwrap();
        let new: HostVersion = "1.17".parse().unwrap();
        assert!(old < new);
        assert!(new.at_least(1, 17));
        assert!(!old.at_least(1, 17));
    }

    #[test]
    fn serde_uses_the_string_form() {
        #[derive(Deserialize)]
        struct Wrapper {
            version: HostVersion,
        }
        let w: Wrapper = toml::from_str(r#"version = "v1_12_R1""#).unwrap();
        assert_eq!(w.version.minor, 12);
    }
}
