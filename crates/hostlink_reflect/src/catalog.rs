//! Symbolic class ids and the catalog that maps them to real names.
//!
//! A catalog entry is an ordered list of candidate names. Each candidate may
//! be limited to a range of host versions and may contain a `{v}`
//! placeholder that is replaced with the version's package tag.

use crate::version::HostVersion;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version-independent name for a host class, e.g. `server_connection`.
pub type SymbolicId = CompactString;

const VERSION_PLACEHOLDER: &str = "{v}";

/// One candidate real name with optional version bounds.
///
/// Bounds are inclusive and compare on `major.minor` only, so
/// `until = "1.16"` still covers `1.16.5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRule")]
pub struct NameRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<HostVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<HostVersion>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
    Plain(String),
    Bounded {
        name: String,
        #[serde(default)]
        since: Option<HostVersion>,
        #[serde(default)]
        until: Option<HostVersion>,
    },
}

impl From<RawRule> for NameRule {
    fn from(raw: RawRule) -> Self {
        match raw {
            RawRule::Plain(name) => NameRule::any(name),
            RawRule::Bounded { name, since, until } => NameRule { name, since, until },
        }
    }
}

impl NameRule {
    /// A candidate valid for every version.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            since: None,
            until: None,
        }
    }

    pub fn since(mut self, version: HostVersion) -> Self {
        self.since = Some(version);
        self
    }

    pub fn until(mut self, version: HostVersion) -> Self {
        self.until = Some(version);
        self
    }

    pub fn applies_to(&self, version: &HostVersion) -> bool {
        let key = (version.major, version.minor);
        let after_start = self.since.map_or(true, |s| key >= (s.major, s.minor));
        let before_end = self.until.map_or(true, |u| key <= (u.major, u.minor));
        after_start && before_end
    }

    /// The concrete name for `version`, with `{v}` substituted.
    pub fn render(&self, version: &HostVersion) -> String {
        if self.name.contains(VERSION_PLACEHOLDER) {
            self.name.replace(VERSION_PLACEHOLDER, &version.package_tag())
        } else {
            self.name.clone()
        }
    }
}

/// Maps symbolic ids to ordered candidate names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassCatalog {
    entries: BTreeMap<SymbolicId, Vec<NameRule>>,
}

impl ClassCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry whose candidates apply to every version.
    pub fn with<I, S>(mut self, id: impl Into<SymbolicId>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(id, names.into_iter().map(NameRule::any).collect());
        self
    }

    /// Replaces the candidates for `id`.
    pub fn insert(&mut self, id: impl Into<SymbolicId>, rules: Vec<NameRule>) {
        self.entries.insert(id.into(), rules);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from `other` replace entries with the same id.
    pub fn merge(&mut self, other: ClassCatalog) {
        self.entries.extend(other.entries);
    }

    /// Candidate real names for `id` under `version`, in catalog order.
    /// Unknown ids yield the id itself so real names can be used directly.
    pub fn candidates(&self, id: &str, version: &HostVersion) -> Vec<String> {
        match self.entries.get(id) {
            Some(rules) => {
                let mut names: Vec<String> = Vec::with_capacity(rules.len());
                for rule in rules.iter().filter(|r| r.applies_to(version)) {
                    let name = rule.render(version);
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                names
            }
            None => vec![id.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> HostVersion {
        s.parse().unwrap()
    }

    #[test]
    fn substitutes_package_tag() {
        let catalog = ClassCatalog::new().with("server", ["org.host.{v}.Server", "org.host.Server"]);
        assert_eq!(
            catalog.candidates("server", &v("v1_12_R1")),
            ["org.host.v1_12_R1.Server", "org.host.Server"]
        );
    }

    #[test]
    fn bounds_select_layout() {
        let mut catalog = ClassCatalog::new();
        catalog.insert(
            "connection",
            vec![
                NameRule::any("net.host.{v}.NetworkManager").until(v("1.16")),
                NameRule::any("net.host.network.NetworkManager").since(v("1.17")),
            ],
        );
        assert_eq!(
            catalog.candidates("connection", &v("1.16.5")),
            ["net.host.v1_16_R1.NetworkManager"]
        );
        assert_eq!(
            catalog.candidates("connection", &v("v1_18_R2")),
            ["net.host.network.NetworkManager"]
        );
    }

    #[test]
    fn unknown_ids_pass_through() {
        let catalog = ClassCatalog::new();
        assert_eq!(catalog.candidates("java.util.List", &v("1.8")), ["java.util.List"]);
    }

    #[test]
    fn deserializes_plain_and_bounded_rules() {
        let text = r#"
            message = ["net.host.{v}.Packet"]
            handshake = [
                { name = "net.host.{v}.PacketHandshakingInSetProtocol", until = "1.16" },
                { name = "net.host.protocol.HandshakePacket", since = "1.17" },
            ]
        "#;
        let catalog: ClassCatalog = toml::from_str(text).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.candidates("handshake", &v("1.19")),
            ["net.host.protocol.HandshakePacket"]
        );
    }
}
