//! Channel routing: which IRC channels hear about which project.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{NotifyError, Result};

/// The (namespace, name) pair identifying the project that triggered an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub namespace: String,
    pub name: String,
}

impl ProjectIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Fully qualified `namespace/name` key used by explicit mappings.
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Routing table loaded from the `[routing]` section of the config file.
/// Read-only once the server is running.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingTable {
    pub default: String,
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub explicit: HashMap<String, Vec<String>>,
}

impl RoutingTable {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            groups: HashMap::new(),
            explicit: HashMap::new(),
        }
    }

    pub fn with_group(mut self, namespace: &str, channels: &[&str]) -> Self {
        self.groups.insert(
            namespace.to_string(),
            channels.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_explicit(mut self, project: &str, channels: &[&str]) -> Self {
        self.explicit.insert(
            project.to_string(),
            channels.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Checks the table invariants and removes duplicate channels within
    /// each destination set, keeping the first occurrence.
    pub fn validate(mut self) -> Result<Self> {
        if self.default.trim().is_empty() {
            return Err(NotifyError::ConfigError(
                "routing.default must name a channel".to_string(),
            ));
        }

        for (section, map) in [("groups", &mut self.groups), ("explicit", &mut self.explicit)] {
            for (key, channels) in map.iter_mut() {
                let mut seen = BTreeSet::new();
                channels.retain(|c| seen.insert(c.clone()));
                if channels.is_empty() || channels.iter().any(|c| c.trim().is_empty()) {
                    return Err(NotifyError::ConfigError(format!(
                        "routing.{}.\"{}\" must list at least one non-empty channel",
                        section, key
                    )));
                }
            }
        }

        Ok(self)
    }

    /// Resolves the destination channels for a project.
    ///
    /// An explicit `namespace/name` entry wins over a group entry for the
    /// namespace, which wins over the default channel. Never empty.
    pub fn resolve(&self, project: &ProjectIdentity) -> &[String] {
        if let Some(channels) = self.explicit.get(&project.full_path()) {
            return channels;
        }
        if let Some(channels) = self.groups.get(&project.namespace) {
            return channels;
        }
        std::slice::from_ref(&self.default)
    }

    /// Every channel mentioned anywhere in the table, deduplicated and sorted.
    pub fn all_channels(&self) -> Vec<String> {
        let mut all = BTreeSet::new();
        all.insert(self.default.clone());
        for channels in self.groups.values().chain(self.explicit.values()) {
            all.extend(channels.iter().cloned());
        }
        all.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RoutingTable {
        RoutingTable::new("#default")
            .with_group("infra", &["#infra", "#ops"])
            .with_explicit("infra/website", &["#web"])
            .with_explicit("tools/bot", &["#bots"])
    }

    #[test]
    fn explicit_mapping_takes_precedence_over_group() {
        let t = table();
        let channels = t.resolve(&ProjectIdentity::new("infra", "website"));
        assert_eq!(channels, ["#web".to_string()]);
    }

    #[test]
    fn group_mapping_used_without_explicit_entry() {
        let t = table();
        let channels = t.resolve(&ProjectIdentity::new("infra", "dns"));
        assert_eq!(channels, ["#infra".to_string(), "#ops".to_string()]);
    }

    #[test]
    fn explicit_mapping_without_group() {
        let t = table();
        assert_eq!(
            t.resolve(&ProjectIdentity::new("tools", "bot")),
            ["#bots".to_string()]
        );
        assert_eq!(
            t.resolve(&ProjectIdentity::new("tools", "other")),
            ["#default".to_string()]
        );
    }

    #[test]
    fn unknown_project_falls_back_to_default() {
        let t = table();
        let channels = t.resolve(&ProjectIdentity::new("someone", "thing"));
        assert_eq!(channels, ["#default".to_string()]);
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let t = table();
        assert_eq!(
            t.resolve(&ProjectIdentity::new("Infra", "website")),
            ["#default".to_string()]
        );
        assert_eq!(
            t.resolve(&ProjectIdentity::new("infra", "web")),
            ["#infra".to_string(), "#ops".to_string()]
        );
    }

    #[test]
    fn all_channels_collects_every_destination_once() {
        let t = table().with_group("docs", &["#web", "#default"]);
        assert_eq!(
            t.all_channels(),
            vec!["#bots", "#default", "#infra", "#ops", "#web"]
        );
    }

    #[test]
    fn validate_rejects_empty_destination_set() {
        let t = RoutingTable::new("#default").with_group("infra", &[]);
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("routing.groups.\"infra\""));
    }

    #[test]
    fn validate_rejects_blank_default() {
        assert!(RoutingTable::new("  ").validate().is_err());
    }

    #[test]
    fn validate_dedupes_channels_in_order() {
        let t = RoutingTable::new("#default")
            .with_explicit("a/b", &["#two", "#one", "#two"])
            .validate()
            .unwrap();
        assert_eq!(
            t.resolve(&ProjectIdentity::new("a", "b")),
            ["#two".to_string(), "#one".to_string()]
        );
    }

    #[test]
    fn deserializes_from_toml() {
        let t: RoutingTable = toml::from_str(
            r##"
            default = "#gitlab"
            [groups]
            infra = ["#infra"]
            [explicit]
            "infra/website" = ["#web", "#infra"]
            "##,
        )
        .unwrap();
        assert_eq!(t.default, "#gitlab");
        assert_eq!(t.groups["infra"], vec!["#infra"]);
        assert_eq!(t.explicit["infra/website"], vec!["#web", "#infra"]);
    }
}
