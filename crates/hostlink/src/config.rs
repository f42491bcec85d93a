//! Bridge configuration loaded from a TOML file.
//!
//! The file names the host version, logging preferences, interceptor
//! settings and any class catalog overrides. Catalog overrides replace the
//! embedded defaults id by id.

use crate::error::{BridgeError, Result};
use hostlink_intercept::{ids, InterceptorSettings};
use hostlink_reflect::{ClassCatalog, HostVersion};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::filter::Directive;

/// Class catalog shipped with the crate.
pub const DEFAULT_CATALOG: &str = include_str!("../catalog/default.toml");

fn default_version() -> String {
    "v1_12_R1".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_directives() -> Vec<String> {
    vec!["hostlink_reflect=info".to_string()]
}

/// The embedded default catalog.
pub fn default_catalog() -> ClassCatalog {
    toml::from_str(DEFAULT_CATALOG).unwrap_or_else(|e| {
        warn!("⚠️ Embedded class catalog is unreadable: {}", e);
        ClassCatalog::new()
    })
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub interceptor: InterceptorSettings,
    /// Catalog entries replacing the defaults with the same id
    #[serde(default)]
    pub classes: ClassCatalog,
}

/// The host being bridged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Host version, as a package tag (`v1_16_R3`) or dotted (`1.16.5`)
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
    /// Per-target filter directives applied on top of `level`. The default
    /// keeps class resolution chatter out of debug output.
    #[serde(default = "default_directives")]
    pub directives: Vec<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_format: false,
            directives: default_directives(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: HostSettings::default(),
            logging: LoggingSettings::default(),
            interceptor: InterceptorSettings::default(),
            classes: ClassCatalog::new(),
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration there and
    /// returns it.
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await? {
            let content = tokio::fs::read_to_string(path).await?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = BridgeConfig::default();
            config.save_to_file(path).await?;
            info!("📝 Created default configuration file: {}", path.display());
            Ok(config)
        }
    }

    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// The parsed host version.
    pub fn host_version(&self) -> Result<HostVersion> {
        Ok(self.host.version.parse()?)
    }

    /// The embedded catalog with this file's overrides applied.
    pub fn catalog(&self) -> ClassCatalog {
        let mut catalog = default_catalog();
        catalog.merge(self.classes.clone());
        catalog
    }

    /// Checks the configuration for consistency.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or a message describing the
    /// first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Err(e) = self.host_version() {
            return Err(format!("Invalid host version '{}': {}", self.host.version, e));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }
        if let Some(bad) = self
            .logging
            .directives
            .iter()
            .find(|d| d.parse::<Directive>().is_err())
        {
            return Err(format!("Invalid log directive: {bad}"));
        }

        if self.interceptor.terminal_handler.trim().is_empty() {
            return Err("interceptor.terminal_handler cannot be empty".to_string());
        }
        if self.interceptor.handler_name().trim().is_empty() {
            return Err("interceptor handler name cannot be empty".to_string());
        }
        if self.interceptor.handler_name() == self.interceptor.terminal_handler {
            return Err("interceptor handler name must differ from the terminal handler".to_string());
        }

        let catalog = self.catalog();
        let missing: Vec<&str> = ids::REQUIRED
            .iter()
            .copied()
            .filter(|id| !catalog.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(format!("Class catalog is missing required ids: {}", missing.join(", ")));
        }

        Ok(())
    }

    /// Validates, turning a failure into a [`BridgeError`].
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(BridgeError::InvalidConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_reflect::NameRule;
    use tempfile::tempdir;

    #[test]
    fn test_bridge_config_default() {
        let config = BridgeConfig::default();
        assert_eq!(config.host.version, "v1_12_R1");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.logging.directives, ["hostlink_reflect=info"]);
        assert_eq!(config.interceptor.handler_name(), "pi_hostlink");
        assert!(config.classes.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_catalog_covers_every_id() {
        let catalog = default_catalog();
        for id in ids::ALL {
            assert!(catalog.contains(id), "missing {id}");
        }
    }

    #[test]
    fn test_default_catalog_switches_layout_at_1_17() {
        let catalog = default_catalog();
        let legacy: HostVersion = "v1_16_R3".parse().unwrap();
        let modern: HostVersion = "1.19.2".parse().unwrap();
        assert_eq!(
            catalog.candidates(ids::CONNECTION, &legacy),
            ["net.minecraft.server.v1_16_R3.NetworkManager"]
        );
        assert_eq!(
            catalog.candidates(ids::CONNECTION, &modern),
            ["net.minecraft.network.NetworkManager"]
        );
        assert_eq!(
            catalog.candidates(ids::SERVER, &modern),
            ["org.bukkit.craftbukkit.v1_19_R1.CraftServer"]
        );
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hostlink.toml");

        let config = BridgeConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert!(path.exists());

        // The written file loads back to the same configuration.
        let reloaded = BridgeConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[host]
version = "1.16.5"

[logging]
level = "debug"
json_format = true

[interceptor]
plugin_name = "Chat Guard"
terminal_handler = "handler"

[classes]
open_window = ["custom.OpenWindow"]
connection = [{ name = "custom.{v}.Connection", since = "1.16" }]
"#;
        let dir = tempdir().unwrap();
        let path = dir.path().join("hostlink.toml");
        tokio::fs::write(&path, toml_content).await.unwrap();

        let config = BridgeConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.host_version().unwrap(), HostVersion::new(1, 16, 5));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.interceptor.handler_name(), "pi_chat_guard");
        assert_eq!(config.interceptor.terminal_handler, "handler");
        assert!(config.interceptor.filter_non_messages);

        let version = config.host_version().unwrap();
        let catalog = config.catalog();
        assert_eq!(catalog.candidates(ids::OPEN_WINDOW, &version), ["custom.OpenWindow"]);
        assert_eq!(
            catalog.candidates(ids::CONNECTION, &version),
            ["custom.v1_16_R1.Connection"]
        );
        assert_eq!(
            catalog.candidates(ids::MESSAGE, &version),
            ["net.minecraft.server.v1_16_R1.Packet"]
        );
    }

    #[tokio::test]
    async fn test_save_round_trip_keeps_bounded_rules() {
        let mut config = BridgeConfig::default();
        config.classes.insert(
            "handshake",
            vec![NameRule::any("legacy.Handshake").until(HostVersion::new(1, 8, 0))],
        );
        let dir = tempdir().unwrap();
        let path = dir.path().join("hostlink.toml");

        config.save_to_file(&path).await.unwrap();
        let reloaded = BridgeConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_validation_invalid_version() {
        let mut config = BridgeConfig::default();
        config.host.version = "one point twelve".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid host version"));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = BridgeConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));
        assert!(matches!(config.ensure_valid(), Err(BridgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_validation_invalid_log_directive() {
        let mut config = BridgeConfig::default();
        config.logging.directives.push("hostlink_intercept=chatty".to_string());
        assert!(config.validate().unwrap_err().contains("Invalid log directive"));
    }

    #[test]
    fn test_validation_handler_names() {
        let mut config = BridgeConfig::default();
        config.interceptor.terminal_handler = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.interceptor.handler_name = Some("packet_handler".to_string());
        assert!(config.validate().unwrap_err().contains("must differ"));
    }

    #[test]
    fn test_validation_catalog_override_cannot_remove_ids() {
        let mut config = BridgeConfig::default();
        config.classes.insert("server", Vec::new());
        // An empty override still names the id; resolution fails later instead.
        assert!(config.validate().is_ok());
        assert!(config.catalog().candidates(ids::SERVER, &config.host_version().unwrap()).is_empty());
    }
}
