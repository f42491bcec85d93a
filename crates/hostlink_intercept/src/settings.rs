//! Interceptor settings.

use serde::{Deserialize, Serialize};

/// Default name of the host's terminal protocol handler
fn default_terminal_handler() -> String {
    "packet_handler".to_string()
}

fn default_plugin_name() -> String {
    "hostlink".to_string()
}

fn default_filter_non_messages() -> bool {
    true
}

/// Settings for one [`PacketInterceptor`](crate::PacketInterceptor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorSettings {
    /// Owning plugin; the handler name is derived from it
    #[serde(default = "default_plugin_name")]
    pub plugin_name: String,
    /// Explicit handler name, overriding the derived one
    #[serde(default)]
    pub handler_name: Option<String>,
    /// Handler our handler is inserted in front of
    #[serde(default = "default_terminal_handler")]
    pub terminal_handler: String,
    /// Forward anything that is not a host message without running modifiers
    #[serde(default = "default_filter_non_messages")]
    pub filter_non_messages: bool,
}

impl Default for InterceptorSettings {
    fn default() -> Self {
        Self {
            plugin_name: default_plugin_name(),
            handler_name: None,
            terminal_handler: default_terminal_handler(),
            filter_non_messages: default_filter_non_messages(),
        }
    }
}

impl InterceptorSettings {
    pub fn for_plugin(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            ..Self::default()
        }
    }

    /// The pipeline handler name: the override if set, else
    /// `pi_<plugin name>` lowercased with spaces replaced by underscores.
    pub fn handler_name(&self) -> String {
        match &self.handler_name {
            Some(name) => name.clone(),
            None => format!("pi_{}", self.plugin_name.to_lowercase().replace(' ', "_")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_name_derives_from_plugin() {
        let settings = InterceptorSettings::for_plugin("My Chat Plugin");
        assert_eq!(settings.handler_name(), "pi_my_chat_plugin");

        let overridden = InterceptorSettings {
            handler_name: Some("custom".into()),
            ..settings
        };
        assert_eq!(overridden.handler_name(), "custom");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: InterceptorSettings = serde_json::from_str(r#"{"plugin_name": "x"}"#).unwrap();
        assert_eq!(settings.terminal_handler, "packet_handler");
        assert!(settings.filter_non_messages);
        assert!(settings.handler_name.is_none());
    }
}
