//! Logging system setup.
//!
//! Installs a tracing-subscriber registry with either human-readable or
//! JSON output. Embedders that already install their own subscriber can
//! skip this entirely; every crate in the workspace only emits `tracing`
//! events.

use crate::config::LoggingSettings;
use crate::error::{BridgeError, Result};
use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The filter described by `config`: its level plus each per-target
/// directive.
pub fn configured_filter(config: &LoggingSettings) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level).map_err(|e| BridgeError::Logging(e.to_string()))?;
    for directive in &config.directives {
        let directive: Directive = directive
            .parse()
            .map_err(|e| BridgeError::Logging(format!("'{directive}': {e}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Initializes the global subscriber.
///
/// # Arguments
///
/// * `config` - Logging configuration from the config file
/// * `json_format` - Force JSON output regardless of `config`
///
/// `RUST_LOG` replaces the configured filter when set.
///
/// # Errors
///
/// [`BridgeError::Logging`] when a directive does not parse or a global
/// subscriber is already installed.
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => configured_filter(config)?,
    };
    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(true)
        .with_thread_names(true);

    let installed = if json_format || config.json_format {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer.with_ansi(true)).try_init()
    };
    installed.map_err(|e| BridgeError::Logging(e.to_string()))?;

    info!(
        "🔧 Logging initialized with level: {} ({} directives)",
        config.level,
        config.directives.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_filter_carries_directives() {
        let settings = LoggingSettings {
            directives: vec!["hostlink_intercept=trace".to_string()],
            ..LoggingSettings::default()
        };
        let filter = configured_filter(&settings).unwrap().to_string();
        assert!(filter.contains("hostlink_intercept=trace"), "{filter}");

        let broken = LoggingSettings {
            directives: vec!["hostlink_intercept=chatty".to_string()],
            ..LoggingSettings::default()
        };
        assert!(matches!(configured_filter(&broken), Err(BridgeError::Logging(_))));
    }

    #[test]
    fn second_install_is_rejected() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            json_format: true,
            ..LoggingSettings::default()
        };
        assert!(setup_logging(&settings, false).is_ok());
        assert!(matches!(
            setup_logging(&LoggingSettings::default(), false),
            Err(BridgeError::Logging(_))
        ));
    }
}
