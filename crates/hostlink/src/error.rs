//! Bridge error types.

use hostlink_intercept::InterceptError;
use hostlink_reflect::ReflectError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration validation failed: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Reflect(#[from] ReflectError),

    #[error(transparent)]
    Intercept(#[from] InterceptError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// The bridge was disabled and no longer intercepts anything
    #[error("Bridge is disabled")]
    Disabled,
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
