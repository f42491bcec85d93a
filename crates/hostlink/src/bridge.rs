//! Bridge lifecycle: wiring reflection and interception into a host, and
//! taking them out again.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use hostlink_intercept::{InterceptedConnection, PacketInterceptor};
use hostlink_reflect::host::{HostRuntime, Value};
use hostlink_reflect::{HostVersion, ReflectionContext};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A live bridge into one host.
///
/// Owns the reflection context and the packet interceptor. Dropping the
/// bridge disables it.
pub struct HostBridge {
    config: BridgeConfig,
    reflection: ReflectionContext,
    interceptor: Option<PacketInterceptor>,
}

impl HostBridge {
    /// Validates `config`, builds the reflection context and installs the
    /// interceptor into the host reachable from `server`.
    pub fn enable(runtime: Arc<dyn HostRuntime>, server: &Value, config: BridgeConfig) -> Result<Self> {
        config.ensure_valid()?;
        let version = config.host_version()?;
        let reflection = ReflectionContext::new(runtime, config.catalog(), version);
        let interceptor = PacketInterceptor::new(reflection.clone(), server, config.interceptor.clone())?;

        info!(
            "🌉 Host bridge enabled for {} as '{}'",
            version,
            interceptor.handler_name()
        );
        Ok(Self {
            config,
            reflection,
            interceptor: Some(interceptor),
        })
    }

    /// Loads the configuration at `path` (creating a default one if absent)
    /// and enables the bridge with it.
    pub async fn enable_from_file(
        runtime: Arc<dyn HostRuntime>,
        server: &Value,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let config = BridgeConfig::load_from_file(path).await?;
        Self::enable(runtime, server, config)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn version(&self) -> &HostVersion {
        self.reflection.version()
    }

    pub fn reflection(&self) -> &ReflectionContext {
        &self.reflection
    }

    /// The interceptor, while the bridge is enabled.
    pub fn interceptor(&self) -> Result<&PacketInterceptor> {
        self.interceptor.as_ref().ok_or(BridgeError::Disabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.interceptor.is_some()
    }

    /// Glue for the host's quit event: forgets the identity's receiver.
    pub fn on_quit(&self, identity: &Uuid) -> Option<Arc<InterceptedConnection>> {
        self.interceptor.as_ref()?.release(identity)
    }

    /// Removes the interceptor and restores the host. Idempotent.
    pub fn disable(&mut self) {
        if let Some(interceptor) = self.interceptor.take() {
            interceptor.shutdown();
            info!("🌉 Host bridge disabled ({} handles cached)", self.reflection.cached_handles());
        }
    }
}

impl Drop for HostBridge {
    fn drop(&mut self) {
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_intercept::loopback::{packets, LoopbackServer};
    use hostlink_intercept::{Channel, FnModifier, Priority, Verdict};
    use hostlink_reflect::ReflectError;
    use tempfile::tempdir;

    fn loopback() -> LoopbackServer {
        LoopbackServer::new(HostVersion::new(1, 12, 2)).unwrap()
    }

    fn runtime(server: &LoopbackServer) -> Arc<dyn HostRuntime> {
        server.host().clone()
    }

    #[test]
    fn default_catalog_wires_into_a_legacy_host() -> anyhow::Result<()> {
        let server = loopback();
        let mut bridge = HostBridge::enable(runtime(&server), &server.server(), BridgeConfig::default())?;
        assert!(bridge.is_enabled());
        assert_eq!(bridge.version().package_tag(), "v1_12_R1");

        bridge.interceptor()?.register(
            Arc::new(FnModifier::new("mute").on_outbound(|_, _| Ok(Verdict::Terminate))),
            Priority::High,
        );
        let client = server.connect()?;
        server.tick()?;
        let chat = server.packet(packets::CHAT_OUT, &[("a", Value::from("hi"))])?;
        assert_eq!(client.channel.write(Value::Object(chat), None), None);

        let identity = Uuid::new_v4();
        server.login(&client, identity, "alex")?;
        assert!(bridge.on_quit(&identity).is_some());

        bridge.disable();
        assert!(!bridge.is_enabled());
        assert!(matches!(bridge.interceptor(), Err(BridgeError::Disabled)));
        assert!(!client.channel.contains(bridge.config().interceptor.handler_name().as_str()));
        bridge.disable();
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected_before_wiring() {
        let server = loopback();
        let mut config = BridgeConfig::default();
        config.logging.level = "chatty".to_string();
        let result = HostBridge::enable(runtime(&server), &server.server(), config);
        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
    }

    #[test]
    fn wrong_version_fails_class_resolution() {
        let server = loopback();
        let mut config = BridgeConfig::default();
        config.host.version = "1.19.2".to_string();
        let result = HostBridge::enable(runtime(&server), &server.server(), config);
        assert!(matches!(
            result,
            Err(BridgeError::Intercept(hostlink_intercept::InterceptError::Reflect(
                ReflectError::ClassNotFound { .. }
            )))
        ));
    }

    #[tokio::test]
    async fn enable_from_file_creates_default_config() {
        let server = loopback();
        let dir = tempdir().unwrap();
        let path = dir.path().join("hostlink.toml");

        let bridge = HostBridge::enable_from_file(runtime(&server), &server.server(), &path)
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(bridge.config(), &BridgeConfig::default());
    }
}
