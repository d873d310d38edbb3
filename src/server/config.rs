//! Server configuration
//!
//! Immutable for the lifetime of a session. An embedder's configuration
//! layer can deserialize this directly; nothing here reads files or
//! arguments itself.

use serde::Deserialize;

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Accepted username, compared byte-for-byte.
    pub user: String,
    /// Accepted password, compared in constant time.
    pub password: String,
    /// Text of the initial `220` greeting.
    pub banner: String,
    /// Close the control connection after this much command inactivity.
    pub control_idle_ms: Option<u64>,
    /// Tear down passive resources (and any transfer still waiting for its
    /// data connection) after this much inactivity.
    pub pasv_idle_ms: Option<u64>,
    /// Abort a streaming transfer after this much inactivity.
    pub transfer_idle_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            user: "anonymous".to_string(),
            password: String::new(),
            banner: "FTP Server Ready".to_string(),
            control_idle_ms: None,
            pasv_idle_ms: None,
            transfer_idle_ms: None,
        }
    }
}

impl ServerConfig {
    /// Convenience constructor for the common credentials-and-defaults case.
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_timeouts() {
        let config = ServerConfig::default();
        assert!(config.control_idle_ms.is_none());
        assert!(config.pasv_idle_ms.is_none());
        assert!(config.transfer_idle_ms.is_none());
        assert_eq!(config.banner, "FTP Server Ready");
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"user":"test","password":"secret"}"#).unwrap();
        assert_eq!(config.user, "test");
        assert_eq!(config.password, "secret");
        assert!(config.control_idle_ms.is_none());
    }
}
