//! Connection configuration

use serde::{Deserialize, Serialize};

/// Authentication material for a remote host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMethod {
    /// Password authentication
    Password(String),
    /// Private key material (PEM or OpenSSH format), with optional passphrase
    PrivateKey {
        /// Key material as read from the key file
        key: String,
        /// Passphrase protecting the key, if any
        passphrase: Option<String>,
    },
}

/// SSH connection configuration
///
/// Immutable once an executor has been constructed from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Remote hostname or IP
    pub host: String,
    /// Remote port (default: 22)
    pub port: u16,
    /// Username
    pub username: String,
    /// Authentication material
    pub auth: AuthMethod,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout: u64,
}

impl SshConfig {
    /// Create a configuration using password authentication.
    pub fn with_password(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth: AuthMethod::Password(password.into()),
            connect_timeout: 30,
        }
    }

    /// Create a configuration using private key authentication.
    pub fn with_private_key(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth: AuthMethod::PrivateKey {
                key: key.into(),
                passphrase: None,
            },
            connect_timeout: 30,
        }
    }

    /// Set the connection timeout in seconds.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout = secs;
        self
    }

    /// The `host:port` address string for the TCP connect.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_config_defaults() {
        let config = SshConfig::with_password("example.com", 22, "root", "secret");
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 22);
        assert_eq!(config.username, "root");
        assert_eq!(config.connect_timeout, 30);
        assert!(matches!(config.auth, AuthMethod::Password(ref p) if p == "secret"));
    }

    #[test]
    fn test_addr_format() {
        let config = SshConfig::with_password("10.0.0.5", 2222, "admin", "pw");
        assert_eq!(config.addr(), "10.0.0.5:2222");
    }

    #[test]
    fn test_connect_timeout_override() {
        let config =
            SshConfig::with_private_key("host", 22, "user", "KEY").with_connect_timeout(5);
        assert_eq!(config.connect_timeout, 5);
    }
}
