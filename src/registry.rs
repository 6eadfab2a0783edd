//! Vantage-host registry loaded from a TOML file.
//!
//! The registry is read once at startup, before any run can begin. An
//! unreadable, malformed, or empty registry is fatal — it is the only error
//! class that is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One remote machine used as the origin of reachability probes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VantageHost {
    /// Display name shown in the results table.
    pub name: String,
    /// Network address, with an optional `:port` suffix.
    pub host: String,
    /// Login user.
    pub user: String,
    /// Shared secret, used both as a password and as the answer to every
    /// keyboard-interactive challenge.
    pub password: String,
}

impl VantageHost {
    /// The `host:port` dial string, appending the standard SSH port when
    /// the registry entry does not carry one.
    pub fn dial_addr(&self) -> String {
        if self.host.contains(':') {
            self.host.clone()
        } else {
            format!("{}:22", self.host)
        }
    }
}

/// Errors that make startup impossible.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("registry {path} lists no servers")]
    Empty { path: PathBuf },
}

/// The ordered list of vantage hosts for this process.
#[derive(Debug, Clone, Deserialize)]
pub struct Registry {
    pub servers: Vec<VantageHost>,
}

impl Registry {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let registry: Registry =
            toml::from_str(&raw).map_err(|source| RegistryError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        if registry.servers.is_empty() {
            return Err(RegistryError::Empty {
                path: path.to_path_buf(),
            });
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[[servers]]
name = "Site1"
host = "192.168.121.101"
user = "admin"
password = "admin"

[[servers]]
name = "Site2"
host = "192.168.121.102:2222"
user = "admin"
password = "admin"
"#;

    #[test]
    fn loads_ordered_servers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.toml");
        fs::write(&path, SAMPLE).unwrap();

        let registry = Registry::load(&path).unwrap();
        assert_eq!(registry.servers.len(), 2);
        assert_eq!(registry.servers[0].name, "Site1");
        assert_eq!(registry.servers[1].name, "Site2");
    }

    #[test]
    fn dial_addr_defaults_to_ssh_port() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.toml");
        fs::write(&path, SAMPLE).unwrap();

        let registry = Registry::load(&path).unwrap();
        assert_eq!(registry.servers[0].dial_addr(), "192.168.121.101:22");
        assert_eq!(registry.servers[1].dial_addr(), "192.168.121.102:2222");
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let err = Registry::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, RegistryError::Unreadable { .. }));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.toml");
        fs::write(&path, "servers = [ not toml").unwrap();

        let err = Registry::load(&path).unwrap_err();
        assert!(matches!(err, RegistryError::Malformed { .. }));
    }

    #[test]
    fn empty_registry_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.toml");
        fs::write(&path, "servers = []").unwrap();

        let err = Registry::load(&path).unwrap_err();
        assert!(matches!(err, RegistryError::Empty { .. }));
    }
}
