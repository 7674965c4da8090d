use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 8642;
pub const DEFAULT_RPC_PATH: &str = "/rpc";

/// Server settings, read from TOML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Path the JSON-RPC endpoint is mounted at.
    pub rpc_path: String,
    /// Worker threads executing calls.
    pub workers: usize,
    /// Snapshot file backing the store. Without one the store lives in
    /// memory only.
    pub data_file: Option<PathBuf>,
    /// Header in which a TLS-terminating proxy passes the verified client
    /// certificate subject DN.
    pub client_dn_header: Option<String>,
    pub enforce_acl: bool,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            rpc_path: DEFAULT_RPC_PATH.to_string(),
            workers: 4,
            data_file: None,
            client_dn_header: None,
            enforce_acl: false,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if !self.rpc_path.starts_with('/') {
            return Err(ServerError::Config(format!(
                "rpc_path must start with '/': {}",
                self.rpc_path
            )));
        }
        if self.workers == 0 {
            return Err(ServerError::Config("workers must be at least 1".into()));
        }
        Ok(())
    }
}

/// Settings of an HTTP client session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Full URL of the server's JSON-RPC endpoint.
    pub url: String,
    /// Worker threads running asynchronous calls.
    pub workers: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: format!("http://{}:{DEFAULT_PORT}{DEFAULT_RPC_PATH}", Ipv4Addr::LOCALHOST),
            workers: 2,
        }
    }
}

impl ClientConfig {
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }
}
