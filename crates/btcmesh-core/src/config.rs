//! Configuration for the btcmeshd relay.
//!
//! Resolution order: defaults → config file → environment variables.
//!
//! Config file location:
//!   1. `$BTCMESH_CONFIG` (explicit override)
//!   2. `$XDG_CONFIG_HOME/btcmesh/config.toml`
//!   3. `~/.config/btcmesh/config.toml`
//!
//! The client (`btcmesh-send`) takes all of its inputs from CLI arguments
//! and has no config file of its own.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default reassembly timeout, in seconds.
pub const DEFAULT_REASSEMBLY_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BtcMeshConfig {
    pub rpc: RpcConfig,
    pub mesh: MeshConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Serial device path for the mesh radio. None = loopback/dry-run transport.
    pub device_path: Option<PathBuf>,
    pub reassembly_timeout_secs: u64,
}

impl Default for BtcMeshConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            mesh: MeshConfig::default(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8332,
            user: String::new(),
            password: String::new(),
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            device_path: None,
            reassembly_timeout_secs: DEFAULT_REASSEMBLY_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

impl BtcMeshConfig {
    /// Load config: defaults → file → env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BtcMeshConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn file_path() -> PathBuf {
        std::env::var("BTCMESH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BTCMESH_RPC__HOST") {
            self.rpc.host = v;
        }
        if let Ok(v) = std::env::var("BTCMESH_RPC__PORT") {
            if let Ok(p) = v.parse() {
                self.rpc.port = p;
            }
        }
        if let Ok(v) = std::env::var("BTCMESH_RPC__USER") {
            self.rpc.user = v;
        }
        if let Ok(v) = std::env::var("BTCMESH_RPC__PASSWORD") {
            self.rpc.password = v;
        }
        if let Ok(v) = std::env::var("BTCMESH_MESH__DEVICE_PATH") {
            self.mesh.device_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("BTCMESH_MESH__REASSEMBLY_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.mesh.reassembly_timeout_secs = secs;
            }
        }
    }
}

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("btcmesh")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
