//! Gateway configuration with validation.
//!
//! Values are layered: defaults, then `SG_*` environment variables, then
//! command-line flags applied by the binary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Keystore (v3) of the built-in development account. Password is empty.
pub const DEFAULT_KEYSTORE: &str = r#"{"address":"f29f27dacb6c2b616c2552cb0c7a3c7ff5b64d16","crypto":{"cipher":"aes-128-ctr","ciphertext":"3513e917da2e63563811be8f879b4cb127d3da5619f1bd9204bcdfc3725a688e","cipherparams":{"iv":"dcae036447cb85f851354231dc01b252"},"kdf":"scrypt","kdfparams":{"dklen":32,"n":262144,"p":1,"r":8,"salt":"28d7aed161d7f2a1307c0fee4ac10ff16e491a74d7ae29d07a0b38fb75b9d479"},"mac":"7ae92e733a9d290676a685dee20ab36dd533fbf82480f5caf510c83baef123ad"},"id":"2e377c26-92d3-4671-b01f-1dd32c6e2607","version":3}"#;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener
    pub http: HttpConfig,
    /// Chain node to deploy to and query
    pub node: NodeConfig,
    /// Session parameters for the storage contract
    pub contract: ContractConfig,
    /// Bounds on outbound chain calls
    pub timeouts: TimeoutConfig,
    /// Admin server (health and metrics)
    pub admin: AdminConfig,
    /// Signing account
    pub credential: Credential,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.enabled && self.admin.port == self.http.port && self.admin.host == self.http.host
        {
            return Err(ConfigError::DuplicatePorts);
        }

        if self.node.ipc_path.is_none() && self.node.host.trim().is_empty() {
            return Err(ConfigError::Invalid("node host cannot be empty".into()));
        }

        if self.contract.gas_limit == 0 {
            return Err(ConfigError::Invalid("gas_limit cannot be 0".into()));
        }

        if self.timeouts.chain_call.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "chain_call timeout cannot be 0".into(),
            ));
        }
        if self.timeouts.deploy.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "deploy timeout cannot be 0".into(),
            ));
        }

        if self.credential.keystore.trim().is_empty() {
            return Err(ConfigError::Invalid("keystore cannot be empty".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Get Admin server bind address
    pub fn admin_addr(&self) -> SocketAddr {
        SocketAddr::new(self.admin.host, self.admin.port)
    }

    /// Endpoint the chain client connects to. An IPC path wins over host/port.
    pub fn node_endpoint(&self) -> NodeEndpoint {
        match &self.node.ipc_path {
            Some(path) => NodeEndpoint::Ipc(path.clone()),
            None => NodeEndpoint::Http(format!("http://{}:{}", self.node.host, self.node.port)),
        }
    }

    /// Apply `SG_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SG_NODE_HOST") {
            self.node.host = host;
        }
        override_parsed(&lookup, "SG_NODE_PORT", &mut self.node.port);
        if let Some(path) = lookup("SG_NODE_IPC") {
            self.node.ipc_path = Some(PathBuf::from(path));
        }
        override_parsed(&lookup, "SG_SIMULATED", &mut self.node.simulated);
        override_parsed(&lookup, "SG_LISTEN_HOST", &mut self.http.host);
        override_parsed(&lookup, "SG_LISTEN_PORT", &mut self.http.port);
        override_parsed(&lookup, "SG_GAS_LIMIT", &mut self.contract.gas_limit);
        override_parsed(&lookup, "SG_READ_PENDING", &mut self.contract.read_pending);
        override_parsed(&lookup, "SG_ADMIN_ENABLED", &mut self.admin.enabled);
        override_parsed(&lookup, "SG_ADMIN_PORT", &mut self.admin.port);
        if let Some(raw) = lookup("SG_CHAIN_CALL_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&raw) {
                Ok(d) => self.timeouts.chain_call = d,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring SG_CHAIN_CALL_TIMEOUT"),
            }
        }
        if let Some(raw) = lookup("SG_DEPLOY_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&raw) {
                Ok(d) => self.timeouts.deploy = d,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring SG_DEPLOY_TIMEOUT"),
            }
        }
        if let Some(password) = lookup("SG_KEYSTORE_PASSWORD") {
            self.credential.password = password;
        }
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

/// Chain node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node hostname
    pub host: String,
    /// Node JSON-RPC port (default: 22001)
    pub port: u16,
    /// Unix socket of the node; replaces host/port when set
    pub ipc_path: Option<PathBuf>,
    /// Use the in-process simulated chain instead of a node
    pub simulated: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 22001,
            ipc_path: None,
            simulated: false,
        }
    }
}

/// Contract session parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Gas ceiling for deploy and set transactions
    pub gas_limit: u64,
    /// Read pending state in `get()` calls
    pub read_pending: bool,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            gas_limit: 10_000_000,
            read_pending: true,
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Single call, fetch or transaction submission
    #[serde(with = "humantime_serde")]
    pub chain_call: Duration,
    /// Whole deploy sequence, key derivation included
    #[serde(with = "humantime_serde")]
    pub deploy: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            chain_call: Duration::from_secs(10),
            deploy: Duration::from_secs(120),
        }
    }
}

/// Admin server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address (localhost only by default)
    pub host: IpAddr,
    /// Port (default: 9090)
    pub port: u16,
    /// Enable admin server
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9090,
            enabled: false,
        }
    }
}

/// Keystore-style credential material used to authorize transactions.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credential {
    /// Keystore v3 JSON document
    pub keystore: String,
    /// Keystore password
    pub password: String,
}

impl Default for Credential {
    fn default() -> Self {
        Self {
            keystore: DEFAULT_KEYSTORE.to_string(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("keystore_len", &self.keystore.len())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the chain node can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEndpoint {
    /// JSON-RPC over HTTP, e.g. `http://localhost:22001`
    Http(String),
    /// JSON-RPC over a Unix domain socket
    Ipc(PathBuf),
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeEndpoint::Http(url) => f.write_str(url),
            NodeEndpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// HTTP and admin servers share a bind address
    #[error("duplicate ports configured")]
    DuplicatePorts,
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Keystore file could not be read
    #[error("cannot read keystore {path}: {reason}")]
    Keystore { path: PathBuf, reason: String },
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.http_addr().port(), 8080);
        assert_eq!(
            config.node_endpoint(),
            NodeEndpoint::Http("http://localhost:22001".into())
        );
        assert_eq!(config.contract.gas_limit, 10_000_000);
        assert!(config.contract.read_pending);
        assert!(config.credential.password.is_empty());
    }

    #[test]
    fn test_ipc_path_wins() {
        let mut config = GatewayConfig::default();
        config.node.ipc_path = Some(PathBuf::from("/tmp/geth.ipc"));
        assert_eq!(
            config.node_endpoint(),
            NodeEndpoint::Ipc(PathBuf::from("/tmp/geth.ipc"))
        );
        assert_eq!(config.node_endpoint().to_string(), "ipc:///tmp/geth.ipc");
    }

    #[test]
    fn test_duplicate_ports() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        config.admin.host = config.http.host;
        config.admin.port = config.http.port;
        assert!(matches!(config.validate(), Err(ConfigError::DuplicatePorts)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = GatewayConfig::default();
        config.timeouts.chain_call = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SG_NODE_HOST", "quorum-node"),
            ("SG_NODE_PORT", "22000"),
            ("SG_LISTEN_PORT", "not-a-port"),
            ("SG_SIMULATED", "true"),
            ("SG_CHAIN_CALL_TIMEOUT", "3s"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.node.host, "quorum-node");
        assert_eq!(config.node.port, 22000);
        assert_eq!(config.http.port, 8080);
        assert!(config.node.simulated);
        assert_eq!(config.timeouts.chain_call, Duration::from_secs(3));
    }

    #[test]
    fn test_serde_durations() {
        let json = r#"{"timeouts":{"chain_call":"250ms","deploy":"2m"}}"#;
        let config: GatewayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timeouts.chain_call, Duration::from_millis(250));
        assert_eq!(config.timeouts.deploy, Duration::from_secs(120));
        assert_eq!(config.node.port, 22001);
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let credential = Credential {
            keystore: "{}".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("hunter2"));
    }
}
