//! Centralized configuration (environment variables + defaults).
//!
//! Channel and chaincode are read once at boot and are fatal when absent. The peer settings are
//! captured at boot as optional values and validated on every session open, so a missing
//! credential setting fails the request rather than the process.

use crate::domain::decode::DEFAULT_RAW_PREVIEW_LIMIT;
use crate::domain::error::GatewayError;
use std::path::PathBuf;

pub const ENV_CHANNEL: &str = "FABRIC_CHANNEL";
pub const ENV_CHAINCODE: &str = "FABRIC_CHAINCODE";
pub const ENV_MSP_ID: &str = "FABRIC_MSP_ID";
pub const ENV_CRYPTO_PATH: &str = "FABRIC_CRYPTO_PATH";
pub const ENV_PEER_ENDPOINT: &str = "FABRIC_PEER_ENDPOINT";
pub const ENV_TLS_CERT_PATH: &str = "FABRIC_TLS_CERT_PATH";
pub const ENV_PEER_HOST_ALIAS: &str = "FABRIC_PEER_HOST_ALIAS";
pub const ENV_USER_MSP_DIR: &str = "FABRIC_USER_MSP_DIR";
pub const ENV_TLS_CLIENT_CERT_PATH: &str = "FABRIC_TLS_CLIENT_CERT_PATH";
pub const ENV_TLS_CLIENT_KEY_PATH: &str = "FABRIC_TLS_CLIENT_KEY_PATH";
pub const ENV_PORT: &str = "PORT";
pub const ENV_RAW_PREVIEW_LIMIT: &str = "RAW_PREVIEW_LIMIT";

pub const DEFAULT_PORT: u16 = 8800;
pub const DEFAULT_PEER_HOST_ALIAS: &str = "peer0.org1.example.com";
pub const DEFAULT_USER_MSP_DIR: &str = "users/Admin@org1.example.com/msp";

/// Channel + chaincode every transaction is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTarget {
    pub channel: String,
    pub chaincode: String,
}

/// Peer/credential settings as found in the environment; nothing here is validated yet.
#[derive(Debug, Clone, Default)]
pub struct PeerSettings {
    pub msp_id: Option<String>,
    pub crypto_path: Option<PathBuf>,
    pub peer_endpoint: Option<String>,
    pub tls_cert_path: Option<PathBuf>,
    pub host_alias: String,
    pub user_msp_dir: PathBuf,
    pub tls_client_cert_path: Option<PathBuf>,
    pub tls_client_key_path: Option<PathBuf>,
}

/// Client certificate + key presented to the peer during the TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Fully validated settings for opening one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub msp_id: String,
    pub crypto_path: PathBuf,
    pub peer_endpoint: String,
    pub tls_cert_path: PathBuf,
    pub host_alias: String,
    pub user_msp_dir: PathBuf,
    pub client_tls: Option<ClientTlsPaths>,
}

impl ConnectionSettings {
    pub fn signcerts_dir(&self) -> PathBuf {
        self.crypto_path.join(&self.user_msp_dir).join("signcerts")
    }

    pub fn keystore_dir(&self) -> PathBuf {
        self.crypto_path.join(&self.user_msp_dir).join("keystore")
    }
}

impl PeerSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let path = |key: &str| get(key).map(|v| PathBuf::from(shellexpand::tilde(&v).into_owned()));

        PeerSettings {
            msp_id: get(ENV_MSP_ID),
            crypto_path: path(ENV_CRYPTO_PATH),
            peer_endpoint: get(ENV_PEER_ENDPOINT),
            tls_cert_path: path(ENV_TLS_CERT_PATH),
            host_alias: get(ENV_PEER_HOST_ALIAS).unwrap_or_else(|| DEFAULT_PEER_HOST_ALIAS.to_string()),
            user_msp_dir: get(ENV_USER_MSP_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_USER_MSP_DIR)),
            tls_client_cert_path: path(ENV_TLS_CLIENT_CERT_PATH),
            tls_client_key_path: path(ENV_TLS_CLIENT_KEY_PATH),
        }
    }

    /// Checks every required value, in a fixed order, without touching the filesystem.
    pub fn require(&self) -> Result<ConnectionSettings, GatewayError> {
        let msp_id = required(ENV_MSP_ID, self.msp_id.clone())?;
        let crypto_path = required(ENV_CRYPTO_PATH, self.crypto_path.clone())?;
        let peer_endpoint = required(ENV_PEER_ENDPOINT, self.peer_endpoint.clone())?;
        let tls_cert_path = required(ENV_TLS_CERT_PATH, self.tls_cert_path.clone())?;

        let client_tls = match (&self.tls_client_cert_path, &self.tls_client_key_path) {
            (Some(cert), Some(key)) => Some(ClientTlsPaths {
                cert: cert.clone(),
                key: key.clone(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(not_set(ENV_TLS_CLIENT_KEY_PATH)),
            (None, Some(_)) => return Err(not_set(ENV_TLS_CLIENT_CERT_PATH)),
        };

        Ok(ConnectionSettings {
            msp_id,
            crypto_path,
            peer_endpoint,
            tls_cert_path,
            host_alias: self.host_alias.clone(),
            user_msp_dir: self.user_msp_dir.clone(),
            client_tls,
        })
    }
}

fn required<T>(key: &str, value: Option<T>) -> Result<T, GatewayError> {
    value.ok_or_else(|| not_set(key))
}

fn not_set(key: &str) -> GatewayError {
    GatewayError::config(format!("{} not set", key))
}

/// Process-wide settings resolved at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub target: ContractTarget,
    pub peer: PeerSettings,
    pub port: u16,
    pub raw_preview_limit: usize,
}

impl GatewayConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let channel = required(ENV_CHANNEL, get(ENV_CHANNEL))?;
        let chaincode = required(ENV_CHAINCODE, get(ENV_CHAINCODE))?;

        let port = match get(ENV_PORT) {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|e| GatewayError::config(format!("{} must be a valid port: {}", ENV_PORT, e)))?,
            None => DEFAULT_PORT,
        };

        let raw_preview_limit = match get(ENV_RAW_PREVIEW_LIMIT) {
            Some(v) => v.trim().parse::<usize>().map_err(|e| {
                GatewayError::config(format!("{} must be a valid usize: {}", ENV_RAW_PREVIEW_LIMIT, e))
            })?,
            None => DEFAULT_RAW_PREVIEW_LIMIT,
        };

        Ok(GatewayConfig {
            target: ContractTarget { channel, chaincode },
            peer: PeerSettings::from_lookup(&lookup),
            port,
            raw_preview_limit,
        })
    }
}
