//! Loads the operator's signing credential from an MSP-style credential store.

use crate::domain::error::GatewayError;
use crate::infra::config::ConnectionSettings;
use crate::infra::fabric::proto::SerializedIdentity;
use p256::pkcs8::DecodePrivateKey;
use p256::SecretKey;
use prost::Message;
use std::fmt;
use std::path::{Path, PathBuf};

/// Private key material parsed from the keystore. Not printable.
#[derive(Clone)]
pub struct PrivateKeyHandle(SecretKey);

impl PrivateKeyHandle {
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`, what Fabric CAs emit) or SEC1 (`BEGIN EC PRIVATE KEY`).
    pub fn from_pem(pem: &str) -> Result<Self, String> {
        match SecretKey::from_pkcs8_pem(pem) {
            Ok(key) => Ok(PrivateKeyHandle(key)),
            Err(pkcs8_err) => SecretKey::from_sec1_pem(pem)
                .map(PrivateKeyHandle)
                .map_err(|_| pkcs8_err.to_string()),
        }
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyHandle(..)")
    }
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub msp_id: String,
    pub certificate: Vec<u8>,
    pub private_key: PrivateKeyHandle,
}

impl Identity {
    /// The `creator` bytes placed in every signature header.
    pub fn serialize(&self) -> Vec<u8> {
        SerializedIdentity {
            mspid: self.msp_id.clone(),
            id_bytes: self.certificate.clone(),
        }
        .encode_to_vec()
    }
}

/// Reads the certificate from `signcerts/` and the key from `keystore/` under the configured
/// user MSP directory.
///
/// Certificate/key correspondence is not checked here; a mismatch surfaces when the peer
/// rejects the first signed proposal.
pub async fn load_identity(settings: &ConnectionSettings) -> Result<Identity, GatewayError> {
    let (cert_path, certificate) = read_first_file(&settings.signcerts_dir()).await?;
    let (key_path, key_bytes) = read_first_file(&settings.keystore_dir()).await?;

    let key_pem = String::from_utf8(key_bytes).map_err(|_| {
        GatewayError::config(format!("private key {} is not PEM text", key_path.display()))
    })?;
    let private_key = PrivateKeyHandle::from_pem(&key_pem).map_err(|e| {
        GatewayError::config(format!("invalid private key {}: {}", key_path.display(), e))
    })?;

    tracing::debug!(
        msp_id = %settings.msp_id,
        certificate = %cert_path.display(),
        "loaded signing identity"
    );

    Ok(Identity {
        msp_id: settings.msp_id.clone(),
        certificate,
        private_key,
    })
}

/// Reads the first non-hidden regular file (by name) in `dir`.
async fn read_first_file(dir: &Path) -> Result<(PathBuf, Vec<u8>), GatewayError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        GatewayError::config(format!("cannot read credential directory {}: {}", dir.display(), e))
    })?;

    let mut candidates: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        GatewayError::config(format!("cannot read credential directory {}: {}", dir.display(), e))
    })? {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        // Follows symlinks (mounted secrets are usually links).
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => candidates.push(entry.path()),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    entry = %entry.path().display(),
                    error = %e,
                    "skipping unreadable credential entry"
                );
            }
        }
    }
    candidates.sort();

    let path = match candidates.first() {
        Some(p) => p.clone(),
        None => {
            return Err(GatewayError::config(format!("no files in {}", dir.display())));
        }
    };
    if candidates.len() > 1 {
        tracing::warn!(
            dir = %dir.display(),
            count = candidates.len(),
            using = %path.display(),
            "credential directory holds more than one file"
        );
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| GatewayError::config(format!("cannot read {}: {}", path.display(), e)))?;
    Ok((path, bytes))
}
