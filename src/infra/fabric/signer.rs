use crate::infra::fabric::identity::PrivateKeyHandle;
use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, SigningKey};

/// ECDSA P-256 / SHA-256 signer producing DER signatures with low-S, as Fabric peers require.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
}

impl Signer {
    pub fn new(private_key: &PrivateKeyHandle) -> Self {
        Signer {
            key: SigningKey::from(private_key.secret()),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.key.sign(message);
        let signature = signature.normalize_s().unwrap_or(signature);
        signature.to_der().as_bytes().to_vec()
    }
}
