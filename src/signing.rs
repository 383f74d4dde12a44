//! Signing and signature-verification collaborators (spec §6).
//!
//! Spec requires a 33-byte compressed public key and a 64-byte
//! signature on the wire, and treats the concrete signing scheme as an
//! out-of-scope external collaborator — the core only depends on the
//! `SignatureVerifier`/`BlockSigner` traits below. `Secp256k1Signer` is
//! the default concrete implementation, generalizing the teacher's
//! `Dilithium3Keypair` (same save/load-with-0600-permissions API,
//! `ZeroizeOnDrop` secret) onto a curve whose key/signature sizes
//! actually fit the wire format.

use std::fs::{self, OpenOptions};
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::io::Write as _;
use std::path::Path;

use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ArgumentError;
use crate::primitives::{PublicKey, Signature};

/// Verifies a signature over a 32-byte hash under an explicit public
/// key. Spec §6: `SignatureVerifier.verify(hash, sig, pubkey) -> bool`.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, hash: &Hash32Bytes, sig: &Signature, pubkey: &PublicKey) -> bool;
}

/// Signs a 32-byte hash under the signer's own key. Spec §6:
/// `BlockSigner.sign(hash) -> Signature`, `public_key() -> [u8;33]`.
pub trait BlockSigner: Send + Sync {
    fn sign(&self, hash: &Hash32Bytes) -> Signature;
    fn public_key(&self) -> PublicKey;
}

/// The message this module signs/verifies is always a 32-byte digest
/// (a block or transaction hash); spelled out as a type alias so the
/// trait signatures above read the same way spec's collaborator
/// contracts do.
pub type Hash32Bytes = [u8; 32];

/// secp256k1 ECDSA keypair: 33-byte compressed public key, 64-byte
/// compact (r||s) signature, low-S normalized.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Secp256k1Keypair {
    #[zeroize(skip)]
    verifying_key: VerifyingKey,
    signing_key: SigningKey,
}

impl Secp256k1Keypair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        Self { verifying_key, signing_key }
    }

    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, ArgumentError> {
        let signing_key = SigningKey::from_slice(secret)
            .map_err(|e| ArgumentError::InvalidArgument(format!("invalid secp256k1 secret key: {e}")))?;
        let verifying_key = *signing_key.verifying_key();
        Ok(Self { verifying_key, signing_key })
    }

    pub fn public_key(&self) -> PublicKey {
        let encoded = self.verifying_key.to_encoded_point(true);
        PublicKey::from_bytes(encoded.as_bytes()).expect("compressed point is always 33 bytes")
    }

    pub fn sign_hash(&self, hash: &Hash32Bytes) -> Signature {
        let sig: EcdsaSignature = self
            .signing_key
            .sign_prehash(hash)
            .expect("signing a fixed-length prehash cannot fail");
        let normalized = sig.normalize_s().unwrap_or(sig);
        Signature::from_bytes(&normalized.to_bytes()).expect("compact signature is always 64 bytes")
    }

    /// Persist the secret scalar as JSON with owner-only permissions
    /// (0600 on Unix), the way the teacher stores its Dilithium wallet.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut secret_bytes = self.signing_key.to_bytes().to_vec();
        let record = StoredKeypair {
            secret_key_hex: hex::encode(&secret_bytes),
        };
        let json = serde_json::to_string_pretty(&record).expect("serialize never fails for this type");
        secret_bytes.zeroize();

        #[cfg(unix)]
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path.as_ref())?;
            file.write_all(json.as_bytes())?;
        }
        #[cfg(not(unix))]
        {
            fs::write(path.as_ref(), json)?;
        }
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArgumentError> {
        #[cfg(unix)]
        {
            let perms = fs::metadata(path.as_ref())
                .map_err(|e| ArgumentError::InvalidArgument(e.to_string()))?
                .permissions();
            if perms.mode() & 0o177 != 0 {
                return Err(ArgumentError::InvalidArgument(
                    "insecure key file permissions: group/other access detected, use chmod 600".into(),
                ));
            }
        }
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ArgumentError::InvalidArgument(e.to_string()))?;
        let record: StoredKeypair =
            serde_json::from_str(&content).map_err(|e| ArgumentError::InvalidArgument(e.to_string()))?;
        let mut secret_bytes =
            hex::decode(&record.secret_key_hex).map_err(|e| ArgumentError::InvalidArgument(e.to_string()))?;
        let kp = Self::from_secret_bytes(&secret_bytes)?;
        secret_bytes.zeroize();
        Ok(kp)
    }

    pub fn load_or_generate<P: AsRef<Path>>(path: P) -> Result<Self, ArgumentError> {
        match Self::load_from_file(path.as_ref()) {
            Ok(kp) => Ok(kp),
            Err(_) => {
                let kp = Self::generate();
                if let Some(parent) = path.as_ref().parent() {
                    let _ = fs::create_dir_all(parent);
                }
                if let Err(e) = kp.save_to_file(path.as_ref()) {
                    log::warn!("failed to persist new signing key to {:?}: {e}", path.as_ref());
                }
                Ok(kp)
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredKeypair {
    secret_key_hex: String,
}

impl BlockSigner for Secp256k1Keypair {
    fn sign(&self, hash: &Hash32Bytes) -> Signature {
        self.sign_hash(hash)
    }
    fn public_key(&self) -> PublicKey {
        Secp256k1Keypair::public_key(self)
    }
}

/// Stateless verifier implementing the `SignatureVerifier` collaborator
/// contract over the same secp256k1 curve.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, hash: &Hash32Bytes, sig: &Signature, pubkey: &PublicKey) -> bool {
        verify_signature(hash, sig, pubkey)
    }
}

/// Free-function form, used in places that don't want to carry a
/// `Secp256k1Verifier` instance around.
pub fn verify_signature(hash: &Hash32Bytes, sig: &Signature, pubkey: &PublicKey) -> bool {
    let verifying_key = match VerifyingKey::from_sec1_bytes(pubkey.as_bytes()) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let ecdsa_sig = match EcdsaSignature::from_slice(sig.as_bytes()) {
        Ok(s) => s,
        Err(_) => return false,
    };
    verifying_key.verify_prehash(hash, &ecdsa_sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let kp = Secp256k1Keypair::generate();
        let hash = [7u8; 32];
        let sig = kp.sign_hash(&hash);
        assert!(verify_signature(&hash, &sig, &kp.public_key()));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let kp = Secp256k1Keypair::generate();
        let other = Secp256k1Keypair::generate();
        let hash = [1u8; 32];
        let sig = kp.sign_hash(&hash);
        assert!(!verify_signature(&hash, &sig, &other.public_key()));
    }

    #[test]
    fn verify_rejects_tampered_hash() {
        let kp = Secp256k1Keypair::generate();
        let hash = [2u8; 32];
        let sig = kp.sign_hash(&hash);
        let mut other_hash = hash;
        other_hash[0] ^= 0xFF;
        assert!(!verify_signature(&other_hash, &sig, &kp.public_key()));
    }

    #[test]
    fn public_key_is_33_bytes_and_stable() {
        let kp = Secp256k1Keypair::generate();
        let pk1 = kp.public_key();
        let pk2 = kp.public_key();
        assert_eq!(pk1.as_bytes().len(), 33);
        assert_eq!(pk1, pk2);
    }

    #[test]
    fn save_and_load_round_trips_key_material() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        let kp = Secp256k1Keypair::generate();
        kp.save_to_file(&path).unwrap();
        let loaded = Secp256k1Keypair::load_from_file(&path).unwrap();
        assert_eq!(kp.public_key(), loaded.public_key());
    }

    #[test]
    fn block_signer_trait_object_works() {
        let kp = Secp256k1Keypair::generate();
        let signer: &dyn BlockSigner = &kp;
        let hash = [3u8; 32];
        let sig = signer.sign(&hash);
        assert!(verify_signature(&hash, &sig, &signer.public_key()));
    }
}
