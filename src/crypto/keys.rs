//! ECDSA signature verification for transaction inputs
//!
//! Signature checking is a capability injected into the validator through
//! the [`SignatureVerifier`] trait. The production implementation verifies
//! ECDSA signatures over the secp256k1 curve (same as Bitcoin).

use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey, VerifyOnly};
use thiserror::Error;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Malformed scriptSig: {0}")]
    MalformedScriptSig(&'static str),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Verifies one input's authorization
///
/// `signature` and `public_key` are the raw payloads carried by the input;
/// `message_digest` is the 32-byte digest the signature commits to.
pub trait SignatureVerifier {
    fn verify(&self, signature: &[u8], message_digest: &[u8; 32], public_key: &[u8]) -> bool;
}

impl<V: SignatureVerifier + ?Sized> SignatureVerifier for &V {
    fn verify(&self, signature: &[u8], message_digest: &[u8; 32], public_key: &[u8]) -> bool {
        (**self).verify(signature, message_digest, public_key)
    }
}

impl<V: SignatureVerifier + ?Sized> SignatureVerifier for Box<V> {
    fn verify(&self, signature: &[u8], message_digest: &[u8; 32], public_key: &[u8]) -> bool {
        (**self).verify(signature, message_digest, public_key)
    }
}

/// secp256k1 ECDSA verifier
///
/// Signatures are DER encoded with a trailing sighash-type byte, public
/// keys are SEC1 (compressed or uncompressed).
pub struct Secp256k1Verifier {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Verifier {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }

    fn try_verify(
        &self,
        signature: &[u8],
        message_digest: &[u8; 32],
        public_key: &[u8],
    ) -> Result<bool, KeyError> {
        let public_key =
            PublicKey::from_slice(public_key).map_err(|_| KeyError::InvalidPublicKey)?;

        // Strip the sighash-type byte
        let der = match signature.split_last() {
            Some((_, der)) if !der.is_empty() => der,
            _ => return Err(KeyError::InvalidSignature),
        };
        let sig = Signature::from_der(der).map_err(|_| KeyError::InvalidSignature)?;
        let message = Message::from_digest_slice(message_digest)?;

        Ok(self.secp.verify_ecdsa(&message, &sig, &public_key).is_ok())
    }
}

impl Default for Secp256k1Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, signature: &[u8], message_digest: &[u8; 32], public_key: &[u8]) -> bool {
        match self.try_verify(signature, message_digest, public_key) {
            Ok(valid) => valid,
            Err(e) => {
                log::debug!("Signature rejected: {}", e);
                false
            }
        }
    }
}

/// Verifier that accepts every signature
///
/// For pools whose signatures were already checked upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustingVerifier;

impl SignatureVerifier for TrustingVerifier {
    fn verify(&self, _signature: &[u8], _message_digest: &[u8; 32], _public_key: &[u8]) -> bool {
        true
    }
}

/// Split a pay-to-pubkey-hash style scriptSig into `(signature, public_key)`
///
/// The script must be exactly two pushes: `<len><sig><len><pubkey>`.
pub fn parse_p2pkh_script_sig(script_sig: &[u8]) -> Result<(&[u8], &[u8]), KeyError> {
    let (signature, rest) = read_push(script_sig)?;
    let (public_key, rest) = read_push(rest)?;
    if !rest.is_empty() {
        return Err(KeyError::MalformedScriptSig("trailing bytes after public key"));
    }
    Ok((signature, public_key))
}

fn read_push(script: &[u8]) -> Result<(&[u8], &[u8]), KeyError> {
    let (&len, rest) = script
        .split_first()
        .ok_or(KeyError::MalformedScriptSig("missing push"))?;
    let len = len as usize;
    if len == 0 || rest.len() < len {
        return Err(KeyError::MalformedScriptSig("push exceeds script"));
    }
    Ok(rest.split_at(len))
}

/// Build a two-push scriptSig from a signature and public key
pub fn p2pkh_script_sig(signature: &[u8], public_key: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + signature.len() + public_key.len());
    script.push(signature.len() as u8);
    script.extend_from_slice(signature);
    script.push(public_key.len() as u8);
    script.extend_from_slice(public_key);
    script
}

/// A key pair for producing input signatures
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Compressed SEC1 public key
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    /// Sign a 32-byte digest, returning DER bytes followed by SIGHASH_ALL
    pub fn sign(&self, message_digest: &[u8; 32]) -> Result<Vec<u8>, KeyError> {
        let secp: Secp256k1<All> = Secp256k1::new();
        let message = Message::from_digest_slice(message_digest)?;
        let mut signature = secp
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_der()
            .to_vec();
        signature.push(0x01);
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let digest = sha256(b"Hello, blockchain!");

        let signature = kp.sign(&digest).unwrap();
        let verifier = Secp256k1Verifier::new();

        assert!(verifier.verify(&signature, &digest, &kp.public_key_bytes()));
    }

    #[test]
    fn test_verify_wrong_digest() {
        let kp = KeyPair::generate();
        let signature = kp.sign(&sha256(b"one")).unwrap();

        let verifier = Secp256k1Verifier::new();
        assert!(!verifier.verify(&signature, &sha256(b"two"), &kp.public_key_bytes()));
    }

    #[test]
    fn test_verify_wrong_key() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let digest = sha256(b"msg");
        let signature = kp.sign(&digest).unwrap();

        let verifier = Secp256k1Verifier::new();
        assert!(!verifier.verify(&signature, &digest, &other.public_key_bytes()));
    }

    #[test]
    fn test_verify_garbage_is_false() {
        let verifier = Secp256k1Verifier::new();
        let digest = sha256(b"msg");

        assert!(!verifier.verify(&[], &digest, &[0x02; 33]));
        assert!(!verifier.verify(&[0x30, 0x01], &digest, &[0x02; 33]));
        assert!(!verifier.verify(&[0x30, 0x01, 0x01], &digest, &[]));
    }

    #[test]
    fn test_trusting_verifier() {
        assert!(TrustingVerifier.verify(&[], &[0u8; 32], &[]));
    }

    #[test]
    fn test_script_sig_round_trip() {
        let script = p2pkh_script_sig(&[0xaa; 71], &[0x02; 33]);
        let (sig, key) = parse_p2pkh_script_sig(&script).unwrap();

        assert_eq!(sig, &[0xaa; 71][..]);
        assert_eq!(key, &[0x02; 33][..]);
    }

    #[test]
    fn test_script_sig_malformed() {
        assert!(parse_p2pkh_script_sig(&[]).is_err());
        assert!(parse_p2pkh_script_sig(&[0x05, 0x01]).is_err());
        assert!(parse_p2pkh_script_sig(&[0x01, 0xaa]).is_err());

        let mut script = p2pkh_script_sig(&[0xaa], &[0xbb]);
        script.push(0x00);
        assert!(parse_p2pkh_script_sig(&script).is_err());
    }
}
