//! Cryptographic helpers for the sign-in flow.
//!
//! Two concerns live here: PKCE material for the OAuth redirect (RFC 7636,
//! S256 method) and AES-256-GCM sealing of the session tokens kept on disk.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::types::errors::CryptoError;

/// AES-256-GCM key length in bytes.
const KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce/IV length in bytes.
const NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
const TAG_LENGTH: usize = 16;

/// Random bytes behind a PKCE verifier; 32 bytes encode to 43 characters.
const PKCE_VERIFIER_BYTES: usize = 32;

/// Ciphertext with the IV and tag needed to open it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedData {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
}

/// A PKCE verifier and its S256 challenge.
pub struct PkcePair {
    pub verifier: Zeroizing<String>,
    pub challenge: String,
}

/// A nonce sequence that yields exactly one nonce.
struct SingleNonce {
    nonce: Option<[u8; NONCE_LENGTH]>,
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        self.nonce
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

/// Cryptographic services using the `ring` crate.
pub struct CryptoService {
    rng: SystemRandom,
}

impl Default for CryptoService {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoService {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    pub fn random_bytes(&self, length: usize) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = vec![0u8; length];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| CryptoError::RandomGeneration("System RNG unavailable".to_string()))?;
        Ok(bytes)
    }

    /// Generates a fresh PKCE verifier and its S256 challenge.
    pub fn pkce_pair(&self) -> Result<PkcePair, CryptoError> {
        let raw = Zeroizing::new(self.random_bytes(PKCE_VERIFIER_BYTES)?);
        let verifier = Zeroizing::new(URL_SAFE_NO_PAD.encode(raw.as_slice()));
        let challenge = pkce_challenge(&verifier);
        Ok(PkcePair { verifier, challenge })
    }

    /// Encrypts `plaintext` with AES-256-GCM under a fresh random IV.
    pub fn seal(&self, plaintext: &[u8], key: &[u8]) -> Result<SealedData, CryptoError> {
        check_key(key)?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::RandomGeneration("Failed to generate nonce".to_string()))?;

        let unbound_key = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| CryptoError::Encryption("Failed to create encryption key".to_string()))?;
        let mut sealing_key = aead::SealingKey::new(
            unbound_key,
            SingleNonce {
                nonce: Some(nonce_bytes),
            },
        );

        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Encryption("Encryption operation failed".to_string()))?;

        // ring appends the tag to the ciphertext.
        let auth_tag = in_out.split_off(in_out.len() - TAG_LENGTH);
        Ok(SealedData {
            ciphertext: in_out,
            iv: nonce_bytes.to_vec(),
            auth_tag,
        })
    }

    /// Decrypts data produced by [`CryptoService::seal`].
    pub fn open(&self, sealed: &SealedData, key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        check_key(key)?;

        let nonce_bytes: [u8; NONCE_LENGTH] = sealed.iv.as_slice().try_into().map_err(|_| {
            CryptoError::Decryption(format!(
                "IV must be {} bytes, got {}",
                NONCE_LENGTH,
                sealed.iv.len()
            ))
        })?;

        if sealed.auth_tag.len() != TAG_LENGTH {
            return Err(CryptoError::Decryption(format!(
                "Auth tag must be {} bytes, got {}",
                TAG_LENGTH,
                sealed.auth_tag.len()
            )));
        }

        let unbound_key = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| CryptoError::Decryption("Failed to create decryption key".to_string()))?;
        let mut opening_key = aead::OpeningKey::new(
            unbound_key,
            SingleNonce {
                nonce: Some(nonce_bytes),
            },
        );

        let mut in_out = Zeroizing::new(Vec::with_capacity(sealed.ciphertext.len() + TAG_LENGTH));
        in_out.extend_from_slice(&sealed.ciphertext);
        in_out.extend_from_slice(&sealed.auth_tag);

        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| {
                CryptoError::Decryption("invalid key or corrupted data".to_string())
            })?;
        Ok(Zeroizing::new(plaintext.to_vec()))
    }
}

/// S256 challenge for a PKCE verifier: base64url(SHA-256(verifier)), unpadded.
pub fn pkce_challenge(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

fn check_key(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != KEY_LENGTH {
        return Err(CryptoError::InvalidKey(format!(
            "Key must be {} bytes, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(())
}
