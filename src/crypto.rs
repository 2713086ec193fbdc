//! Fingerprinting, phone-at-rest encryption, and password hashing.
//!
//! - `fingerprint` is a plain SHA-256 hex digest. It is the lookup key for
//!   dedup, so it must be identical across processes: no per-instance salt.
//! - `encrypt`/`decrypt` use AES-256-GCM. Ciphertext is
//!   `base64(nonce || ciphertext || tag)` with a fresh 96-bit nonce per call.
//! - Passwords are `fingerprint(password + salt)`, compared in constant time.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// SHA-256 of the UTF-8 bytes, lowercase hex.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Recompute `fingerprint(candidate + salt)` and compare without early exit.
pub fn verify_password(candidate: &str, salt: &str, expected_hash: &str) -> bool {
    let computed = fingerprint(&format!("{candidate}{salt}"));
    computed.as_bytes().ct_eq(expected_hash.as_bytes()).into()
}

/// Fresh salt + hash for a new or changed password.
pub fn hash_password(password: &str) -> (String, String) {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let hash = fingerprint(&format!("{password}{salt}"));
    (salt, hash)
}

/// Holds the process key for reversible phone encryption.
pub struct CryptoService {
    cipher: Aes256Gcm,
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for CryptoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoService").finish_non_exhaustive()
    }
}

impl CryptoService {
    /// Generate a key that lives only as long as this process.
    pub fn ephemeral() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(key.as_slice());
        Self::from_key(bytes)
    }

    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        let cipher = Aes256Gcm::new(&key.into());
        Self { cipher, key }
    }

    /// Load a persisted key (standard base64, 32 bytes decoded).
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let raw = BASE64
            .decode(encoded.trim().as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let key: [u8; KEY_LEN] = raw.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", raw.len()))
        })?;
        Ok(Self::from_key(key))
    }

    /// Export the key so the caller can persist it alongside the database.
    pub fn export_key_base64(&self) -> String {
        BASE64.encode(self.key)
    }

    pub fn fingerprint(&self, text: &str) -> String {
        fingerprint(text)
    }

    pub fn encrypt(&self, text: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, text.as_bytes())
            .map_err(|_| CryptoError::Encryption)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(nonce.as_slice());
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let combined = BASE64
            .decode(encoded.as_bytes())
            .map_err(|_| CryptoError::Decryption)?;
        if combined.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decryption);
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decryption)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_sha256_hex() {
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fingerprint("15551234567"), fingerprint("15551234567"));
        assert_ne!(fingerprint("15551234567"), fingerprint("15551234568"));
    }

    #[test]
    fn test_round_trip_exact() {
        let crypto = CryptoService::ephemeral();
        for text in ["15551234567", "", "電話 +86 (10) 1234", "🙂 emoji"] {
            let sealed = crypto.encrypt(text).expect("encrypt");
            assert_eq!(crypto.decrypt(&sealed).expect("decrypt"), text);
        }
    }

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let crypto = CryptoService::ephemeral();
        let a = crypto.encrypt("15551234567").unwrap();
        let b = crypto.encrypt("15551234567").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_byte_fails() {
        let crypto = CryptoService::ephemeral();
        let sealed = crypto.encrypt("15551234567").unwrap();
        let mut raw = BASE64.decode(&sealed).unwrap();
        for i in [0, NONCE_LEN, raw.len() - 1] {
            raw[i] ^= 0x01;
            let tampered = BASE64.encode(&raw);
            assert_eq!(crypto.decrypt(&tampered), Err(CryptoError::Decryption));
            raw[i] ^= 0x01;
        }
    }

    #[test]
    fn test_wrong_key_and_garbage_fail() {
        let a = CryptoService::ephemeral();
        let b = CryptoService::ephemeral();
        let sealed = a.encrypt("15551234567").unwrap();
        assert_eq!(b.decrypt(&sealed), Err(CryptoError::Decryption));
        assert_eq!(a.decrypt("not base64!"), Err(CryptoError::Decryption));
        assert_eq!(a.decrypt(&BASE64.encode([0u8; 8])), Err(CryptoError::Decryption));
    }

    #[test]
    fn test_exported_key_reloads() {
        let a = CryptoService::ephemeral();
        let sealed = a.encrypt("5551234").unwrap();
        let b = CryptoService::from_base64_key(&a.export_key_base64()).expect("reload");
        assert_eq!(b.decrypt(&sealed).unwrap(), "5551234");
    }

    #[test]
    fn test_bad_key_rejected() {
        assert!(matches!(
            CryptoService::from_base64_key(&BASE64.encode([1u8; 16])),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            CryptoService::from_base64_key("%%%"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_password_hash_and_verify() {
        let (salt, hash) = hash_password("123456");
        assert!(verify_password("123456", &salt, &hash));
        assert!(!verify_password("1234567", &salt, &hash));
        assert!(!verify_password("123456", "other-salt", &hash));
        assert!(!verify_password("123456", &salt, ""));

        let (salt2, _) = hash_password("123456");
        assert_ne!(salt, salt2, "salt must be fresh per call");
    }

    #[test]
    fn test_verify_matches_plain_fingerprint_scheme() {
        let hash = fingerprint("123456s1");
        assert!(verify_password("123456", "s1", &hash));
    }
}
