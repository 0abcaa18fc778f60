//! Authenticated encryption of payload bytes at rest.
//!
//! AES-256 in EAX mode, driven through the streaming (`online`) API so that
//! payloads are processed in fixed-size chunks regardless of their length.
//!
//! On-disk layout: `ciphertext || tag` where the tag is the trailing
//! [`TAG_LEN`] bytes. The nonce is *not* stored with the bytes; it lives in
//! the file's metadata record.
//!
//! Decryption is buffer-then-verify: plaintext accumulates in a private
//! buffer and is only handed out after the tag checks. On a failed check the
//! buffer is zeroed before the error is returned.

use std::fmt;

use aes::Aes256;
use coffer_types::{NONCE_LEN, Nonce};
use eax::aead::generic_array::GenericArray;
use eax::online::{Decrypt, Eax, Encrypt};
use rand::RngCore;

use crate::error::{StorageError, StorageResult};

/// Length of the authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Length of the encryption key, in bytes.
pub const KEY_LEN: usize = 32;

/// Bytes processed per step: 1024 AES blocks.
pub const CHUNK_SIZE: usize = 1024 * 16;

/// Ciphertext (with trailing tag) plus the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: Nonce,
}

/// Streaming AES-256-EAX cipher bound to one key.
#[derive(Clone)]
pub struct StreamCipher {
    key: [u8; KEY_LEN],
}

impl fmt::Debug for StreamCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCipher").field("key", &"<redacted>").finish()
    }
}

impl StreamCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Build a cipher from raw key bytes; the key must be exactly 32 bytes.
    pub fn from_slice(key: &[u8]) -> StorageResult<Self> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
            StorageError::config(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                key.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    /// Build a cipher from a hex-encoded key.
    pub fn from_hex(key_hex: &str) -> StorageResult<Self> {
        let bytes = hex::decode(key_hex.trim())
            .map_err(|e| StorageError::config(format!("encryption key is not valid hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Encrypt an in-memory payload under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Sealed {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut eax = self.encryptor(&nonce);
        let mut ciphertext = Vec::with_capacity(plaintext.len() + TAG_LEN);
        for chunk in plaintext.chunks(CHUNK_SIZE) {
            let start = ciphertext.len();
            ciphertext.extend_from_slice(chunk);
            eax.encrypt(&mut ciphertext[start..]);
        }
        ciphertext.extend_from_slice(eax.finish().as_slice());

        Sealed { ciphertext, nonce }
    }

    /// Decrypt `ciphertext || tag` sealed under `nonce`.
    ///
    /// Fails with [`StorageError::IntegrityVerification`] when the tag does
    /// not match (tampered bytes, wrong nonce, wrong key) or the input is too
    /// short to hold a tag.
    pub fn decrypt(&self, sealed: &[u8], nonce: &Nonce) -> StorageResult<Vec<u8>> {
        if sealed.len() < TAG_LEN {
            return Err(StorageError::mac_check_failed());
        }
        let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut eax = Eax::<Aes256, Decrypt>::with_key_and_nonce(
            GenericArray::from_slice(&self.key),
            GenericArray::from_slice(nonce),
        );
        let mut plaintext = Vec::with_capacity(body.len());
        for chunk in body.chunks(CHUNK_SIZE) {
            let start = plaintext.len();
            plaintext.extend_from_slice(chunk);
            eax.decrypt_unauthenticated_hazmat(&mut plaintext[start..]);
        }

        match eax.finish(GenericArray::from_slice(tag)) {
            Ok(()) => Ok(plaintext),
            Err(_) => {
                plaintext.fill(0);
                Err(StorageError::mac_check_failed())
            }
        }
    }

    fn encryptor(&self, nonce: &Nonce) -> Eax<Aes256, Encrypt> {
        Eax::<Aes256, Encrypt>::with_key_and_nonce(
            GenericArray::from_slice(&self.key),
            GenericArray::from_slice(nonce),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> StreamCipher {
        StreamCipher::new([0x42; KEY_LEN])
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_round_trip_across_chunk_boundaries() {
        let cipher = cipher();
        for len in [0, 1, 15, 16, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE + 7] {
            let data = payload(len);
            let sealed = cipher.encrypt(&data);
            assert_eq!(sealed.ciphertext.len(), len + TAG_LEN, "len {len}");
            assert_eq!(cipher.decrypt(&sealed.ciphertext, &sealed.nonce).unwrap(), data, "len {len}");
        }
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = cipher();
        let a = cipher.encrypt(b"same input");
        let b = cipher.encrypt(b"same input");
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_any_tampered_byte_fails_verification() {
        let cipher = cipher();
        let sealed = cipher.encrypt(b"attack at dawn");
        for i in 0..sealed.ciphertext.len() {
            let mut tampered = sealed.ciphertext.clone();
            tampered[i] ^= 0x01;
            let err = cipher.decrypt(&tampered, &sealed.nonce).unwrap_err();
            assert!(matches!(err, StorageError::IntegrityVerification(_)), "byte {i}");
        }
    }

    #[test]
    fn test_wrong_nonce_or_key_fails_verification() {
        let cipher = cipher();
        let sealed = cipher.encrypt(b"hello");

        let mut nonce = sealed.nonce;
        nonce[0] ^= 0xff;
        let err = cipher.decrypt(&sealed.ciphertext, &nonce).unwrap_err();
        assert_eq!(err.to_string(), "integrity verification failed: MAC check failed");

        let other = StreamCipher::new([0x24; KEY_LEN]);
        assert!(other.decrypt(&sealed.ciphertext, &sealed.nonce).is_err());
    }

    #[test]
    fn test_truncated_input_fails_verification() {
        let cipher = cipher();
        let err = cipher.decrypt(&[0u8; TAG_LEN - 1], &[0; NONCE_LEN]).unwrap_err();
        assert!(matches!(err, StorageError::IntegrityVerification(_)));
    }

    #[test]
    fn test_key_parsing() {
        assert!(StreamCipher::from_hex(&"ab".repeat(KEY_LEN)).is_ok());
        assert!(matches!(
            StreamCipher::from_hex("abcd"),
            Err(StorageError::Config(_))
        ));
        assert!(matches!(
            StreamCipher::from_hex("not hex"),
            Err(StorageError::Config(_))
        ));
        assert!(!format!("{:?}", cipher()).contains("42"));
    }
}
