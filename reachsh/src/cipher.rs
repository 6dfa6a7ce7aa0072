//! Symmetric obfuscation of stored secrets.
//!
//! Passwords kept in configuration files or passed as `$CT=` response values
//! are AES-256-CBC encrypted with a key derived from a passphrase. This is
//! obfuscation against casual disclosure, not a secret store.
//!
//! Wire format: `base64(iv || ciphertext)`, 16-byte random IV, PKCS#7 padding,
//! key = SHA-256(passphrase).

use std::fs;
use std::path::Path;

use aes::Aes256;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::CipherError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const IV_LEN: usize = 16;

/// Built-in passphrase used when no key file is configured.
pub const DEFAULT_PASSPHRASE: &str = "#$a%9_(1fsa!@WxfjZU<><!@#$W^_;-!";

/// Prefix marking an encrypted value inside a response string.
pub const CIPHER_TEXT_MARKER: &str = "$CT=";

/// Placeholder shown instead of decrypted secrets.
pub const MASK: &str = "**********";

/// Passphrase-derived AES-256 key.
///
/// Immutable after construction; share it between sessions behind an `Arc`.
#[derive(Clone)]
pub struct Cipher {
    key: [u8; 32],
}

impl Cipher {
    /// Derive a cipher from a passphrase.
    pub fn new(passphrase: &str) -> Self {
        Self {
            key: Sha256::digest(passphrase.as_bytes()).into(),
        }
    }

    /// Load the passphrase from the first non-blank line of a file.
    pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self, CipherError> {
        let contents = fs::read_to_string(path)?;
        let passphrase = contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or(CipherError::EmptyKeyFile)?;
        Ok(Self::new(passphrase))
    }

    /// Encrypt text into the base64 wire format.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);
        STANDARD.encode(blob)
    }

    /// Decrypt text produced by [`encrypt`](Self::encrypt) with the same passphrase.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let blob = STANDARD.decode(encoded.trim())?;
        if blob.len() <= IV_LEN || (blob.len() - IV_LEN) % IV_LEN != 0 {
            return Err(CipherError::Decrypt);
        }

        let (iv, ciphertext) = blob.split_at(IV_LEN);
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CipherError::Decrypt)?;

        let plain = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::Decrypt)?;

        Ok(String::from_utf8(plain)?)
    }
}

impl Default for Cipher {
    fn default() -> Self {
        Self::new(DEFAULT_PASSPHRASE)
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").field("key", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cipher = Cipher::new("correct horse");
        let encrypted = cipher.encrypt("mypass3");
        assert_ne!(encrypted, "mypass3");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "mypass3");
    }

    #[test]
    fn test_random_iv() {
        let cipher = Cipher::default();
        assert_ne!(cipher.encrypt("same"), cipher.encrypt("same"));
    }

    #[test]
    fn test_wrong_key_does_not_reproduce() {
        let encrypted = Cipher::new("one").encrypt("secret value");
        match Cipher::new("two").decrypt(&encrypted) {
            Ok(text) => assert_ne!(text, "secret value"),
            Err(_) => {}
        }
    }

    #[test]
    fn test_garbage_rejected() {
        let cipher = Cipher::default();
        assert!(matches!(cipher.decrypt("not base64!"), Err(CipherError::Encoding(_))));
        assert!(matches!(cipher.decrypt("c2hvcnQ="), Err(CipherError::Decrypt)));
    }

    #[test]
    fn test_key_file_first_non_blank_line() {
        let path = std::env::temp_dir().join(format!("reachsh-key-{}", std::process::id()));
        fs::write(&path, "\n   \n  file passphrase  \nignored\n").unwrap();

        let from_file = Cipher::from_key_file(&path).unwrap();
        let direct = Cipher::new("file passphrase");
        let encrypted = direct.encrypt("abc");
        assert_eq!(from_file.decrypt(&encrypted).unwrap(), "abc");

        fs::write(&path, "\n\n").unwrap();
        assert!(matches!(
            Cipher::from_key_file(&path),
            Err(CipherError::EmptyKeyFile)
        ));
        fs::remove_file(&path).unwrap();
    }
}
