//! Propagating cipher-block chaining over any 16-byte block primitive.
//!
//! Each block is whitened with both the previous plaintext and the previous
//! ciphertext block (the IV seeds both chains), so a single flipped
//! ciphertext bit corrupts that block and every block after it on
//! decryption.
//!
//! `LeaPcbc` is the whole-message layer used by the container format:
//! encryption output is `IV ‖ C` with a fresh random IV, decryption reads
//! the IV back from the first 16 bytes.

use crate::block::BlockCipher;
use crate::lea::Lea;
use crate::padding::{self, Recovered};
use crate::random::RandomSource;
use crate::{CryptoError, BLOCK_SIZE, IV_SIZE};

/// PCBC mode over a borrowed block cipher with a fixed IV.
pub struct Pcbc<'a> {
    cipher: &'a dyn BlockCipher,
    block_size: usize,
    iv: Vec<u8>,
}

impl<'a> Pcbc<'a> {
    /// The IV length must equal the cipher's block size.
    pub fn new(cipher: &'a dyn BlockCipher, iv: &[u8]) -> Result<Self, CryptoError> {
        let block_size = cipher.block_size();
        if iv.len() != block_size {
            return Err(CryptoError::BadIvLength {
                expected: block_size,
                got: iv.len(),
            });
        }
        Ok(Pcbc {
            cipher,
            block_size,
            iv: iv.to_vec(),
        })
    }

    /// Encrypt an aligned stream of blocks. The caller pads.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if plaintext.len() % self.block_size != 0 {
            return Err(CryptoError::NotBlockAligned(plaintext.len()));
        }

        let mut out = vec![0u8; plaintext.len()];
        let mut prev_plain = self.iv.clone();
        let mut prev_cipher = self.iv.clone();
        let mut whitened = vec![0u8; self.block_size];

        for (i, block) in plaintext.chunks_exact(self.block_size).enumerate() {
            for j in 0..self.block_size {
                whitened[j] = block[j] ^ prev_plain[j] ^ prev_cipher[j];
            }
            let start = i * self.block_size;
            self.cipher
                .encrypt_block(&mut out[start..start + self.block_size], &whitened)?;
            prev_plain.copy_from_slice(block);
            prev_cipher.copy_from_slice(&out[start..start + self.block_size]);
        }
        Ok(out)
    }

    /// Decrypt an aligned stream of blocks. The caller unpads.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() % self.block_size != 0 {
            return Err(CryptoError::NotBlockAligned(ciphertext.len()));
        }

        let mut out = vec![0u8; ciphertext.len()];
        let mut prev_plain = self.iv.clone();
        let mut prev_cipher = self.iv.clone();
        let mut decrypted = vec![0u8; self.block_size];

        for (i, block) in ciphertext.chunks_exact(self.block_size).enumerate() {
            self.cipher.decrypt_block(&mut decrypted, block)?;
            let start = i * self.block_size;
            for j in 0..self.block_size {
                out[start + j] = decrypted[j] ^ prev_plain[j] ^ prev_cipher[j];
            }
            prev_plain.copy_from_slice(&out[start..start + self.block_size]);
            prev_cipher.copy_from_slice(block);
        }
        Ok(out)
    }
}

/// Whole-message LEA-PCBC.
///
/// Every instance draws its own IV; reusing an instance for a second
/// message would reuse the IV, which breaks the mode's guarantees. Build a
/// fresh one per encryption.
pub struct LeaPcbc {
    lea: Lea,
    iv: [u8; IV_SIZE],
}

impl LeaPcbc {
    /// Build an encryptor with a fresh random IV.
    pub fn new(key: &[u8], rng: &dyn RandomSource) -> Result<Self, CryptoError> {
        let lea = Lea::new(key)?;
        let mut iv = [0u8; IV_SIZE];
        rng.fill_random(&mut iv)?;
        Ok(LeaPcbc { lea, iv })
    }

    /// Build an encryptor with a caller-supplied IV. Intended for
    /// regression tests; normal encryption goes through [`LeaPcbc::new`].
    pub fn with_iv(key: &[u8], iv: [u8; IV_SIZE]) -> Result<Self, CryptoError> {
        Ok(LeaPcbc {
            lea: Lea::new(key)?,
            iv,
        })
    }

    /// The IV this instance will prepend to its ciphertext.
    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    /// Pad, chain, and prepend the IV: output is `IV ‖ C`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let padded = padding::pad(plaintext, BLOCK_SIZE);
        let mut out = Vec::with_capacity(IV_SIZE + padded.len());
        out.extend_from_slice(&self.iv);
        let pcbc = Pcbc::new(&self.lea, &self.iv)?;
        out.extend_from_slice(&pcbc.encrypt(&padded)?);
        Ok(out)
    }

    /// Decrypt `IV ‖ C` produced by [`LeaPcbc::encrypt`].
    ///
    /// The IV is read from the ciphertext itself; any copy stored alongside
    /// (container metadata) is informational only.
    pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Recovered, CryptoError> {
        if ciphertext.len() < IV_SIZE {
            return Err(CryptoError::CiphertextTooShort(IV_SIZE));
        }
        let lea = Lea::new(key)?;
        let (iv, body) = ciphertext.split_at(IV_SIZE);
        let pcbc = Pcbc::new(&lea, iv)?;
        let plaintext = pcbc.decrypt(body)?;
        Ok(padding::unpad(plaintext, BLOCK_SIZE))
    }
}
