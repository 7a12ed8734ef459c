//! The randomness capability consumed by IV and key generation.
//!
//! Components take `&dyn RandomSource` rather than reaching for a global
//! RNG, so tests can inject deterministic sources and RNG failures stay
//! visible as errors instead of panics.

use rand::RngCore;

use crate::CryptoError;

pub trait RandomSource: Send + Sync {
    /// Fill `buf` with random bytes, or report a (possibly transient)
    /// failure of the underlying source.
    fn fill_random(&self, buf: &mut [u8]) -> Result<(), CryptoError>;
}

/// Operating-system RNG.
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_random(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        let mut rng = rand::rngs::OsRng;
        rng.try_fill_bytes(buf)
            .map_err(|e| CryptoError::Random(e.to_string()))
    }
}

/// Generate a raw LEA key of 128, 192, or 256 bits.
pub fn generate_key(bits: usize, rng: &dyn RandomSource) -> Result<Vec<u8>, CryptoError> {
    if !matches!(bits, 128 | 192 | 256) {
        return Err(CryptoError::BadKeySize(bits));
    }
    let mut key = vec![0u8; bits / 8];
    rng.fill_random(&mut key)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_sizes() {
        for bits in [128usize, 192, 256] {
            let key = generate_key(bits, &OsRandom).unwrap();
            assert_eq!(key.len(), bits / 8);
        }
    }

    #[test]
    fn rejects_odd_sizes() {
        assert!(matches!(generate_key(100, &OsRandom), Err(CryptoError::BadKeySize(100))));
        assert!(matches!(generate_key(512, &OsRandom), Err(CryptoError::BadKeySize(512))));
    }

    #[test]
    fn keys_are_not_constant() {
        let a = generate_key(256, &OsRandom).unwrap();
        let b = generate_key(256, &OsRandom).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn failures_surface_as_errors() {
        struct Broken;
        impl RandomSource for Broken {
            fn fill_random(&self, _buf: &mut [u8]) -> Result<(), CryptoError> {
                Err(CryptoError::Random("entropy pool unavailable".into()))
            }
        }
        assert!(matches!(generate_key(128, &Broken), Err(CryptoError::Random(_))));
    }
}
