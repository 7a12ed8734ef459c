//! PKCS#7 padding with the format's lenient removal rule.
//!
//! Padding is always added: a message that is already block-aligned gains a
//! full block of value `block_size`. Removal is deliberately forgiving — if
//! the trailing bytes do not form valid padding, the data is returned
//! unchanged instead of erroring. Existing containers depend on this, so
//! the behavior is preserved bit for bit; callers get a `suspect_padding`
//! flag so corruption is at least observable.

/// Result of a padded decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub plaintext: Vec<u8>,
    /// Set when the trailing bytes did not look like valid padding and were
    /// left in place.
    pub suspect_padding: bool,
}

/// Append PKCS#7 padding. The result length is the next multiple of
/// `block_size` strictly greater than `data.len()`.
pub fn pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad_len = block_size - data.len() % block_size;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Strip PKCS#7 padding, leniently.
///
/// A final byte of 0, a value above `block_size`, a value longer than the
/// data, or mismatched pad bytes all leave the input untouched with
/// `suspect_padding` set.
pub fn unpad(mut data: Vec<u8>, block_size: usize) -> Recovered {
    if data.is_empty() {
        return Recovered {
            plaintext: data,
            suspect_padding: false,
        };
    }

    let pad_len = data[data.len() - 1] as usize;
    if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
        return Recovered {
            plaintext: data,
            suspect_padding: true,
        };
    }

    let body_len = data.len() - pad_len;
    if data[body_len..].iter().any(|&b| b as usize != pad_len) {
        return Recovered {
            plaintext: data,
            suspect_padding: true,
        };
    }

    data.truncate(body_len);
    Recovered {
        plaintext: data,
        suspect_padding: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_next_block() {
        assert_eq!(pad(b"", 16).len(), 16);
        assert_eq!(pad(b"abc", 16).len(), 16);
        assert_eq!(pad(&[0u8; 15], 16).len(), 16);
        assert_eq!(pad(&[0u8; 16], 16).len(), 32);

        let padded = pad(b"abc", 16);
        assert_eq!(&padded[..3], b"abc");
        assert!(padded[3..].iter().all(|&b| b == 13));
    }

    #[test]
    fn aligned_input_gets_full_block() {
        let padded = pad(&[7u8; 16], 16);
        assert_eq!(padded.len(), 32);
        assert!(padded[16..].iter().all(|&b| b == 16));
    }

    #[test]
    fn roundtrip() {
        for len in 0..48 {
            let data: Vec<u8> = (0..len as u8).collect();
            let recovered = unpad(pad(&data, 16), 16);
            assert!(!recovered.suspect_padding);
            assert_eq!(recovered.plaintext, data);
        }
    }

    #[test]
    fn empty_is_not_suspect() {
        let recovered = unpad(Vec::new(), 16);
        assert!(!recovered.suspect_padding);
        assert!(recovered.plaintext.is_empty());
    }

    #[test]
    fn invalid_padding_left_intact() {
        // Final byte zero.
        let data = vec![1u8, 2, 3, 0];
        let recovered = unpad(data.clone(), 16);
        assert!(recovered.suspect_padding);
        assert_eq!(recovered.plaintext, data);

        // Final byte above block size.
        let data = vec![0xffu8; 16];
        let recovered = unpad(data.clone(), 16);
        assert!(recovered.suspect_padding);
        assert_eq!(recovered.plaintext, data);

        // Pad value larger than the data itself.
        let data = vec![9u8, 9, 9];
        let recovered = unpad(data.clone(), 16);
        assert!(recovered.suspect_padding);
        assert_eq!(recovered.plaintext, data);

        // Mismatched pad bytes.
        let mut data = pad(b"hello", 16);
        let n = data.len();
        data[n - 2] ^= 1;
        let recovered = unpad(data.clone(), 16);
        assert!(recovered.suspect_padding);
        assert_eq!(recovered.plaintext, data);
    }

    #[test]
    fn data_that_happens_to_end_in_valid_padding_is_stripped() {
        // The lenient rule cannot distinguish this case; it is inherent to
        // unauthenticated PKCS#7 and preserved for compatibility.
        let data = vec![1u8, 2, 2];
        let recovered = unpad(data, 16);
        assert!(!recovered.suspect_padding);
        assert_eq!(recovered.plaintext, vec![1u8]);
    }
}
