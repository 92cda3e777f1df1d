use md5::{Digest, Md5};

/// Integrity checksum for a serialized value: MD5 digest, ASCII85-encoded.
///
/// This is a checksum, not a security guarantee (spec.md §3) — it exists so
/// a peer holding a mirrored copy can tell, without re-fetching, whether its
/// copy still matches what was last broadcast. The original implementation
/// (`hashlib.md5(...).digest()` then `base64.a85encode(..., foldspaces=True)`)
/// hashes the pickled value; this rendition hashes the value's `rmp_serde`
/// encoding instead — same two-stage shape, different wire format.
pub fn crc_of(value_bytes: &[u8]) -> String {
    let digest = Md5::digest(value_bytes);
    ascii85_encode(&digest)
}

const ASCII85_OFFSET: u8 = 33; // '!'

/// Minimal ASCII85 (btoa/Adobe-style) encoder. No `z`/`y` run-length
/// shortcuts, no line wrapping — this CRC is always exactly 16 input bytes
/// (an MD5 digest), so the shortcuts the format offers for long runs of
/// zeroes or spaces don't matter here.
fn ascii85_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(4) * 5);
    for chunk in bytes.chunks(4) {
        let mut buf = [0u8; 4];
        buf[..chunk.len()].copy_from_slice(chunk);
        let word = u32::from_be_bytes(buf);

        let mut digits = [0u8; 5];
        let mut n = word;
        for d in digits.iter_mut().rev() {
            *d = (n % 85) as u8;
            n /= 85;
        }
        let used = chunk.len() + 1;
        for d in &digits[..used] {
            out.push((d + ASCII85_OFFSET) as char);
        }
    }
    out
}

/// Decode a string produced by [`ascii85_encode`]. Exposed for tests and for
/// any diagnostic tooling that needs to compare a received CRC byte-for-byte
/// rather than string-for-string.
#[allow(dead_code)]
pub(crate) fn ascii85_decode(s: &str) -> Option<Vec<u8>> {
    let bytes: Vec<u8> = s.bytes().collect();
    let mut out = Vec::with_capacity(bytes.len() * 4 / 5);
    for chunk in bytes.chunks(5) {
        if chunk.len() == 1 {
            return None;
        }
        // A short final group was truncated on encode after padding with
        // zero bytes; missing digits are reconstructed as the maximum
        // base-85 digit ('u'), the standard btoa convention, so the
        // recovered word's leading bytes match what was actually encoded.
        let mut digits = [84u8; 5];
        for (i, b) in chunk.iter().enumerate() {
            let digit = b.checked_sub(ASCII85_OFFSET)?;
            if digit > 84 {
                return None;
            }
            digits[i] = digit;
        }
        let mut n: u64 = 0;
        for d in digits {
            n = n * 85 + d as u64;
        }
        let full = (n as u32).to_be_bytes();
        out.extend_from_slice(&full[..chunk.len() - 1]);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_is_deterministic() {
        let a = crc_of(b"hello world");
        let b = crc_of(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn crc_differs_for_different_values() {
        assert_ne!(crc_of(b"hello"), crc_of(b"world"));
    }

    #[test]
    fn ascii85_round_trips_an_md5_digest() {
        let digest = Md5::digest(b"round trip me");
        let encoded = ascii85_encode(&digest);
        let decoded = ascii85_decode(&encoded).unwrap();
        assert_eq!(decoded, digest.as_slice());
    }
}
