//! QMC ekey derivation: base64 envelope, optional EncV2 double-TEA layer,
//! then the V1 half-interleaved TEA expansion.

use base64::prelude::*;

use crate::error::{DecoderError, DecoderResult};

use super::tea::decrypt_tencent_tea;

pub const RAW_KEY_PREFIX_V2: &[u8; 18] = b"QQMusic EncV2,Key:";

const DERIVE_V2_KEY_1: [u8; 16] = [
    0x33, 0x38, 0x36, 0x5A, 0x4A, 0x59, 0x21, 0x40, 0x23, 0x2A, 0x24, 0x25, 0x5E, 0x26, 0x29, 0x28,
];
const DERIVE_V2_KEY_2: [u8; 16] = [
    0x2A, 0x2A, 0x23, 0x21, 0x28, 0x23, 0x24, 0x25, 0x26, 0x5E, 0x61, 0x31, 0x63, 0x5A, 0x2C, 0x54,
];

pub fn simple_make_key(salt: u8, length: usize) -> Vec<u8> {
    let mut key_buf = vec![0u8; length];
    for (i, b) in key_buf.iter_mut().enumerate() {
        let tmp = f64::tan(salt as f64 + i as f64 * 0.1);
        *b = (tmp.abs() * 100.0) as u8;
    }
    key_buf
}

pub fn derive_key(raw_key: &[u8]) -> DecoderResult<Vec<u8>> {
    let raw_key_dec = BASE64_STANDARD.decode(raw_key).map_err(|e| {
        DecoderError::key_unavailable("qmc", format!("ekey base64 decode failed: {}", e))
    })?;
    let key = if raw_key_dec.starts_with(RAW_KEY_PREFIX_V2) {
        derive_key_v2(&raw_key_dec[RAW_KEY_PREFIX_V2.len()..])?
    } else {
        raw_key_dec
    };
    derive_key_v1(&key)
}

fn derive_key_v1(raw_key_dec: &[u8]) -> DecoderResult<Vec<u8>> {
    if raw_key_dec.len() < 16 {
        return Err(DecoderError::key_unavailable("qmc", "ekey too short"));
    }
    let simple_key = simple_make_key(106, 8);
    let mut tea_key = [0u8; 16];
    for i in 0..8 {
        tea_key[i << 1] = simple_key[i];
        tea_key[(i << 1) + 1] = raw_key_dec[i];
    }
    let rs = decrypt_tencent_tea(&raw_key_dec[8..], &tea_key)?;
    let mut ret = Vec::with_capacity(8 + rs.len());
    ret.extend_from_slice(&raw_key_dec[..8]);
    ret.extend_from_slice(&rs);
    Ok(ret)
}

fn derive_key_v2(raw_key_dec: &[u8]) -> DecoderResult<Vec<u8>> {
    let buf = decrypt_tencent_tea(raw_key_dec, &DERIVE_V2_KEY_1)?;
    let buf = decrypt_tencent_tea(&buf, &DERIVE_V2_KEY_2)?;
    BASE64_STANDARD.decode(buf).map_err(|e| {
        DecoderError::key_unavailable("qmc", format!("ekey v2 base64 decode failed: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_make_key() {
        let expect = [0x69u8, 0x56, 0x46, 0x38, 0x2b, 0x20, 0x15, 0x0b];
        assert_eq!(simple_make_key(106, 8), expect.to_vec());
    }

    #[test]
    fn test_derive_key_rejects_short_input() {
        let raw = BASE64_STANDARD.encode(b"short");
        assert!(derive_key(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_derive_key_rejects_non_base64() {
        assert!(derive_key(b"\xff\xfe\xfd\xfc").is_err());
    }
}
