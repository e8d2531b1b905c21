use crate::algo::common::StreamCipher;

pub const KEY_PREDEFINED: &[u8; 32] = b"MoOtOiTvINGwd2E6n0E1i7L5t2IoOoNk";

/// Position-XOR over a 32-byte mask expanded from the header key.
#[derive(Clone)]
pub struct KwmCipher {
    mask: [u8; 32],
}

impl KwmCipher {
    pub fn new(key: [u8; 8]) -> Self {
        Self {
            mask: Self::generate_mask(key),
        }
    }

    /// The header key is a little-endian u64 whose decimal rendering,
    /// cycled to 32 bytes, XORs the predefined mask.
    pub fn generate_mask(key: [u8; 8]) -> [u8; 32] {
        let key_str = u64::from_le_bytes(key).to_string();
        let key_bytes = key_str.as_bytes();
        let mut mask = [0u8; 32];
        for (i, m) in mask.iter_mut().enumerate() {
            *m = KEY_PREDEFINED[i] ^ key_bytes[i % key_bytes.len()];
        }
        mask
    }
}

impl StreamCipher for KwmCipher {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b ^= self.mask[(offset + i) & 0x1F];
        }
    }
}
