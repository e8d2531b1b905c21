use crate::algo::common::StreamCipher;

/// Mask table shipped by the legacy QQ Music clients. Opaque constants;
/// only the index rule below is documented.
const STATIC_KEY: [u8; 256] = [
    0xC4, 0x9E, 0x51, 0x8F, 0xE5, 0xC9, 0xA4, 0x83,
    0xE9, 0xC8, 0x59, 0x79, 0x54, 0x2D, 0x84, 0xCC,
    0x27, 0x1A, 0x0D, 0x06, 0xFE, 0x6E, 0x12, 0x0B,
    0x9D, 0x97, 0x3A, 0xC3, 0x4B, 0x8C, 0xF5, 0xF1,
    0x51, 0xCD, 0x6C, 0x91, 0x3F, 0xC4, 0xA2, 0xD6,
    0x63, 0xD3, 0x79, 0xD3, 0x87, 0x11, 0xBF, 0x22,
    0x35, 0xDB, 0xF1, 0xC6, 0xF8, 0xE7, 0xCA, 0x9D,
    0x45, 0x1A, 0x71, 0xCC, 0x63, 0xB4, 0x32, 0xEC,
    0xC2, 0x11, 0xC4, 0x9F, 0xD1, 0x09, 0xE9, 0xED,
    0xDD, 0x6D, 0x0B, 0xBE, 0xD0, 0xBD, 0x91, 0x36,
    0x1B, 0x5A, 0x1B, 0x1D, 0x9A, 0xFA, 0x45, 0x5E,
    0xDD, 0x23, 0xFC, 0xD6, 0xA6, 0x15, 0x10, 0x8A,
    0x19, 0x37, 0x48, 0x78, 0x50, 0x74, 0x34, 0x56,
    0x12, 0xA5, 0xFE, 0x4E, 0xBF, 0x59, 0x92, 0x6D,
    0xD4, 0x52, 0xA0, 0x02, 0x76, 0x17, 0x21, 0x12,
    0x65, 0x9E, 0xA3, 0x22, 0xEA, 0x1E, 0x87, 0xE9,
    0xF5, 0xFD, 0x57, 0x19, 0x07, 0x23, 0x4F, 0xEB,
    0x81, 0x2B, 0x76, 0xBD, 0x4D, 0x94, 0x26, 0xD9,
    0x42, 0x28, 0x52, 0x22, 0x3D, 0x9F, 0x69, 0xB0,
    0x51, 0xBC, 0x95, 0xAC, 0xF7, 0xC4, 0x1E, 0x94,
    0x84, 0x86, 0x63, 0x9D, 0x1B, 0x63, 0xBF, 0x0C,
    0x38, 0x10, 0x1F, 0x68, 0xAF, 0xD8, 0xB8, 0x29,
    0x91, 0xB4, 0xDF, 0x6C, 0x1C, 0x97, 0x32, 0x13,
    0x38, 0x7C, 0x7A, 0x8D, 0xFB, 0xB1, 0xB6, 0xD5,
    0xE7, 0xDB, 0xDB, 0xCB, 0x1D, 0xC7, 0x44, 0xA3,
    0x79, 0xED, 0x62, 0xD4, 0xB5, 0x16, 0x24, 0x7C,
    0x1F, 0xDE, 0x1B, 0x2A, 0x0E, 0x8D, 0xC2, 0xD5,
    0x7B, 0x47, 0x48, 0xB3, 0x2B, 0xD6, 0xE1, 0x64,
    0x02, 0x58, 0x33, 0x7D, 0x02, 0x04, 0x85, 0x18,
    0x7B, 0x0D, 0x22, 0x38, 0xAF, 0xF6, 0x13, 0xA6,
    0x68, 0xBA, 0x75, 0x0A, 0xC0, 0xD6, 0x44, 0x8A,
    0x46, 0x27, 0xDE, 0x52, 0xE4, 0x54, 0x9E, 0x08,
];

/// Fixed-table mask for legacy QMC files that carry no tail key.
#[derive(Clone, Copy, Default)]
pub struct StaticCipher;

impl StaticCipher {
    fn get_mask(pos: usize) -> u8 {
        STATIC_KEY[(pos.wrapping_mul(pos) + 27) & 0xff]
    }
}

impl StreamCipher for StaticCipher {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b ^= Self::get_mask(offset + i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_depends_only_on_low_byte() {
        // (p*p + 27) mod 256 is a function of p mod 256
        for p in 0..256usize {
            assert_eq!(StaticCipher::get_mask(p), StaticCipher::get_mask(p + 256));
            assert_eq!(StaticCipher::get_mask(p), StaticCipher::get_mask(p + 65536));
        }
    }

    #[test]
    fn test_partition_invariance() {
        let plain: Vec<u8> = (0u32..4096).map(|i| (i % 251) as u8).collect();
        let cipher = StaticCipher;
        let mut whole = plain.clone();
        cipher.decrypt(&mut whole, 0);

        let mut chunked = plain.clone();
        let mut offset = 0;
        for size in [1usize, 3, 7, 128, 1000, 2957] {
            let end = (offset + size).min(chunked.len());
            cipher.decrypt(&mut chunked[offset..end], offset);
            offset = end;
        }
        cipher.decrypt(&mut chunked[offset..], offset);
        assert_eq!(whole, chunked);
    }
}
