use crate::algo::common::StreamCipher;
use crate::error::{DecoderError, DecoderResult};
use crate::internal::utils::md5_digest;

const KGM_V3_SLOT_KEYS: [(u32, [u8; 4]); 1] = [(1, [0x6C, 0x2C, 0x2F, 0x27])];

/// KGM v3 cipher: box-XOR with three stacked per-byte transforms.
#[derive(Clone)]
pub struct KgmCryptoV3 {
    slot_box: [u8; 16],
    file_box: Vec<u8>,
}

impl KgmCryptoV3 {
    pub fn new(header: &super::kgm_header::Header) -> DecoderResult<Self> {
        let slot_key = KGM_V3_SLOT_KEYS
            .iter()
            .find(|(id, _)| *id == header.crypto_slot)
            .map(|(_, key)| key)
            .ok_or_else(|| {
                DecoderError::key_unavailable(
                    "kgm",
                    format!("unknown crypto slot {}", header.crypto_slot),
                )
            })?;
        let slot_box = kugou_md5(slot_key);
        let mut file_box = kugou_md5(&header.crypto_key).to_vec();
        file_box.push(0x6b);
        Ok(Self { slot_box, file_box })
    }
}

impl StreamCipher for KgmCryptoV3 {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        for (i, b) in buf.iter_mut().enumerate() {
            let pos = offset + i;
            *b ^= self.file_box[pos % self.file_box.len()];
            *b ^= *b << 4;
            *b ^= self.slot_box[pos % self.slot_box.len()];
            *b ^= xor_collapse_u32(pos as u32);
        }
    }
}

pub fn xor_collapse_u32(i: u32) -> u8 {
    let bytes = i.to_le_bytes();
    bytes[0] ^ bytes[1] ^ bytes[2] ^ bytes[3]
}

/// Kugou's MD5 variant: the digest bytes are swapped pairwise from the
/// tail.
pub fn kugou_md5(b: &[u8]) -> [u8; 16] {
    let digest = md5_digest(b);
    let mut ret = [0u8; 16];
    let mut i = 0;
    while i < 16 {
        ret[i] = digest[14 - i];
        ret[i + 1] = digest[14 - i + 1];
        i += 2;
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kugou_md5_pairwise_reversal() {
        let digest = md5_digest(b"abc");
        let swapped = kugou_md5(b"abc");
        for i in (0..16).step_by(2) {
            assert_eq!(swapped[i], digest[14 - i]);
            assert_eq!(swapped[i + 1], digest[15 - i]);
        }
    }

    #[test]
    fn test_xor_collapse() {
        assert_eq!(xor_collapse_u32(0), 0);
        assert_eq!(xor_collapse_u32(0x0101), 0);
        assert_eq!(xor_collapse_u32(0xFF00FF00), 0);
        assert_eq!(xor_collapse_u32(0x12345678), 0x12 ^ 0x34 ^ 0x56 ^ 0x78);
    }

    #[test]
    fn test_partition_invariance() {
        let header_buf = super::super::kgm_header::test_header_bytes(3, 1, [7u8; 16]);
        let header = super::super::kgm_header::Header::from_bytes(&header_buf).unwrap();
        let cipher = KgmCryptoV3::new(&header).unwrap();

        let plain: Vec<u8> = (0u32..8192).map(|i| (i % 247) as u8).collect();
        let mut whole = plain.clone();
        cipher.decrypt(&mut whole, 0);

        let mut chunked = plain.clone();
        let mut offset = 0;
        for size in [1usize, 16, 17, 255, 4096] {
            let end = (offset + size).min(chunked.len());
            cipher.decrypt(&mut chunked[offset..end], offset);
            offset = end;
        }
        cipher.decrypt(&mut chunked[offset..], offset);
        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_unknown_slot_refused() {
        let header_buf = super::super::kgm_header::test_header_bytes(3, 9, [7u8; 16]);
        let header = super::super::kgm_header::Header::from_bytes(&header_buf).unwrap();
        assert!(KgmCryptoV3::new(&header).is_err());
    }
}
