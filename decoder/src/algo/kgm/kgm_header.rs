use crate::error::{DecoderError, DecoderResult};

const VPR_MAGIC: [u8; 16] = [
    0x05, 0x28, 0xBC, 0x96, 0xE9, 0xE4, 0x5A, 0x43, 0x91, 0xAA, 0xBD, 0xD0, 0x7A, 0xF5, 0x36, 0x31,
];
const KGM_MAGIC: [u8; 16] = [
    0x7C, 0xD5, 0x32, 0xEB, 0x86, 0x02, 0x7F, 0x4B, 0xA8, 0xAF, 0xA6, 0x8E, 0x0F, 0xFF, 0x99, 0x14,
];

pub const HEADER_SIZE: usize = 0x3c;

#[derive(Clone, Default)]
pub struct Header {
    pub magic_header: [u8; 0x10],                // 0x00-0x0f
    pub audio_offset: u32,                       // 0x10-0x13
    pub crypto_version: u32,                     // 0x14-0x17
    pub crypto_slot: u32,                        // 0x18-0x1b
    pub crypto_test_data: [u8; 0x2b - 0x1c + 1], // 0x1c-0x2b
    pub crypto_key: [u8; 0x3b - 0x2c + 1],       // 0x2c-0x3b
}

impl Header {
    pub fn from_bytes(buf: &[u8]) -> DecoderResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(DecoderError::invalid_header("kgm", "header truncated"));
        }
        let magic_header: [u8; 0x10] = buf[0x00..=0x0f].try_into().unwrap();
        if magic_header != KGM_MAGIC && magic_header != VPR_MAGIC {
            return Err(DecoderError::invalid_header("kgm", "magic header mismatch"));
        }
        Ok(Self {
            magic_header,
            audio_offset: u32::from_le_bytes(buf[0x10..=0x13].try_into().unwrap()),
            crypto_version: u32::from_le_bytes(buf[0x14..=0x17].try_into().unwrap()),
            crypto_slot: u32::from_le_bytes(buf[0x18..=0x1b].try_into().unwrap()),
            crypto_test_data: buf[0x1c..=0x2b].try_into().unwrap(),
            crypto_key: buf[0x2c..=0x3b].try_into().unwrap(),
        })
    }
}

#[cfg(test)]
pub(crate) fn test_header_bytes(version: u32, slot: u32, key: [u8; 16]) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_SIZE];
    buf[0x00..=0x0f].copy_from_slice(&KGM_MAGIC);
    buf[0x10..=0x13].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
    buf[0x14..=0x17].copy_from_slice(&version.to_le_bytes());
    buf[0x18..=0x1b].copy_from_slice(&slot.to_le_bytes());
    buf[0x2c..=0x3b].copy_from_slice(&key);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let buf = test_header_bytes(3, 1, [9u8; 16]);
        let header = Header::from_bytes(&buf).unwrap();
        assert_eq!(header.audio_offset, HEADER_SIZE as u32);
        assert_eq!(header.crypto_version, 3);
        assert_eq!(header.crypto_slot, 1);
        assert_eq!(header.crypto_key, [9u8; 16]);
    }

    #[test]
    fn test_bad_magic() {
        let buf = vec![0u8; HEADER_SIZE];
        assert!(Header::from_bytes(&buf).is_err());
    }
}
