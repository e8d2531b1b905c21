use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::algo::common::{DecoderParams, ReadSeek, StreamCipher};
use crate::error::{DecoderError, DecoderResult};

use super::kgm_header::{Header, HEADER_SIZE};
use super::kgm_v3::KgmCryptoV3;
use super::kgm_v5::KgmCryptoV5;

enum KgmCipher {
    V3(KgmCryptoV3),
    V5(KgmCryptoV5),
}

impl StreamCipher for KgmCipher {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        match self {
            KgmCipher::V3(c) => c.decrypt(buf, offset),
            KgmCipher::V5(c) => c.decrypt(buf, offset),
        }
    }
}

/// Decoder for Kugou containers (.kgm, .kgma, .vpr, .kgg and the
/// compound .kgm.flac / .vpr.flac forms).
pub struct KgmDecoder {
    rd: Box<dyn ReadSeek>,
    file_path: PathBuf,
    kgg_db_path: Option<PathBuf>,

    cipher: Option<KgmCipher>,
    header: Header,
    offset: usize,
}

impl std::fmt::Debug for KgmDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KgmDecoder")
            .field("file_path", &self.file_path)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl KgmDecoder {
    pub fn new(p: DecoderParams) -> Self {
        Self {
            rd: p.reader,
            file_path: p.file_path,
            kgg_db_path: p.kgg_db_path,
            cipher: None,
            header: Header::default(),
            offset: 0,
        }
    }

    /// Validate the header and position the reader at the first encrypted
    /// audio byte.
    pub fn validate(&mut self) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::Start(0))?;
        let mut header_buf = [0u8; HEADER_SIZE];
        self.rd.read_exact(&mut header_buf)?;
        let header = Header::from_bytes(&header_buf)?;

        self.cipher = Some(match header.crypto_version {
            3 => KgmCipher::V3(KgmCryptoV3::new(&header)?),
            5 => {
                let file_name = self
                    .file_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                KgmCipher::V5(KgmCryptoV5::new(file_name, self.kgg_db_path.as_deref())?)
            }
            v @ (1 | 2) => {
                return Err(DecoderError::unsupported_version(
                    "kgm",
                    format!("crypto version {} is deprecated and no longer supported", v),
                ))
            }
            4 => {
                return Err(DecoderError::unsupported_version(
                    "kgm",
                    "crypto version 4 was experimental and is not supported",
                ))
            }
            v if v > 5 => {
                return Err(DecoderError::unsupported_version(
                    "kgm",
                    format!("crypto version {} is newer than supported (max: 5)", v),
                ))
            }
            v => {
                return Err(DecoderError::invalid_header(
                    "kgm",
                    format!("invalid crypto version {}", v),
                ))
            }
        });

        self.rd.seek(SeekFrom::Start(header.audio_offset as u64))?;
        self.header = header;
        self.offset = 0;
        Ok(())
    }

    pub fn into_reader(self) -> Box<dyn ReadSeek> {
        self.rd
    }
}

impl Read for KgmDecoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(cipher) = &self.cipher else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "kgm cipher not initialized",
            ));
        };
        let n = self.rd.read(buf)?;
        if n > 0 {
            cipher.decrypt(&mut buf[..n], self.offset);
            self.offset += n;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::super::kgm_header::test_header_bytes;
    use super::super::kgm_v3::{kugou_md5, xor_collapse_u32};
    use super::*;
    use std::io::Cursor;

    fn make_decoder(data: Vec<u8>) -> KgmDecoder {
        KgmDecoder::new(DecoderParams {
            reader: Box::new(Cursor::new(data)),
            file_path: PathBuf::from("test.kgm"),
            extension: "kgm".to_string(),
            kgg_db_path: None,
        })
    }

    /// Inverse of the v3 per-byte transform chain; `b ^= b << 4` is an
    /// involution, so only the order flips.
    fn encrypt_v3(plain: &[u8], key: [u8; 16]) -> Vec<u8> {
        let slot_box = kugou_md5(&[0x6C, 0x2C, 0x2F, 0x27]);
        let mut file_box = kugou_md5(&key).to_vec();
        file_box.push(0x6b);
        plain
            .iter()
            .enumerate()
            .map(|(pos, &p)| {
                let mut b = p ^ xor_collapse_u32(pos as u32);
                b ^= slot_box[pos % slot_box.len()];
                b ^= b << 4;
                b ^= file_box[pos % file_box.len()];
                b
            })
            .collect()
    }

    #[test]
    fn test_v3_roundtrip() {
        let key = [3u8; 16];
        let mut plain = b"fLaC".to_vec();
        plain.extend((0u32..5000).map(|i| (i % 233) as u8));

        let mut file = test_header_bytes(3, 1, key);
        file.extend(encrypt_v3(&plain, key));

        let mut dec = make_decoder(file);
        dec.validate().unwrap();
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn test_version_gate() {
        for (version, fragment) in [
            (1u32, "deprecated"),
            (2, "deprecated"),
            (4, "crypto version 4 was experimental"),
            (7, "newer than supported"),
        ] {
            let mut file = test_header_bytes(version, 1, [0u8; 16]);
            file.extend_from_slice(&[0u8; 64]);
            let mut dec = make_decoder(file);
            match dec.validate() {
                Err(DecoderError::UnsupportedVersion { reason, .. }) => {
                    assert!(
                        reason.contains(fragment),
                        "version {}: '{}' missing '{}'",
                        version,
                        reason,
                        fragment
                    );
                }
                other => panic!("version {}: expected UnsupportedVersion, got {:?}", version, other),
            }
        }
    }

    #[test]
    fn test_v5_without_db_is_key_unavailable() {
        let mut file = test_header_bytes(5, 1, [0u8; 16]);
        file.extend_from_slice(&[0u8; 64]);
        let mut dec = make_decoder(file);
        match dec.validate() {
            Err(DecoderError::KeyUnavailable { .. }) => {}
            other => panic!("expected KeyUnavailable, got {:?}", other),
        }
    }
}
