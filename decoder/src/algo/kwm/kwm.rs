use std::io::{Read, Seek, SeekFrom};

use crate::algo::common::{DecoderParams, ReadSeek, StreamCipher};
use crate::error::{DecoderError, DecoderResult};

use super::kwm_cipher::KwmCipher;

pub const MAGIC_HEADER_1: &[u8; 16] = b"yeelion-kuwo-tme";
pub const MAGIC_HEADER_2: &[u8; 16] = b"yeelion-kuwo\x00\x00\x00\x00";

/// Kuwo headers are a fixed 1024 bytes.
const HEADER_SIZE: usize = 0x400;

/// Decoder for Kuwo `.kwm` containers.
pub struct KwmDecoder {
    rd: Box<dyn ReadSeek>,
    cipher: Option<KwmCipher>,
    offset: usize,

    bitrate: u32,
    output_ext: String,
}

impl std::fmt::Debug for KwmDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KwmDecoder")
            .field("offset", &self.offset)
            .field("bitrate", &self.bitrate)
            .field("output_ext", &self.output_ext)
            .finish_non_exhaustive()
    }
}

impl KwmDecoder {
    pub fn new(p: DecoderParams) -> Self {
        Self {
            rd: p.reader,
            cipher: None,
            offset: 0,
            bitrate: 0,
            output_ext: String::new(),
        }
    }

    pub fn validate(&mut self) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; HEADER_SIZE];
        self.rd.read_exact(&mut header)?;
        let magic = &header[0..0x10];
        if magic != MAGIC_HEADER_1 && magic != MAGIC_HEADER_2 {
            return Err(DecoderError::invalid_header("kwm", "magic header mismatch"));
        }
        self.cipher = Some(KwmCipher::new(header[0x18..0x20].try_into().unwrap()));
        (self.bitrate, self.output_ext) = parse_bitrate_and_type(&header[0x20..0x40])?;
        self.offset = 0;
        Ok(())
    }

    pub fn audio_ext(&self) -> Option<String> {
        if self.output_ext.is_empty() {
            None
        } else {
            Some(format!(".{}", self.output_ext))
        }
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn into_reader(self) -> Box<dyn ReadSeek> {
        self.rd
    }
}

impl Read for KwmDecoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(cipher) = &self.cipher else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "kwm cipher not initialized",
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

/// The header stores e.g. `128mp3` at 0x20: decimal bitrate, then the
/// original container type, NUL padded.
fn parse_bitrate_and_type(field: &[u8]) -> DecoderResult<(u32, String)> {
    let end = field
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    let trimmed = &field[..end];
    let sep = trimmed
        .iter()
        .position(|b| !b.is_ascii_digit())
        .ok_or_else(|| DecoderError::invalid_header("kwm", "malformed bitrate field"))?;
    let bitrate = String::from_utf8_lossy(&trimmed[..sep])
        .parse()
        .map_err(|e| DecoderError::invalid_header("kwm", format!("bitrate: {}", e)))?;
    let output_ext = String::from_utf8_lossy(&trimmed[sep..]).to_lowercase();
    Ok((bitrate, output_ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn build_kwm_file(key: u64, bitrate_type: &[u8], audio_plain: &[u8]) -> Vec<u8> {
        let mut file = vec![0u8; HEADER_SIZE];
        file[0..0x10].copy_from_slice(MAGIC_HEADER_1);
        file[0x18..0x20].copy_from_slice(&key.to_le_bytes());
        file[0x20..0x20 + bitrate_type.len()].copy_from_slice(bitrate_type);
        let cipher = KwmCipher::new(key.to_le_bytes());
        let mut payload = audio_plain.to_vec();
        cipher.decrypt(&mut payload, 0);
        file.extend_from_slice(&payload);
        file
    }

    fn make_decoder(data: Vec<u8>) -> KwmDecoder {
        KwmDecoder::new(DecoderParams {
            reader: Box::new(Cursor::new(data)),
            file_path: PathBuf::from("test.kwm"),
            extension: "kwm".to_string(),
            kgg_db_path: None,
        })
    }

    #[test]
    fn test_roundtrip() {
        let mut plain = b"ID3\x04\x00".to_vec();
        plain.extend((0u32..2000).map(|i| (i % 223) as u8));
        let file = build_kwm_file(987654321, b"128mp3", &plain);
        let mut dec = make_decoder(file);
        dec.validate().unwrap();
        assert_eq!(dec.bitrate(), 128);
        assert_eq!(dec.audio_ext().as_deref(), Some(".mp3"));
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn test_bad_magic() {
        let mut dec = make_decoder(vec![0u8; 2048]);
        assert!(dec.validate().is_err());
    }
}
