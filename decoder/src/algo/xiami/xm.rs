use std::io::{Read, Seek, SeekFrom};

use crate::algo::common::{DecoderParams, ReadSeek, StreamCipher};
use crate::error::{DecoderError, DecoderResult};

use super::xm_cipher::XmCipher;

const MAGIC_HEADER: [u8; 4] = [b'i', b'f', b'm', b't'];
const MAGIC_HEADER_2: [u8; 4] = [0xfe, 0xfe, 0xfe, 0xfe];

/// The type tag at 0x04 names the original container.
fn extension_for_type(tag: &[u8]) -> Option<&'static str> {
    match tag {
        b" WAV" => Some("wav"),
        b"FLAC" => Some("flac"),
        b" MP3" => Some("mp3"),
        b" A4M" => Some("m4a"),
        _ => None,
    }
}

/// Decoder for Xiami `.xm` files: a 16-byte header, then a payload whose
/// tail is XOR-masked from an in-header start offset.
pub struct XmDecoder {
    rd: Box<dyn ReadSeek>,
    cipher: Option<XmCipher>,
    offset: usize,
    output_ext: String,
}

impl std::fmt::Debug for XmDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmDecoder")
            .field("offset", &self.offset)
            .field("output_ext", &self.output_ext)
            .finish_non_exhaustive()
    }
}

impl XmDecoder {
    pub fn new(p: DecoderParams) -> Self {
        Self {
            rd: p.reader,
            cipher: None,
            offset: 0,
            output_ext: String::new(),
        }
    }

    pub fn validate(&mut self) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; 16];
        self.rd.read_exact(&mut header)?;
        if header[..4] != MAGIC_HEADER || header[8..12] != MAGIC_HEADER_2 {
            return Err(DecoderError::invalid_header("xm", "magic header mismatch"));
        }
        let ext = extension_for_type(&header[4..8]).ok_or_else(|| {
            DecoderError::invalid_header("xm", "unknown original container type")
        })?;
        self.output_ext = ext.to_string();
        // 0x0C-0x0E: encrypt start, little-endian u24, in payload coordinates
        let enc_start_at =
            header[12] as usize | (header[13] as usize) << 8 | (header[14] as usize) << 16;
        self.cipher = Some(XmCipher::new(header[15], enc_start_at));
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

    pub fn into_reader(self) -> Box<dyn ReadSeek> {
        self.rd
    }
}

impl Read for XmDecoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(cipher) = &self.cipher else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "xm cipher not initialized",
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
