use std::io::{Read, Seek, SeekFrom};

use crate::algo::common::{DecoderParams, ReadSeek};
use crate::error::{DecoderError, DecoderResult};
use crate::internal::sniff;

/// Constant M4A prefix written over the scrambled header.
const REPLACE_HEADER: [u8; 8] = [0x00, 0x00, 0x00, 0x20, 0x66, 0x74, 0x79, 0x70];
const MAGIC_HEADER: [u8; 4] = [0x51, 0x51, 0x4D, 0x55]; // "QQMU"

/// Decoder for QQ Music iOS `.tm*` files. A degenerate cipher: when the
/// file opens with the QQMU tag the first eight bytes are replaced with a
/// standard M4A prefix, everything else streams verbatim.
pub struct TmDecoder {
    rd: Box<dyn ReadSeek>,
    prefix: [u8; 8],
    prefix_served: usize,
    validated: bool,
}

impl std::fmt::Debug for TmDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmDecoder")
            .field("prefix", &self.prefix)
            .field("prefix_served", &self.prefix_served)
            .field("validated", &self.validated)
            .finish_non_exhaustive()
    }
}

impl TmDecoder {
    pub fn new(p: DecoderParams) -> Self {
        Self {
            rd: p.reader,
            prefix: [0u8; 8],
            prefix_served: 0,
            validated: false,
        }
    }

    pub fn validate(&mut self) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; 8];
        self.rd.read_exact(&mut header)?;

        if header[..4] == MAGIC_HEADER {
            self.prefix = REPLACE_HEADER;
        } else if sniff::audio_extension(&header).is_some() {
            // file is not encrypted, pass the original header through
            self.prefix = header;
        } else {
            return Err(DecoderError::invalid_header("tm", "invalid header"));
        }
        self.prefix_served = 0;
        self.validated = true;
        Ok(())
    }

    pub fn into_reader(self) -> Box<dyn ReadSeek> {
        self.rd
    }
}

impl Read for TmDecoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if !self.validated {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "tm decoder not validated",
            ));
        }
        if self.prefix_served < self.prefix.len() {
            let n = buf.len().min(self.prefix.len() - self.prefix_served);
            buf[..n].copy_from_slice(&self.prefix[self.prefix_served..self.prefix_served + n]);
            self.prefix_served += n;
            return Ok(n);
        }
        self.rd.read(buf)
    }
}
