use std::io::{Read, Seek, SeekFrom};

use crate::error::{DecoderError, DecoderResult};
use crate::internal::sniff;

use super::interface::{DecoderParams, ReadSeek};

/// Identity decoder for files that are already standard audio. Registered
/// as a noop so batch callers can skip it.
pub struct RawDecoder {
    rd: Box<dyn ReadSeek>,
    audio_ext: String,
}

impl std::fmt::Debug for RawDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDecoder")
            .field("audio_ext", &self.audio_ext)
            .finish_non_exhaustive()
    }
}

impl RawDecoder {
    pub fn new(p: DecoderParams) -> Self {
        Self {
            rd: p.reader,
            audio_ext: p.extension,
        }
    }

    pub fn validate(&mut self) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; 16];
        self.rd.read_exact(&mut header)?;
        self.rd.seek(SeekFrom::Start(0))?;
        match sniff::audio_extension(&header) {
            Some(ext) => {
                self.audio_ext = ext.trim_start_matches('.').to_string();
                Ok(())
            }
            None => Err(DecoderError::invalid_header(
                "raw",
                "not a recognized audio stream",
            )),
        }
    }

    pub fn audio_ext(&self) -> &str {
        &self.audio_ext
    }

    pub fn seek_to_start(&mut self) -> std::io::Result<()> {
        self.rd.seek(SeekFrom::Start(0)).map(|_| ())
    }

    pub fn into_reader(self) -> Box<dyn ReadSeek> {
        self.rd
    }
}

impl Read for RawDecoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.rd.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn params(data: Vec<u8>, ext: &str) -> DecoderParams {
        DecoderParams {
            reader: Box::new(Cursor::new(data)),
            file_path: PathBuf::from(format!("test.{ext}")),
            extension: ext.to_string(),
            kgg_db_path: None,
        }
    }

    #[test]
    fn test_validate_recognized_stream() {
        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&[0u8; 32]);
        let mut dec = RawDecoder::new(params(data.clone(), "flac"));
        dec.validate().unwrap();
        assert_eq!(dec.audio_ext(), "flac");
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let mut dec = RawDecoder::new(params(vec![0u8; 32], "mp3"));
        assert!(dec.validate().is_err());
    }
}
