use std::io::{Read, Seek, SeekFrom};

use crate::algo::common::{DecoderParams, ReadSeek, StreamCipher};
use crate::error::{DecoderError, DecoderResult};
use crate::internal::pool::BufferPool;
use crate::internal::sniff;

use super::cipher_map::MapCipher;
use super::cipher_rc4::Rc4Cipher;
use super::cipher_static::StaticCipher;
use super::key_derive::derive_key;
use super::vault;

const PROBE_SIZE: usize = 256;

enum QmcCipher {
    Static(StaticCipher),
    Map(MapCipher),
    Rc4(Rc4Cipher),
}

impl StreamCipher for QmcCipher {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        match self {
            QmcCipher::Static(c) => c.decrypt(buf, offset),
            QmcCipher::Map(c) => c.decrypt(buf, offset),
            QmcCipher::Rc4(c) => c.decrypt(buf, offset),
        }
    }
}

/// Decoder for the QMC container family. The key, when present, lives in a
/// footer at the end of the file; the payload always starts at byte zero.
pub struct QmcDecoder {
    rd: Box<dyn ReadSeek>,

    audio_len: u64,
    offset: usize,

    ekey: Option<Vec<u8>>,
    cipher: QmcCipher,

    song_id: u64,
    raw_meta_extra: u64,
}

impl std::fmt::Debug for QmcDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QmcDecoder")
            .field("audio_len", &self.audio_len)
            .field("offset", &self.offset)
            .field("song_id", &self.song_id)
            .field("raw_meta_extra", &self.raw_meta_extra)
            .finish_non_exhaustive()
    }
}

impl QmcDecoder {
    pub fn new(p: DecoderParams) -> Self {
        Self {
            rd: p.reader,
            audio_len: 0,
            offset: 0,
            ekey: None,
            cipher: QmcCipher::Static(StaticCipher),
            song_id: 0,
            raw_meta_extra: 0,
        }
    }

    pub fn validate(&mut self) -> DecoderResult<()> {
        self.search_key()?;

        self.cipher = match &self.ekey {
            Some(ekey) => {
                let key = derive_key(ekey)?;
                if key.len() > 300 {
                    QmcCipher::Rc4(Rc4Cipher::new(key)?)
                } else {
                    QmcCipher::Map(MapCipher::new(key)?)
                }
            }
            None => QmcCipher::Static(StaticCipher),
        };

        self.validate_decode()?;

        self.rd.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        Ok(())
    }

    /// Decrypt the head of the payload and require a recognized audio
    /// stream before committing to the cipher.
    fn validate_decode(&mut self) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::Start(0))?;
        let probe_len = PROBE_SIZE.min(self.audio_len as usize);
        let mut buf = BufferPool::global().get(probe_len);
        self.rd.read_exact(&mut buf)?;
        self.cipher.decrypt(&mut buf, 0);
        if sniff::audio_extension(&buf).is_none() {
            return Err(DecoderError::invalid_header(
                "qmc",
                "decrypted head is not a recognized audio stream",
            ));
        }
        Ok(())
    }

    /// Walk the file tail to find the key and the payload length.
    fn search_key(&mut self) -> DecoderResult<()> {
        let file_size = self.rd.seek(SeekFrom::End(0))?;
        if file_size < 4 {
            return Err(DecoderError::invalid_header("qmc", "file too small"));
        }
        self.rd.seek(SeekFrom::End(-4))?;
        let mut suffix = [0u8; 4];
        self.rd.read_exact(&mut suffix)?;

        match &suffix {
            b"QTag" => self.read_raw_meta_qtag(file_size),
            b"STag" => Err(DecoderError::key_unavailable(
                "qmc",
                "file with 'STag' suffix doesn't contain a media key",
            )),
            b"cex\x00" => self.read_music_ex(file_size),
            _ => {
                let size = u32::from_le_bytes(suffix);
                if size <= 0xFFFF && size != 0 {
                    self.read_raw_key(file_size, size as u64)
                } else {
                    // no footer, legacy static cipher over the whole file
                    self.audio_len = file_size;
                    Ok(())
                }
            }
        }
    }

    fn read_raw_key(&mut self, file_size: u64, raw_key_len: u64) -> DecoderResult<()> {
        if file_size < 4 + raw_key_len {
            return Err(DecoderError::invalid_header("qmc", "key footer truncated"));
        }
        self.audio_len = file_size - 4 - raw_key_len;
        self.rd.seek(SeekFrom::Start(self.audio_len))?;
        let mut raw_key = vec![0u8; raw_key_len as usize];
        self.rd.read_exact(&mut raw_key)?;
        if let Some(end) = raw_key.iter().rposition(|&b| b != 0) {
            raw_key.truncate(end + 1);
        } else {
            raw_key.clear();
        }
        self.ekey = Some(raw_key);
        Ok(())
    }

    /// `QTag` footer: `{ekey},{songID},{extra}` metadata blob, big-endian
    /// length eight bytes before the end.
    fn read_raw_meta_qtag(&mut self, file_size: u64) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::End(-8))?;
        let mut buf = [0u8; 4];
        self.rd.read_exact(&mut buf)?;
        let raw_meta_len = u32::from_be_bytes(buf) as u64;
        if file_size < 8 + raw_meta_len {
            return Err(DecoderError::invalid_header("qmc", "QTag footer truncated"));
        }
        self.audio_len = file_size - 8 - raw_meta_len;
        self.rd.seek(SeekFrom::Start(self.audio_len))?;
        let mut raw_meta = vec![0u8; raw_meta_len as usize];
        self.rd.read_exact(&mut raw_meta)?;
        let metadata = String::from_utf8(raw_meta)
            .map_err(|e| DecoderError::invalid_header("qmc", format!("QTag metadata: {}", e)))?;
        let items: Vec<&str> = metadata.split(',').collect();
        if items.len() != 3 {
            return Err(DecoderError::invalid_header(
                "qmc",
                "QTag metadata must have three fields",
            ));
        }
        self.ekey = Some(items[0].as_bytes().to_vec());
        self.song_id = items[1]
            .parse()
            .map_err(|e| DecoderError::invalid_header("qmc", format!("QTag song id: {}", e)))?;
        self.raw_meta_extra = items[2]
            .parse()
            .map_err(|e| DecoderError::invalid_header("qmc", format!("QTag extra: {}", e)))?;
        Ok(())
    }

    /// `cex\0` footer: the footer size tells where the audio ends, and the
    /// media file name inside it keys the platform vault.
    fn read_music_ex(&mut self, file_size: u64) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::End(-8))?;
        let mut buf = [0u8; 4];
        self.rd.read_exact(&mut buf)?;
        let tag_size = u32::from_le_bytes(buf) as u64;
        if tag_size < 8 || file_size < tag_size {
            return Err(DecoderError::invalid_header("qmc", "cex footer truncated"));
        }
        self.audio_len = file_size - tag_size;
        self.rd.seek(SeekFrom::Start(self.audio_len))?;
        let mut body = vec![0u8; (tag_size - 8) as usize];
        self.rd.read_exact(&mut body)?;
        let name_end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
        let media_file_name = String::from_utf8_lossy(&body[..name_end]).to_string();

        let ekey = vault::lookup(&media_file_name).ok_or_else(|| {
            DecoderError::key_unavailable(
                "qmc",
                format!("no vault entry for media file '{}'", media_file_name),
            )
        })?;
        self.ekey = Some(ekey.into_bytes());
        Ok(())
    }

    pub fn song_id(&self) -> u64 {
        self.song_id
    }

    pub fn into_reader(self) -> Box<dyn ReadSeek> {
        self.rd
    }
}

impl Read for QmcDecoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = (self.audio_len as usize).saturating_sub(self.offset);
        if remaining == 0 {
            return Ok(0);
        }
        let want = buf.len().min(remaining);
        let n = self.rd.read(&mut buf[..want])?;
        if n > 0 {
            self.cipher.decrypt(&mut buf[..n], self.offset);
            self.offset += n;
        }
        Ok(n)
    }
}

impl Seek for QmcDecoder {
    /// Offsets are in plaintext coordinates; the cipher stays correct
    /// because it is addressed purely by position.
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let abs = match pos {
            SeekFrom::Start(o) => o as i64,
            SeekFrom::Current(d) => self.offset as i64 + d,
            SeekFrom::End(d) => self.audio_len as i64 + d,
        };
        if abs < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "negative seek position",
            ));
        }
        let abs = (abs as u64).min(self.audio_len);
        self.rd.seek(SeekFrom::Start(abs))?;
        self.offset = abs as usize;
        Ok(abs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn make_decoder(data: Vec<u8>, ext: &str) -> QmcDecoder {
        QmcDecoder::new(DecoderParams {
            reader: Box::new(Cursor::new(data)),
            file_path: PathBuf::from(format!("test.{ext}")),
            extension: ext.to_string(),
            kgg_db_path: None,
        })
    }

    /// Encrypt a plaintext with the static cipher and force the trailing
    /// four ciphertext bytes to a value the tail walk cannot mistake for a
    /// key length.
    fn static_encrypted(mut plain: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
        let n = plain.len();
        assert!(n >= 4);
        let cipher = StaticCipher;
        let mut ct = plain.clone();
        cipher.decrypt(&mut ct, 0);
        let marker = 0x00100000u32.to_le_bytes();
        ct[n - 4..].copy_from_slice(&marker);
        // the forced tail decrypts to whatever the mask says; mirror it in
        // the expected plaintext
        let mut tail = marker;
        cipher.decrypt(&mut tail, n - 4);
        plain[n - 4..].copy_from_slice(&tail);
        (ct, plain)
    }

    fn mp3_plaintext(len: usize) -> Vec<u8> {
        let mut plain = vec![0u8; len];
        plain[..3].copy_from_slice(b"ID3");
        for (i, b) in plain.iter_mut().enumerate().skip(3) {
            *b = (i % 199) as u8;
        }
        plain
    }

    #[test]
    fn test_static_roundtrip() {
        let (ct, plain) = static_encrypted(mp3_plaintext(4096));
        let mut dec = make_decoder(ct, "qmc0");
        dec.validate().unwrap();
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn test_static_roundtrip_chunked() {
        let (ct, plain) = static_encrypted(mp3_plaintext(4096));
        let mut dec = make_decoder(ct, "qmc0");
        dec.validate().unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 17];
        loop {
            let n = dec.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, plain);
    }

    #[test]
    fn test_seek_in_plaintext_coordinates() {
        let (ct, plain) = static_encrypted(mp3_plaintext(4096));
        let mut dec = make_decoder(ct, "qmc0");
        dec.validate().unwrap();
        dec.seek(SeekFrom::Start(1000)).unwrap();
        let mut out = vec![0u8; 100];
        dec.read_exact(&mut out).unwrap();
        assert_eq!(&out[..], &plain[1000..1100]);
    }

    #[test]
    fn test_tail_key_length_parse() {
        // 6 payload bytes, 4-byte key "ABC\0", LE u32 length 4
        let mut data = vec![1u8, 2, 3, 4, 5, 6];
        data.extend_from_slice(&[0x41, 0x42, 0x43, 0x00]);
        data.extend_from_slice(&4u32.to_le_bytes());
        let mut dec = make_decoder(data, "mflac");
        dec.search_key().unwrap();
        // trailing NUL stripped from the derivation input
        assert_eq!(dec.ekey.as_deref(), Some(&b"ABC"[..]));
        assert_eq!(dec.audio_len, 6);
    }

    #[test]
    fn test_qtag_footer_parse() {
        let mut data = vec![9u8; 6];
        let meta = b"RUtFWQ==,12345,2";
        data.extend_from_slice(meta);
        data.extend_from_slice(&(meta.len() as u32).to_be_bytes());
        data.extend_from_slice(b"QTag");
        let mut dec = make_decoder(data, "qmcflac");
        dec.search_key().unwrap();
        assert_eq!(dec.ekey.as_deref(), Some(&b"RUtFWQ=="[..]));
        assert_eq!(dec.song_id, 12345);
        assert_eq!(dec.raw_meta_extra, 2);
        assert_eq!(dec.audio_len, 6);
    }

    #[test]
    fn test_stag_is_key_unavailable() {
        let mut data = vec![0u8; 16];
        data.extend_from_slice(b"STag");
        let mut dec = make_decoder(data, "mflac");
        match dec.search_key() {
            Err(DecoderError::KeyUnavailable { .. }) => {}
            other => panic!("expected KeyUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_cex_footer_without_vault_entry() {
        let mut data = vec![0u8; 32];
        let name = b"no_such_media.mflac\x00";
        let tag_size = (name.len() + 8) as u32;
        data.extend_from_slice(name);
        data.extend_from_slice(&tag_size.to_le_bytes());
        data.extend_from_slice(b"cex\x00");
        let mut dec = make_decoder(data, "mflac");
        match dec.search_key() {
            Err(DecoderError::KeyUnavailable { .. }) => {}
            other => panic!("expected KeyUnavailable, got {:?}", other),
        }
    }
}
