use std::io::{Read, Seek, SeekFrom};

use base64::prelude::*;
use bytes::Bytes;

use crate::algo::common::{AudioMeta, DecoderParams, ReadSeek, StreamCipher};
use crate::error::{DecoderError, DecoderResult};
use crate::internal::utils::{decrypt_aes128_ecb, pkcs7_unpadding};

use super::meta::{NcmMeta, NcmMetaDj, NcmMetaMusic};
use super::ncm_cipher::NcmCipher;

const MAGIC_HEADER: &[u8; 8] = b"CTENFDAM";
const KEY_CORE: [u8; 16] = [
    0x68, 0x7a, 0x48, 0x52, 0x41, 0x6d, 0x73, 0x6f, 0x35, 0x6b, 0x49, 0x6e, 0x62, 0x61, 0x78, 0x57,
];
const KEY_META: [u8; 16] = [
    0x23, 0x31, 0x34, 0x6C, 0x6A, 0x6B, 0x5F, 0x21, 0x5C, 0x5D, 0x26, 0x30, 0x55, 0x3C, 0x27, 0x28,
];

/// Decrypted key blocks carry this prefix before the real key material.
const KEY_PREFIX_LEN: usize = 17; // "neteasecloudmusic"
/// Meta blocks open with "163 key(Don't modify):".
const META_PREFIX_LEN: usize = 22;

#[derive(Clone)]
enum ParsedMeta {
    None,
    Music(NcmMetaMusic),
    Dj(NcmMetaDj),
}

/// Decoder for Netease `.ncm` containers.
pub struct NcmDecoder {
    rd: Box<dyn ReadSeek>,
    cipher: Option<NcmCipher>,
    offset: usize,

    meta: ParsedMeta,
    cover: Bytes,
}

impl std::fmt::Debug for NcmDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NcmDecoder")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl NcmDecoder {
    pub fn new(p: DecoderParams) -> Self {
        Self {
            rd: p.reader,
            cipher: None,
            offset: 0,
            meta: ParsedMeta::None,
            cover: Bytes::new(),
        }
    }

    fn read_u32_le(&mut self) -> DecoderResult<u32> {
        let mut buf = [0u8; 4];
        self.rd.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_key_data(&mut self) -> DecoderResult<Vec<u8>> {
        let key_len = self.read_u32_le()? as usize;
        let mut raw = vec![0u8; key_len];
        self.rd.read_exact(&mut raw)?;
        for b in raw.iter_mut() {
            *b ^= 0x64;
        }
        let decrypted = decrypt_aes128_ecb(&raw, &KEY_CORE)
            .map_err(|e| DecoderError::decode_failed("ncm", e))?;
        let unpadded = pkcs7_unpadding(&decrypted);
        if unpadded.len() <= KEY_PREFIX_LEN {
            return Err(DecoderError::invalid_header("ncm", "key block too short"));
        }
        Ok(unpadded[KEY_PREFIX_LEN..].to_vec())
    }

    fn read_meta_data(&mut self) -> DecoderResult<()> {
        let meta_len = self.read_u32_le()? as usize;
        if meta_len == 0 {
            // files exported without metadata
            return Ok(());
        }
        let mut raw = vec![0u8; meta_len];
        self.rd.read_exact(&mut raw)?;
        if raw.len() <= META_PREFIX_LEN {
            return Err(DecoderError::invalid_header("ncm", "meta block too short"));
        }
        let mut body = raw[META_PREFIX_LEN..].to_vec();
        for b in body.iter_mut() {
            *b ^= 0x63;
        }
        let cipher_text = BASE64_STANDARD
            .decode(body)
            .map_err(|e| DecoderError::invalid_header("ncm", format!("meta base64: {}", e)))?;
        let decrypted = decrypt_aes128_ecb(&cipher_text, &KEY_META)
            .map_err(|e| DecoderError::decode_failed("ncm", e))?;
        let meta_raw = pkcs7_unpadding(&decrypted);

        let sep = meta_raw.iter().position(|&b| b == b':').ok_or_else(|| {
            DecoderError::invalid_header("ncm", "meta type separator not found")
        })?;
        let meta_type = String::from_utf8_lossy(&meta_raw[..sep]).to_string();
        let meta_json = &meta_raw[sep + 1..];
        self.meta = match meta_type.as_str() {
            "music" => ParsedMeta::Music(serde_json::from_slice(meta_json).map_err(|e| {
                DecoderError::invalid_header("ncm", format!("meta parse: {}", e))
            })?),
            "dj" => ParsedMeta::Dj(serde_json::from_slice(meta_json).map_err(|e| {
                DecoderError::invalid_header("ncm", format!("meta parse: {}", e))
            })?),
            other => {
                return Err(DecoderError::invalid_header(
                    "ncm",
                    format!("unknown meta type '{}'", other),
                ))
            }
        };
        Ok(())
    }

    fn read_cover_data(&mut self) -> DecoderResult<()> {
        // CRC32 of the header, then a 5-byte gap, then the image
        self.rd.seek(SeekFrom::Current(4 + 5))?;
        let cover_len = self.read_u32_le()? as usize;
        let mut cover = vec![0u8; cover_len];
        self.rd.read_exact(&mut cover)?;
        self.cover = Bytes::from(cover);
        Ok(())
    }

    pub fn validate(&mut self) -> DecoderResult<()> {
        self.rd.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 8];
        self.rd.read_exact(&mut magic)?;
        if &magic != MAGIC_HEADER {
            return Err(DecoderError::invalid_header("ncm", "magic header mismatch"));
        }
        self.rd.seek(SeekFrom::Current(2))?;
        let key_data = self.read_key_data()?;
        self.read_meta_data()?;
        self.read_cover_data()?;
        self.cipher = Some(NcmCipher::new(&key_data));
        self.offset = 0;
        Ok(())
    }

    /// Output extension hinted by the container metadata, with the dot.
    pub fn audio_ext(&self) -> Option<String> {
        let format = match &self.meta {
            ParsedMeta::None => return None,
            ParsedMeta::Music(m) => m.format(),
            ParsedMeta::Dj(m) => m.format(),
        };
        if format.is_empty() {
            None
        } else {
            Some(format!(".{}", format))
        }
    }

    pub fn audio_meta(&self) -> Box<dyn AudioMeta> {
        match &self.meta {
            ParsedMeta::None => Box::new(NcmMetaMusic::default()),
            ParsedMeta::Music(m) => Box::new(m.clone()),
            ParsedMeta::Dj(m) => Box::new(m.clone()),
        }
    }

    /// The embedded cover, if the container carries one. `Bytes` keeps the
    /// clone cheap for the pipeline hand-off.
    pub fn cover_image(&self) -> Option<Bytes> {
        if self.cover.is_empty() {
            None
        } else {
            Some(self.cover.clone())
        }
    }

    pub fn into_reader(self) -> Box<dyn ReadSeek> {
        self.rd
    }
}

impl Read for NcmDecoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(cipher) = &self.cipher else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "ncm cipher not initialized",
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
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn encrypt_aes128_ecb(data: &[u8], key: &[u8; 16]) -> Vec<u8> {
        use crypto::buffer::{BufferResult, ReadBuffer, RefReadBuffer, RefWriteBuffer, WriteBuffer};
        // pkcs7 pad
        let pad = 16 - data.len() % 16;
        let mut padded = data.to_vec();
        padded.extend(std::iter::repeat(pad as u8).take(pad));

        let mut en = crypto::aes::ecb_encryptor(
            crypto::aes::KeySize::KeySize128,
            key,
            crypto::blockmodes::NoPadding,
        );
        let mut out = Vec::new();
        let mut read_buffer = RefReadBuffer::new(&padded);
        let mut buffer = [0u8; 4096];
        let mut write_buffer = RefWriteBuffer::new(&mut buffer);
        loop {
            let result = en.encrypt(&mut read_buffer, &mut write_buffer, true).unwrap();
            out.extend(
                write_buffer
                    .take_read_buffer()
                    .take_remaining()
                    .iter()
                    .copied(),
            );
            match result {
                BufferResult::BufferUnderflow => break,
                BufferResult::BufferOverflow => {}
            }
        }
        out
    }

    fn build_ncm_file(audio_plain: &[u8], core_key: &[u8], meta_json: &str, cover: &[u8]) -> Vec<u8> {
        let mut file = Vec::new();
        file.extend_from_slice(MAGIC_HEADER);
        file.extend_from_slice(&[0u8; 2]);

        // key block
        let mut key_plain = b"neteasecloudmusic".to_vec();
        key_plain.extend_from_slice(core_key);
        let mut key_block = encrypt_aes128_ecb(&key_plain, &KEY_CORE);
        for b in key_block.iter_mut() {
            *b ^= 0x64;
        }
        file.extend_from_slice(&(key_block.len() as u32).to_le_bytes());
        file.extend_from_slice(&key_block);

        // meta block
        let meta_plain = format!("music:{}", meta_json);
        let meta_ct = encrypt_aes128_ecb(meta_plain.as_bytes(), &KEY_META);
        let mut meta_b64 = BASE64_STANDARD.encode(meta_ct).into_bytes();
        for b in meta_b64.iter_mut() {
            *b ^= 0x63;
        }
        let mut meta_block = b"163 key(Don't modify):".to_vec();
        meta_block.extend_from_slice(&meta_b64);
        file.extend_from_slice(&(meta_block.len() as u32).to_le_bytes());
        file.extend_from_slice(&meta_block);

        // crc + gap + cover
        file.extend_from_slice(&[0u8; 4]);
        file.extend_from_slice(&[0u8; 5]);
        file.extend_from_slice(&(cover.len() as u32).to_le_bytes());
        file.extend_from_slice(cover);

        // payload
        let cipher = NcmCipher::new(core_key);
        let mut payload = audio_plain.to_vec();
        cipher.decrypt(&mut payload, 0);
        file.extend_from_slice(&payload);
        file
    }

    fn make_decoder(data: Vec<u8>) -> NcmDecoder {
        NcmDecoder::new(DecoderParams {
            reader: Box::new(Cursor::new(data)),
            file_path: PathBuf::from("test.ncm"),
            extension: "ncm".to_string(),
            kgg_db_path: None,
        })
    }

    #[test]
    fn test_full_roundtrip() {
        let mut audio = b"fLaC".to_vec();
        audio.extend((0u32..3000).map(|i| (i % 251) as u8));
        let cover = [0xFFu8, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4];
        let meta = r#"{"musicName":"晴天","album":"叶惠美","artist":[["周杰伦",6452]],"format":"flac"}"#;
        let file = build_ncm_file(&audio, b"0123456789abcdef", meta, &cover);

        let mut dec = make_decoder(file);
        dec.validate().unwrap();

        let m = dec.audio_meta();
        assert_eq!(m.title(), "晴天");
        assert_eq!(m.album(), "叶惠美");
        assert_eq!(m.artists(), vec!["周杰伦".to_string()]);
        assert_eq!(dec.audio_ext().as_deref(), Some(".flac"));
        assert_eq!(dec.cover_image().as_deref(), Some(&cover[..]));

        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, audio);
    }

    #[test]
    fn test_magic_mismatch() {
        let mut dec = make_decoder(vec![0u8; 64]);
        match dec.validate() {
            Err(DecoderError::InvalidHeader { .. }) => {}
            other => panic!("expected InvalidHeader, got {:?}", other),
        }
    }
}
