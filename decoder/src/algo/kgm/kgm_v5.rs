use std::path::Path;

use crate::algo::common::StreamCipher;
use crate::algo::qmc::cipher_map::MapCipher;
use crate::algo::qmc::cipher_rc4::Rc4Cipher;
use crate::algo::qmc::key_derive::derive_key;
use crate::error::{DecoderError, DecoderResult};

/// KGM v5 cipher. The key is not in the file: an auxiliary database shipped
/// with the client maps the media file name to an ekey, which then goes
/// through the QQ Music derivation and cipher family.
pub struct KgmCryptoV5 {
    inner: V5Inner,
}

enum V5Inner {
    Map(MapCipher),
    Rc4(Rc4Cipher),
}

impl KgmCryptoV5 {
    pub fn new(file_name: &str, db_path: Option<&Path>) -> DecoderResult<Self> {
        let db_path = db_path.ok_or_else(|| {
            DecoderError::key_unavailable(
                "kgm",
                "crypto version 5 requires the client key database (--kgg-db)",
            )
        })?;
        let db = KggKeyDb::open(db_path)?;
        let ekey = db.ekey_for(file_name)?.ok_or_else(|| {
            DecoderError::key_unavailable(
                "kgm",
                format!("no key database entry for '{}'", file_name),
            )
        })?;
        let key = derive_key(ekey.as_bytes())?;
        let inner = if key.len() > 300 {
            V5Inner::Rc4(Rc4Cipher::new(key)?)
        } else {
            V5Inner::Map(MapCipher::new(key)?)
        };
        Ok(Self { inner })
    }
}

impl StreamCipher for KgmCryptoV5 {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        match &self.inner {
            V5Inner::Map(c) => c.decrypt(buf, offset),
            V5Inner::Rc4(c) => c.decrypt(buf, offset),
        }
    }
}

/// Opaque `file_name -> ekey` lookup over the client's SQLite database.
pub struct KggKeyDb {
    conn: rusqlite::Connection,
}

impl KggKeyDb {
    pub fn open(path: &Path) -> DecoderResult<Self> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(|e| {
            DecoderError::key_unavailable("kgm", format!("open key database: {}", e))
        })?;
        Ok(Self { conn })
    }

    pub fn ekey_for(&self, file_name: &str) -> DecoderResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ekey FROM file_keys WHERE file_name = ?1")
            .map_err(|e| {
                DecoderError::key_unavailable("kgm", format!("query key database: {}", e))
            })?;
        let mut rows = stmt.query([file_name]).map_err(|e| {
            DecoderError::key_unavailable("kgm", format!("query key database: {}", e))
        })?;
        match rows.next().map_err(|e| {
            DecoderError::key_unavailable("kgm", format!("query key database: {}", e))
        })? {
            Some(row) => Ok(Some(row.get(0).map_err(|e| {
                DecoderError::key_unavailable("kgm", format!("query key database: {}", e))
            })?)),
            None => Ok(None),
        }
    }
}
