use std::io::{Read, Seek};
use std::path::PathBuf;

/// Seekable byte source a decoder takes ownership of.
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Everything a decoder factory needs to construct a decoder.
pub struct DecoderParams {
    pub reader: Box<dyn ReadSeek>,
    pub file_path: PathBuf,
    /// Lowercased extension without the leading dot.
    pub extension: String,
    /// Auxiliary key database for KGG v5 files.
    pub kgg_db_path: Option<PathBuf>,
}

/// Position-addressable byte transform.
///
/// `offset` is the plaintext offset of `buf[0]`; byte `i` of the stream must
/// decrypt identically no matter how reads are partitioned.
pub trait StreamCipher {
    fn decrypt(&self, buf: &mut [u8], offset: usize);
}

pub trait AudioMeta: Send {
    fn title(&self) -> String;
    fn album(&self) -> String;
    fn artists(&self) -> Vec<String>;
}
