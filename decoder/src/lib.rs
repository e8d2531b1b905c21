//! Streaming decryption engine for DRM-protected audio containers.
//!
//! A file path enters the registry, which picks candidate decoders by
//! extension; the first whose `validate` succeeds yields a byte stream
//! whose `Read` applies the cipher. The first plaintext bytes feed the
//! output sniffer to decide the real audio extension.

pub mod algo;
pub mod error;
pub mod internal;

pub use algo::common::meta::{format_output_filename, parse_filename_meta, NamingFormat};
pub use algo::{dispatch, resolve, AudioMeta, Decoder, DecoderParams};
pub use error::{DecoderError, DecoderResult};

use std::fs::File;
use std::path::{Path, PathBuf};

/// Open `path` and dispatch it through the registry. Returns the decoder
/// and the factory that resolved it (its suffix tells the caller what to
/// strip from the output name).
pub fn open_file(
    path: &Path,
    skip_noop: bool,
    kgg_db_path: Option<PathBuf>,
) -> DecoderResult<(Decoder, &'static algo::DecoderFactory)> {
    let path_str = path.to_string_lossy();
    let factories = algo::resolve(&path_str, skip_noop);
    if factories.is_empty() {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        return Err(DecoderError::UnsupportedExtension(ext));
    }
    let file = File::open(path)?;
    let params = DecoderParams {
        reader: Box::new(file),
        file_path: path.to_path_buf(),
        extension: factories[0].suffix.to_string(),
        kgg_db_path,
    };
    algo::dispatch(params, &factories)
}
