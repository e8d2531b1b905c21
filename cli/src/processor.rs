use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use decoder::algo::common::meta::wrap_meta_with_filename;
use decoder::internal::pool::{BufferPool, LARGE_BUFFER_SIZE};
use decoder::internal::sniff;
use decoder::{format_output_filename, AudioMeta};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache;
use crate::ffmpeg::{self, UpdateMetadataParams};
use crate::options::ProcessOptions;
use crate::process_error::ProcessError;

/// Plaintext head size fed to the output sniffer.
pub const HEADER_PROBE_SIZE: usize = 256;

pub struct Processor {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub options: ProcessOptions,
}

impl Processor {
    /// Recurse into `dir`, converting everything with a registered decoder.
    /// Individual failures are logged; the last one is returned.
    pub fn process_dir(&self, dir: &Path) -> anyhow::Result<()> {
        let mut last_error: Option<ProcessError> = None;
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            match self.process_file(entry.path()) {
                Ok(_) => {}
                Err(ProcessError::Decoder(decoder::DecoderError::UnsupportedExtension(_))) => {
                    debug!(source = %entry.path().display(), "no decoder registered, skipping");
                }
                Err(e) => {
                    warn!(source = %entry.path().display(), error = %e, "conversion failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(anyhow::anyhow!("last error: {}", e)),
            None => Ok(()),
        }
    }

    /// Decrypt one file. `Ok(Some(path))` on success, `Ok(None)` when the
    /// destination exists and overwriting is disabled.
    pub fn process_file(&self, input: &Path) -> Result<Option<PathBuf>, ProcessError> {
        let (mut dec, factory) = decoder::open_file(
            input,
            self.options.skip_noop,
            self.options.kgg_db_path.clone(),
        )?;
        debug!(source = %input.display(), family = dec.family(), "decoder resolved");

        // probe the plaintext head for format detection
        let mut probe = BufferPool::global().get(HEADER_PROBE_SIZE);
        let probe_len = read_full(&mut dec, &mut probe).map_err(|e| ProcessError::io(input, e))?;
        let input_ext = format!(
            ".{}",
            input
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_lowercase()
        );
        let audio_ext = sniff::audio_extension_with_smart_fallback(&probe[..probe_len], &input_ext);
        info!(source = %input.display(), input_ext, detected = %audio_ext, "format detection");

        let out_path = self.output_path_for(input, factory.suffix, &audio_ext);
        if !self.options.overwrite_output && out_path.exists() {
            warn!(destination = %out_path.display(), "output file already exists, skip");
            return Ok(None);
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProcessError::io(parent, e))?;
        }

        if self.options.update_metadata {
            self.write_with_metadata(input, &mut dec, &probe[..probe_len], &audio_ext, &out_path)?;
        } else {
            write_direct(&mut dec, &probe[..probe_len], input, &out_path)?;
        }

        if self.options.remove_source {
            std::fs::remove_file(input).map_err(|e| ProcessError::io(input, e))?;
            info!(source = %input.display(), "source file removed after success conversion");
        }
        info!(source = %input.display(), destination = %out_path.display(), "successfully converted");
        Ok(Some(out_path))
    }

    /// Output path: the stripped input stem run through the naming
    /// formatter, placed under the output dir at the input's relative
    /// location. The container extension never survives.
    pub fn output_path_for(&self, input: &Path, suffix: &str, audio_ext: &str) -> PathBuf {
        let stem = strip_registered_suffix(input, suffix);
        let out_name = format_output_filename(&stem, audio_ext, self.options.naming_format);
        let rel = input
            .parent()
            .and_then(|p| p.strip_prefix(&self.input_dir).ok())
            .unwrap_or_else(|| Path::new(""));
        self.output_dir.join(rel).join(out_name)
    }

    fn write_with_metadata(
        &self,
        input: &Path,
        dec: &mut decoder::Decoder,
        probe: &[u8],
        audio_ext: &str,
        out_path: &Path,
    ) -> Result<(), ProcessError> {
        // the muxer needs a real file, so spool the plaintext to a temp
        // file; it is removed on drop regardless of how we leave
        let mut temp = tempfile::Builder::new()
            .prefix("um-audio-")
            .suffix(audio_ext)
            .tempfile()
            .map_err(|e| ProcessError::io(out_path, e))?;
        spool_plaintext(dec, probe, temp.as_file_mut(), input)?;

        let gather_started = std::time::Instant::now();
        let file_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let meta: Box<dyn AudioMeta> = match cache::get(input) {
            Some(cached) => {
                debug!(source = %input.display(), "using cached metadata");
                Box::new(cached)
            }
            None => {
                let wrapped = wrap_meta_with_filename(dec.audio_meta(), file_name);
                cache::put(input, wrapped.as_ref());
                wrapped
            }
        };

        let cover = dec.cover_image();
        let cover_ext = cover.as_deref().and_then(ffmpeg::cover_extension);
        if cover.is_some() && cover_ext.is_none() {
            warn!(source = %input.display(), "sniff cover image type failed");
        }
        if gather_started.elapsed() > ffmpeg::METADATA_TIMEOUT {
            return Err(ProcessError::Timeout {
                operation: "metadata",
                seconds: ffmpeg::METADATA_TIMEOUT.as_secs(),
                path: input.to_path_buf(),
            });
        }

        ffmpeg::update_meta(
            out_path,
            &UpdateMetadataParams {
                audio: temp.path(),
                audio_ext,
                meta: meta.as_ref(),
                album_art: cover.as_deref().filter(|_| cover_ext.is_some()),
                album_art_ext: cover_ext,
            },
        )
    }
}

/// Strip the registered (possibly compound) suffix from the input's file
/// name, case-insensitively.
pub fn strip_registered_suffix(input: &Path, suffix: &str) -> String {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let dotted = format!(".{}", suffix);
    if file_name.len() > dotted.len()
        && file_name.to_lowercase().ends_with(&dotted.to_lowercase())
    {
        file_name[..file_name.len() - dotted.len()].to_string()
    } else {
        file_name.to_string()
    }
}

/// Fill `buf` as far as the stream allows; short files yield short probes.
pub fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn write_direct(
    dec: &mut decoder::Decoder,
    probe: &[u8],
    input: &Path,
    out_path: &Path,
) -> Result<(), ProcessError> {
    let mut out =
        std::fs::File::create(out_path).map_err(|e| ProcessError::io(out_path, e))?;
    out.write_all(probe)
        .map_err(|e| ProcessError::io(out_path, e))?;
    let mut copy_buf = BufferPool::global().get(LARGE_BUFFER_SIZE);
    loop {
        let n = dec.read(&mut copy_buf).map_err(|e| ProcessError::io(input, e))?;
        if n == 0 {
            break;
        }
        out.write_all(&copy_buf[..n])
            .map_err(|e| ProcessError::io(out_path, e))?;
    }
    out.flush().map_err(|e| ProcessError::io(out_path, e))?;
    Ok(())
}

/// Write the full plaintext to `out`. Seekable decoders restart from zero;
/// the rest prepend the already-consumed probe.
fn spool_plaintext(
    dec: &mut decoder::Decoder,
    probe: &[u8],
    out: &mut std::fs::File,
    input: &Path,
) -> Result<(), ProcessError> {
    match dec.seek_to_start() {
        Some(Ok(())) => {}
        _ => {
            out.write_all(probe).map_err(|e| ProcessError::io(input, e))?;
        }
    }
    let mut copy_buf = BufferPool::global().get(LARGE_BUFFER_SIZE);
    loop {
        let n = dec.read(&mut copy_buf).map_err(|e| ProcessError::io(input, e))?;
        if n == 0 {
            break;
        }
        out.write_all(&copy_buf[..n])
            .map_err(|e| ProcessError::io(input, e))?;
    }
    out.flush().map_err(|e| ProcessError::io(input, e))?;
    Ok(())
}
