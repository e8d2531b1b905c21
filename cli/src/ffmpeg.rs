//! External muxer invocation. ffmpeg is treated as an opaque subprocess:
//! it receives a decrypted temp file, an optional cover temp file and a
//! metadata record, and produces the tagged output.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use decoder::internal::sniff;
use decoder::AudioMeta;

use crate::process_error::ProcessError;

/// Budget for in-process metadata and cover retrieval.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for one muxer invocation.
pub const MUX_TIMEOUT: Duration = Duration::from_secs(60);

pub struct UpdateMetadataParams<'a> {
    pub audio: &'a Path,
    pub audio_ext: &'a str,
    pub meta: &'a dyn AudioMeta,
    pub album_art: Option<&'a [u8]>,
    pub album_art_ext: Option<&'a str>,
}

/// Mux `params.audio` into `out_path` with the metadata record applied.
pub fn update_meta(out_path: &Path, params: &UpdateMetadataParams) -> Result<(), ProcessError> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y");
    cmd.arg("-i").arg(params.audio);

    // cover art goes in as a second input; wav has no attached-image slot
    let _art_file = if let (Some(art), false) = (params.album_art, params.audio_ext == ".wav") {
        let suffix = params.album_art_ext.unwrap_or(".jpg");
        let mut tmp = tempfile::Builder::new()
            .prefix("um-cover-")
            .suffix(suffix)
            .tempfile()
            .map_err(|e| ProcessError::io(out_path, e))?;
        std::io::Write::write_all(&mut tmp, art).map_err(|e| ProcessError::io(out_path, e))?;
        cmd.arg("-i").arg(tmp.path());
        Some(tmp)
    } else {
        None
    };
    let has_art = _art_file.is_some();

    cmd.arg("-map").arg("0:a");
    cmd.arg("-codec:a").arg("copy");

    if has_art {
        cmd.arg("-map").arg("1:v");
        match params.audio_ext {
            ".ogg" => {
                cmd.arg("-codec:v").arg("libtheora");
            }
            ".m4a" => {
                cmd.arg("-codec:v").arg("mjpeg");
                cmd.arg("-disposition:v").arg("attached_pic");
                cmd.arg("-metadata:s:v").arg("title=Album cover");
                cmd.arg("-metadata:s:v").arg("comment=Cover (front)");
            }
            ".mp3" => {
                cmd.arg("-codec:v").arg("mjpeg");
                cmd.arg("-metadata:s:v").arg("title=Album cover");
                cmd.arg("-metadata:s:v").arg("comment=Cover (front)");
            }
            _ => {}
        }
    }

    let album = params.meta.album();
    if !album.is_empty() {
        cmd.arg("-metadata").arg(format!("album={}", album));
    }
    let title = params.meta.title();
    if !title.is_empty() {
        cmd.arg("-metadata").arg(format!("title={}", title));
    }
    let artists = params.meta.artists();
    if !artists.is_empty() {
        set_artists(&mut cmd, &artists, params.audio_ext);
    }

    if params.audio_ext == ".mp3" {
        cmd.arg("-write_id3v1").arg("true");
        cmd.arg("-id3v2_version").arg("3");
    }

    cmd.arg(out_path);
    run_with_timeout(cmd, MUX_TIMEOUT, out_path)
}

/// Multi-artist fields are joined with "; " for containers without a
/// native list representation.
fn set_artists(cmd: &mut Command, artists: &[String], audio_ext: &str) {
    let joined = artists.join("; ");
    cmd.arg("-metadata").arg(format!("artist={}", joined));
    if artists.len() > 1 && matches!(audio_ext, ".mp3" | ".m4a" | ".mp4") {
        cmd.arg("-metadata").arg(format!("albumartist={}", joined));
    }
}

/// Sniff a cover image's extension, shared by the single-file and batch
/// paths.
pub fn cover_extension(cover: &[u8]) -> Option<&'static str> {
    sniff::image_extension(cover)
}

fn run_with_timeout(mut cmd: Command, timeout: Duration, out_path: &Path) -> Result<(), ProcessError> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| ProcessError::MuxerFailed {
        path: out_path.to_path_buf(),
        reason: format!("spawn ffmpeg: {}", e),
    })?;
    let stderr_reader = drain_thread(child.stderr.take());
    let stdout_reader = drain_thread(child.stdout.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    kill_quietly(&mut child);
                    return Err(ProcessError::Timeout {
                        operation: "muxer",
                        seconds: timeout.as_secs(),
                        path: out_path.to_path_buf(),
                    });
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                kill_quietly(&mut child);
                return Err(ProcessError::MuxerFailed {
                    path: out_path.to_path_buf(),
                    reason: format!("wait ffmpeg: {}", e),
                });
            }
        }
    };

    let stderr = stderr_reader.join().unwrap_or_default();
    let _ = stdout_reader.join();
    if !status.success() {
        return Err(ProcessError::MuxerFailed {
            path: out_path.to_path_buf(),
            reason: format!(
                "ffmpeg exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr)
            ),
        });
    }
    Ok(())
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain_thread<R: Read + Send + 'static>(
    reader: Option<R>,
) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kills_subprocess() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let started = Instant::now();
        let err = run_with_timeout(cmd, Duration::from_millis(200), Path::new("/tmp/out.mp3"))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_nonzero_exit_is_muxer_failed() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo oops >&2; exit 3");
        let err = run_with_timeout(cmd, Duration::from_secs(5), Path::new("/tmp/out.mp3"))
            .unwrap_err();
        match err {
            ProcessError::MuxerFailed { reason, .. } => assert!(reason.contains("oops")),
            other => panic!("expected MuxerFailed, got {:?}", other),
        }
    }
}
