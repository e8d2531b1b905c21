use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{DecoderError, DecoderResult};

use super::interface::{AudioMeta, DecoderParams, ReadSeek};

/// Concrete decoder families, dispatched by match.
#[derive(Debug)]
pub enum Decoder {
    Raw(super::raw::RawDecoder),
    Ncm(crate::algo::ncm::NcmDecoder),
    Qmc(crate::algo::qmc::QmcDecoder),
    Kgm(crate::algo::kgm::KgmDecoder),
    Kwm(crate::algo::kwm::KwmDecoder),
    Tm(crate::algo::tm::TmDecoder),
    Xm(crate::algo::xiami::XmDecoder),
}

impl Decoder {
    /// Parse the container header, derive the cipher and position the
    /// underlying reader at the first payload byte.
    pub fn validate(&mut self) -> DecoderResult<()> {
        match self {
            Decoder::Raw(d) => d.validate(),
            Decoder::Ncm(d) => d.validate(),
            Decoder::Qmc(d) => d.validate(),
            Decoder::Kgm(d) => d.validate(),
            Decoder::Kwm(d) => d.validate(),
            Decoder::Tm(d) => d.validate(),
            Decoder::Xm(d) => d.validate(),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            Decoder::Raw(_) => "raw",
            Decoder::Ncm(_) => "ncm",
            Decoder::Qmc(_) => "qmc",
            Decoder::Kgm(_) => "kgm",
            Decoder::Kwm(_) => "kwm",
            Decoder::Tm(_) => "tm",
            Decoder::Xm(_) => "xm",
        }
    }

    /// In-container metadata, for families that carry any.
    pub fn audio_meta(&self) -> Option<Box<dyn AudioMeta>> {
        match self {
            Decoder::Ncm(d) => Some(d.audio_meta()),
            _ => None,
        }
    }

    /// Embedded cover image, for families that carry one.
    pub fn cover_image(&self) -> Option<bytes::Bytes> {
        match self {
            Decoder::Ncm(d) => d.cover_image(),
            _ => None,
        }
    }

    /// Rewind to the start of the plaintext stream. `None` when the family
    /// does not support seeking.
    pub fn seek_to_start(&mut self) -> Option<std::io::Result<()>> {
        match self {
            Decoder::Qmc(d) => Some(d.seek(SeekFrom::Start(0)).map(|_| ())),
            Decoder::Raw(d) => Some(d.seek_to_start()),
            _ => None,
        }
    }

    /// Take the underlying reader back, so dispatch can hand it to the next
    /// candidate after a failed `validate`.
    pub fn into_reader(self) -> Box<dyn ReadSeek> {
        match self {
            Decoder::Raw(d) => d.into_reader(),
            Decoder::Ncm(d) => d.into_reader(),
            Decoder::Qmc(d) => d.into_reader(),
            Decoder::Kgm(d) => d.into_reader(),
            Decoder::Kwm(d) => d.into_reader(),
            Decoder::Tm(d) => d.into_reader(),
            Decoder::Xm(d) => d.into_reader(),
        }
    }
}

impl Read for Decoder {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Decoder::Raw(d) => d.read(buf),
            Decoder::Ncm(d) => d.read(buf),
            Decoder::Qmc(d) => d.read(buf),
            Decoder::Kgm(d) => d.read(buf),
            Decoder::Kwm(d) => d.read(buf),
            Decoder::Tm(d) => d.read(buf),
            Decoder::Xm(d) => d.read(buf),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderKind {
    Raw,
    Ncm,
    Qmc,
    Kgm,
    Kwm,
    Tm,
    Xm,
}

impl DecoderKind {
    pub fn create(self, params: DecoderParams) -> Decoder {
        match self {
            DecoderKind::Raw => Decoder::Raw(super::raw::RawDecoder::new(params)),
            DecoderKind::Ncm => Decoder::Ncm(crate::algo::ncm::NcmDecoder::new(params)),
            DecoderKind::Qmc => Decoder::Qmc(crate::algo::qmc::QmcDecoder::new(params)),
            DecoderKind::Kgm => Decoder::Kgm(crate::algo::kgm::KgmDecoder::new(params)),
            DecoderKind::Kwm => Decoder::Kwm(crate::algo::kwm::KwmDecoder::new(params)),
            DecoderKind::Tm => Decoder::Tm(crate::algo::tm::TmDecoder::new(params)),
            DecoderKind::Xm => Decoder::Xm(crate::algo::xiami::XmDecoder::new(params)),
        }
    }
}

#[derive(Debug)]
pub struct DecoderFactory {
    /// Lowercase extension without the leading dot; may be compound
    /// (`kgm.flac`).
    pub suffix: &'static str,
    /// Identity transform, skipped when `skip_noop` is requested.
    pub noop: bool,
    pub kind: DecoderKind,
}

static REGISTRY: OnceLock<Vec<DecoderFactory>> = OnceLock::new();

fn register(registry: &mut Vec<DecoderFactory>, suffix: &'static str, noop: bool, kind: DecoderKind) {
    registry.push(DecoderFactory { suffix, noop, kind });
}

/// The decoder registry, immutable after first use.
pub fn registry() -> &'static [DecoderFactory] {
    REGISTRY.get_or_init(|| {
        use DecoderKind::*;
        let mut r = Vec::new();
        // standard audio, passthrough
        for ext in ["mp3", "flac", "ogg", "m4a", "wav", "wma", "aac"] {
            register(&mut r, ext, true, Raw);
        }
        // Netease
        register(&mut r, "ncm", false, Ncm);
        // QQ Music MP3
        register(&mut r, "qmc0", false, Qmc);
        register(&mut r, "qmc3", false, Qmc);
        // QQ Music M4A
        register(&mut r, "qmc2", false, Qmc);
        register(&mut r, "qmc4", false, Qmc);
        register(&mut r, "qmc6", false, Qmc);
        register(&mut r, "qmc8", false, Qmc);
        // QQ Music FLAC / OGG
        register(&mut r, "qmcflac", false, Qmc);
        register(&mut r, "qmcogg", false, Qmc);
        // QQ Music Accompaniment M4A
        register(&mut r, "tkm", false, Qmc);
        // Moo Music
        for ext in ["bkcmp3", "bkcm4a", "bkcflac", "bkcwav", "bkcape", "bkcogg", "bkcwma"] {
            register(&mut r, ext, false, Qmc);
        }
        // QQ Music MP4 container, typically Dolby EAC3
        register(&mut r, "mmp4", false, Qmc);
        // QQ Music Weiyun, extensions stored as hex ASCII
        for ext in ["666c6163", "6d7033", "6f6767", "6d3461", "776176"] {
            register(&mut r, ext, false, Qmc);
        }
        // QQ Music new ogg, with per-platform suffix letters
        for ext in [
            "mgg", "mgg0", "mgg1", "mgg2", "mgg3", "mgg4", "mgg5", "mgg6", "mgg7", "mgg8",
            "mgg9", "mgga", "mggh", "mggl", "mggm",
        ] {
            register(&mut r, ext, false, Qmc);
        }
        // QQ Music new flac
        for ext in [
            "mflac", "mflac0", "mflac1", "mflac2", "mflac3", "mflac4", "mflac5", "mflac6",
            "mflac7", "mflac8", "mflac9", "mflaca", "mflach", "mflacl", "mflacm",
        ] {
            register(&mut r, ext, false, Qmc);
        }
        // Kugou
        register(&mut r, "kgm", false, Kgm);
        register(&mut r, "kgma", false, Kgm);
        register(&mut r, "kgg", false, Kgm);
        register(&mut r, "vpr", false, Kgm);
        register(&mut r, "kgm.flac", false, Kgm);
        register(&mut r, "vpr.flac", false, Kgm);
        // Kuwo, with a passthrough fallback for unencrypted files
        register(&mut r, "kwm", false, Kwm);
        register(&mut r, "kwm", false, Raw);
        // QQ Music iOS
        register(&mut r, "tm0", false, Tm);
        register(&mut r, "tm2", false, Tm);
        register(&mut r, "tm3", false, Tm);
        register(&mut r, "tm6", false, Tm);
        // Xiami
        register(&mut r, "xm", false, Xm);
        r
    })
}

/// Candidate factories for `path`, longest compound suffix first rule:
/// `song.kgm.flac` resolves the `kgm.flac` factories, not `flac`.
pub fn resolve(path: &str, skip_noop: bool) -> Vec<&'static DecoderFactory> {
    let filename = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_lowercase();

    let matches: Vec<&'static DecoderFactory> = registry()
        .iter()
        .filter(|f| filename.ends_with(&format!(".{}", f.suffix)))
        .filter(|f| !(skip_noop && f.noop))
        .collect();
    let Some(longest) = matches.iter().map(|f| f.suffix.len()).max() else {
        return Vec::new();
    };
    matches
        .into_iter()
        .filter(|f| f.suffix.len() == longest)
        .collect()
}

/// Try each candidate in order; the first whose `validate` succeeds wins.
/// Every failure is logged at warn level; only the terminal failure is
/// returned.
pub fn dispatch(
    params: DecoderParams,
    factories: &[&'static DecoderFactory],
) -> DecoderResult<(Decoder, &'static DecoderFactory)> {
    let DecoderParams {
        mut reader,
        file_path,
        extension,
        kgg_db_path,
    } = params;

    if factories.is_empty() {
        return Err(DecoderError::UnsupportedExtension(extension));
    }

    let mut last_error = String::new();
    for &factory in factories {
        let mut dec = factory.kind.create(DecoderParams {
            reader,
            file_path: file_path.clone(),
            extension: extension.clone(),
            kgg_db_path: kgg_db_path.clone(),
        });
        match dec.validate() {
            Ok(()) => return Ok((dec, factory)),
            Err(e) => {
                tracing::warn!(
                    source = %file_path.display(),
                    family = dec.family(),
                    error = %e,
                    "try decode failed"
                );
                last_error = e.to_string();
                reader = dec.into_reader();
            }
        }
    }
    Err(DecoderError::NoDecoderResolved {
        path: file_path,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_in_registration_order() {
        let a = resolve("a.kwm", false);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].kind, DecoderKind::Kwm);
        assert_eq!(a[1].kind, DecoderKind::Raw);
        // deterministic across invocations
        let b = resolve("a.kwm", false);
        assert_eq!(
            a.iter().map(|f| f.kind).collect::<Vec<_>>(),
            b.iter().map(|f| f.kind).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_resolve_longest_compound_suffix() {
        let m = resolve("song.kgm.flac", false);
        assert!(!m.is_empty());
        assert!(m.iter().all(|f| f.suffix == "kgm.flac"));
        let m = resolve("song.flac", false);
        assert!(m.iter().all(|f| f.suffix == "flac"));
    }

    #[test]
    fn test_resolve_skip_noop() {
        assert!(!resolve("x.mp3", false).is_empty());
        assert!(resolve("x.mp3", true).is_empty());
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let m = resolve("SONG.NCM", false);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].kind, DecoderKind::Ncm);
    }

    #[test]
    fn test_resolve_hex_alias_single_match() {
        let m = resolve("track.666c6163", false);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].suffix, "666c6163");
    }

    #[test]
    fn test_resolve_unknown() {
        assert!(resolve("file.xyz", false).is_empty());
    }

    use std::io::{Cursor, Read};
    use std::path::PathBuf;

    fn params_for(data: Vec<u8>, name: &str) -> DecoderParams {
        let ext = name.rsplit('.').next().unwrap_or_default().to_string();
        DecoderParams {
            reader: Box::new(Cursor::new(data)),
            file_path: PathBuf::from(name),
            extension: ext,
            kgg_db_path: None,
        }
    }

    /// Unencrypted audio renamed to .kwm must fall through the Kuwo
    /// decoder to the raw passthrough registered behind it.
    #[test]
    fn test_dispatch_falls_through_to_next_candidate() {
        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&[0u8; 60]);

        let factories = resolve("renamed.kwm", false);
        assert_eq!(factories.len(), 2);
        let (mut dec, factory) =
            dispatch(params_for(data.clone(), "renamed.kwm"), &factories).unwrap();
        assert_eq!(factory.kind, DecoderKind::Raw);
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_dispatch_terminal_error_carries_last_failure() {
        let factories = resolve("broken.kwm", false);
        let err = dispatch(params_for(vec![0u8; 2048], "broken.kwm"), &factories).unwrap_err();
        match err {
            DecoderError::NoDecoderResolved { path, last_error } => {
                assert_eq!(path, PathBuf::from("broken.kwm"));
                assert!(!last_error.is_empty());
            }
            other => panic!("expected NoDecoderResolved, got {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_empty_candidates_is_unsupported() {
        let err = dispatch(params_for(Vec::new(), "file.xyz"), &[]).unwrap_err();
        assert!(matches!(err, DecoderError::UnsupportedExtension(_)));
    }

    /// Reading through the wrapper in odd chunk sizes must equal reading
    /// it in one pass, for a cipher-backed family.
    #[test]
    fn test_streaming_partition_invariance_through_wrapper() {
        use crate::algo::common::StreamCipher;
        use crate::algo::qmc::cipher_static::StaticCipher;

        let mut plain = vec![0u8; 6000];
        plain[..3].copy_from_slice(b"ID3");
        for (i, b) in plain.iter_mut().enumerate().skip(3) {
            *b = (i % 191) as u8;
        }
        let cipher = StaticCipher;
        let mut ct = plain.clone();
        cipher.decrypt(&mut ct, 0);
        let n = ct.len();
        ct[n - 4..].copy_from_slice(&0x00100000u32.to_le_bytes());
        let mut tail = [0u8; 4];
        tail.copy_from_slice(&ct[n - 4..]);
        cipher.decrypt(&mut tail, n - 4);
        plain[n - 4..].copy_from_slice(&tail);

        let factories = resolve("song.qmc0", true);
        let (mut dec, _) = dispatch(params_for(ct.clone(), "song.qmc0"), &factories).unwrap();
        let mut whole = Vec::new();
        dec.read_to_end(&mut whole).unwrap();
        assert_eq!(whole, plain);

        for chunk_size in [1usize, 7, 255, 4096] {
            let factories = resolve("song.qmc0", true);
            let (mut dec, _) = dispatch(params_for(ct.clone(), "song.qmc0"), &factories).unwrap();
            let mut out = Vec::new();
            let mut buf = vec![0u8; chunk_size];
            loop {
                let n = dec.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&buf[..n]);
            }
            assert_eq!(out, plain, "chunk size {}", chunk_size);
        }
    }
}
