//! Output format classification from decrypted head bytes.
//!
//! The rule order is load-bearing: Ogg and FLAC streams routinely contain
//! byte runs that a naive MPEG frame search would accept, so the MP3 probe
//! runs last.

const WMA_GUID: [u8; 16] = [
    0x30, 0x26, 0xb2, 0x75, 0x8e, 0x66, 0xcf, 0x11, 0xa6, 0xd9, 0x00, 0xaa, 0x00, 0x62, 0xce, 0x6c,
];

/// Sniff the known audio types from `header` (at least 16 bytes
/// recommended) and return the matching file extension.
pub fn audio_extension(header: &[u8]) -> Option<&'static str> {
    if header.starts_with(b"OggS") {
        return Some(".ogg");
    }
    if header.starts_with(b"fLaC") {
        return Some(".flac");
    }
    if header.starts_with(b"RIFF") {
        return Some(".wav");
    }
    if header.starts_with(b"FRM8") {
        return Some(".dff");
    }
    if header.starts_with(&WMA_GUID) {
        return Some(".wma");
    }
    if let Some(ftyp) = read_mpeg4_ftyp_box(header) {
        if ftyp.major_brand == *b"M4A " || ftyp.compatible_brands.iter().any(|b| b == b"M4A ") {
            return Some(".m4a");
        }
        return Some(".mp4");
    }
    if sniff_mp3(header) {
        return Some(".mp3");
    }
    None
}

pub fn audio_extension_with_fallback(header: &[u8], fallback: &str) -> String {
    audio_extension(header)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Like [`audio_extension_with_fallback`], but infers the fallback from the
/// input container extension when sniffing fails.
pub fn audio_extension_with_smart_fallback(header: &[u8], input_ext: &str) -> String {
    match audio_extension(header) {
        Some(ext) => ext.to_string(),
        None => smart_fallback(input_ext).to_string(),
    }
}

fn smart_fallback(input_ext: &str) -> &'static str {
    let ext = input_ext.trim_start_matches('.');
    if ext.starts_with("mgg") || ext == "qmcogg" {
        return ".ogg";
    }
    if ext.starts_with("mflac") || ext == "qmcflac" {
        return ".flac";
    }
    ".mp3"
}

struct Mpeg4FtypBox {
    major_brand: [u8; 4],
    compatible_brands: Vec<[u8; 4]>,
}

fn read_mpeg4_ftyp_box(header: &[u8]) -> Option<Mpeg4FtypBox> {
    if header.len() < 8 || &header[4..8] != b"ftyp" {
        return None;
    }
    let size = u32::from_be_bytes(header[0..4].try_into().unwrap());
    if size < 16 || size % 4 != 0 {
        return None;
    }
    let mut compatible_brands = Vec::new();
    let mut i = 16;
    while i + 4 <= header.len().min(size as usize) {
        compatible_brands.push(header[i..i + 4].try_into().unwrap());
        i += 4;
    }
    Some(Mpeg4FtypBox {
        major_brand: header[8..12].try_into().unwrap(),
        compatible_brands,
    })
}

fn sniff_mp3(header: &[u8]) -> bool {
    if header.starts_with(b"ID3") {
        return true;
    }
    is_valid_mp3_frame(header)
}

/// Validate an MPEG audio frame header in the leading four bytes: 11 sync
/// bits, non-reserved version and layer, non-free and non-reserved bitrate,
/// non-reserved sampling rate.
fn is_valid_mp3_frame(frame: &[u8]) -> bool {
    if frame.len() < 4 {
        return false;
    }
    if frame[0] != 0xFF || (frame[1] & 0xE0) != 0xE0 {
        return false;
    }
    let version = (frame[1] >> 3) & 0x03;
    if version == 1 {
        return false;
    }
    let layer = (frame[1] >> 1) & 0x03;
    if layer == 0 {
        return false;
    }
    let bitrate = (frame[2] >> 4) & 0x0F;
    if bitrate == 0 || bitrate == 15 {
        return false;
    }
    let sampling = (frame[2] >> 2) & 0x03;
    sampling != 3
}

// cover image classification

pub fn image_mime(header: &[u8]) -> Option<&'static str> {
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if header.starts_with(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n']) {
        return Some("image/png");
    }
    if header.starts_with(b"BM") {
        return Some("image/bmp");
    }
    if header.starts_with(b"RIFF") {
        return Some("image/webp");
    }
    if header.starts_with(b"GIF8") {
        return Some("image/gif");
    }
    None
}

pub fn image_extension(header: &[u8]) -> Option<&'static str> {
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(".jpg");
    }
    if header.starts_with(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n']) {
        return Some(".png");
    }
    if header.starts_with(b"BM") {
        return Some(".bmp");
    }
    if header.starts_with(b"RIFF") {
        return Some(".webp");
    }
    if header.starts_with(b"GIF8") {
        return Some(".gif");
    }
    None
}
