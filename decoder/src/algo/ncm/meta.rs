use serde::Deserialize;
use serde_json::Value;

use crate::algo::common::AudioMeta;

pub trait NcmMeta: AudioMeta {
    fn format(&self) -> String;
}

#[derive(Clone, Default, Deserialize)]
pub struct NcmMetaMusic {
    #[serde(rename = "format", default)]
    pub format: String,
    #[serde(rename = "musicName", default)]
    pub music_name: String,
    /// Array of `[name, id]` pairs.
    #[serde(rename = "artist", default)]
    pub artist: Vec<Vec<Value>>,
    #[serde(rename = "album", default)]
    pub album: String,
    #[serde(rename = "albumPic", default)]
    pub album_pic: String,
    #[serde(rename = "bitrate", default)]
    pub bitrate: i64,
    #[serde(rename = "duration", default)]
    pub duration: i64,
}

impl NcmMeta for NcmMetaMusic {
    fn format(&self) -> String {
        self.format.clone()
    }
}

impl AudioMeta for NcmMetaMusic {
    fn title(&self) -> String {
        self.music_name.clone()
    }

    fn album(&self) -> String {
        self.album.clone()
    }

    fn artists(&self) -> Vec<String> {
        let mut out = Vec::new();
        for pair in &self.artist {
            if let Some(Value::String(name)) = pair.first() {
                out.push(name.clone());
            }
        }
        out
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct NcmMetaDj {
    #[serde(rename = "programName", default)]
    pub program_name: String,
    #[serde(rename = "mainMusic", default)]
    pub main_music: NcmMetaMusic,
    #[serde(rename = "djName", default)]
    pub dj_name: String,
    #[serde(rename = "brand", default)]
    pub brand: String,
    #[serde(rename = "radioName", default)]
    pub radio_name: String,
    #[serde(rename = "radioCategory", default)]
    pub radio_category: String,
}

impl NcmMeta for NcmMetaDj {
    fn format(&self) -> String {
        self.main_music.format()
    }
}

impl AudioMeta for NcmMetaDj {
    fn title(&self) -> String {
        if self.program_name.is_empty() {
            self.radio_name.clone()
        } else {
            self.program_name.clone()
        }
    }

    fn album(&self) -> String {
        if self.brand.is_empty() {
            self.radio_category.clone()
        } else {
            self.brand.clone()
        }
    }

    fn artists(&self) -> Vec<String> {
        if self.dj_name.is_empty() {
            self.main_music.artists()
        } else {
            vec![self.dj_name.clone()]
        }
    }
}
