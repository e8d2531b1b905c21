use std::path::PathBuf;

use decoder::NamingFormat;
use serde::Deserialize;

/// Per-run processing options, shared by the single-file path and the
/// batch scheduler.
#[derive(Clone, Default)]
pub struct ProcessOptions {
    pub remove_source: bool,
    pub update_metadata: bool,
    pub overwrite_output: bool,
    pub skip_noop: bool,
    pub kgg_db_path: Option<PathBuf>,
    pub naming_format: NamingFormat,
}

/// Wire form of the options block in a batch request.
#[derive(Clone, Default, Deserialize)]
pub struct BatchOptions {
    #[serde(default)]
    pub remove_source: bool,
    #[serde(default)]
    pub update_metadata: bool,
    #[serde(default)]
    pub overwrite_output: bool,
    #[serde(default)]
    pub skip_noop: bool,
    #[serde(default)]
    pub kgg_db_path: Option<String>,
    #[serde(default)]
    pub naming_format: Option<String>,
}

impl BatchOptions {
    pub fn into_process_options(self) -> ProcessOptions {
        let naming_format = self
            .naming_format
            .as_deref()
            .unwrap_or("auto")
            .parse()
            .unwrap_or_default();
        ProcessOptions {
            remove_source: self.remove_source,
            update_metadata: self.update_metadata,
            overwrite_output: self.overwrite_output,
            skip_noop: self.skip_noop,
            kgg_db_path: self.kgg_db_path.map(PathBuf::from),
            naming_format,
        }
    }
}
