pub mod dispatch;
pub mod interface;
pub mod lexicon;
pub mod meta;
pub mod raw;

pub use dispatch::*;
pub use interface::*;
pub use meta::{
    format_output_filename, parse_filename_meta, wrap_meta_with_filename, FilenameMeta,
    MetaWrapper, NameFormat, NamingFormat,
};
