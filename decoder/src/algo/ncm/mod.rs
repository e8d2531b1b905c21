pub mod meta;
pub mod ncm;
pub mod ncm_cipher;

pub use ncm::NcmDecoder;
