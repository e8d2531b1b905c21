pub mod kgm;
pub mod kgm_header;
pub mod kgm_v3;
pub mod kgm_v5;

pub use kgm::KgmDecoder;
