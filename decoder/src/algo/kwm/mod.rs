pub mod kwm;
pub mod kwm_cipher;

pub use kwm::KwmDecoder;
