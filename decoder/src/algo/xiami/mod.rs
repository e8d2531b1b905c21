pub mod xm;
pub mod xm_cipher;

pub use xm::XmDecoder;
