pub mod cipher_map;
pub mod cipher_rc4;
pub mod cipher_static;
pub mod key_derive;
pub mod qmc;
pub mod tea;
pub mod vault;

pub use qmc::QmcDecoder;
