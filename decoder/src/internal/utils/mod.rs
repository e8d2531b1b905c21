pub mod crypto;

pub use self::crypto::*;
