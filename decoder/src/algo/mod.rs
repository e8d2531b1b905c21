pub mod common;
pub mod kgm;
pub mod kwm;
pub mod ncm;
pub mod qmc;
pub mod tm;
pub mod xiami;

pub use common::{
    dispatch, registry, resolve, AudioMeta, Decoder, DecoderFactory, DecoderKind, DecoderParams,
    ReadSeek, StreamCipher,
};
