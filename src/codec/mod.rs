//! Codec Module
//!
//! Bidirectional mapping between a typed record and the byte blob stored in a
//! data file. Codecs are supplied by the caller; a few common ones ship here.
//!
//! ## Contract
//! - `decode(encode(v))` must yield a value equal to `v`
//! - `decode` may fail on corrupt or incompatible bytes; the persistent buffer
//!   treats such a record as absent and keeps serving the others

mod builtin;

pub use builtin::{BincodeCodec, BytesCodec, RawCodec, StringCodec};

use std::sync::Arc;

use crate::error::Result;

/// Converts records to and from their stored byte form
pub trait Codec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

impl<T, C: Codec<T> + ?Sized> Codec<T> for Arc<C> {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        (**self).encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        (**self).decode(bytes)
    }
}

impl<T, C: Codec<T> + ?Sized> Codec<T> for Box<C> {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        (**self).encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        (**self).decode(bytes)
    }
}
