//! The document codec (binary serialization/deserialization and type
//! system) is an external collaborator per spec §1: the driver only needs
//! "serialize a user value to bytes" and "deserialize bytes back to a
//! value". This module defines that seam.

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Clone, Debug, thiserror::Error)]
#[error("codec error: {0}")]
pub struct CodecError(pub String);

/// A decoded ledger document. Left intentionally opaque: the codec's type
/// system is out of scope, so the driver only carries the bytes it was
/// handed back by [`Codec::decode`] plus whatever the implementation wants
/// to attach to it.
pub type Document = Bytes;

/// Serializes parameters to document bytes and decodes document bytes back
/// into values. A real implementation wraps an Ion (or similar
/// self-describing binary format) codec; tests use a trivial identity
/// codec.
#[async_trait]
pub trait Codec: Send + Sync {
    fn encode(&self, value: &dyn Encodable) -> Result<Bytes, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError>;
}

/// Implemented by anything a caller may pass as a statement parameter.
pub trait Encodable: Send + Sync {
    fn to_bytes(&self) -> Result<Bytes, CodecError>;
}

impl<T: AsRef<[u8]> + Send + Sync> Encodable for T {
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(self.as_ref()))
    }
}

/// A codec that treats every parameter's raw bytes as already-encoded
/// document bytes and passes decoded bytes straight through. Useful for
/// tests and for callers who have already encoded their parameters.
#[derive(Clone, Copy, Default)]
pub struct IdentityCodec;

#[async_trait]
impl Codec for IdentityCodec {
    fn encode(&self, value: &dyn Encodable) -> Result<Bytes, CodecError> {
        value.to_bytes()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}
