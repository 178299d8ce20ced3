pub mod cursor;
pub mod error;
pub mod layout;
pub mod nbf;

pub use cursor::*;
pub use error::{ProtocolError, ProtocolResult, ValidationResult};
pub use layout::{VarOffsetReader, VarOffsetWriter};
pub use nbf::NullableBitField;

/// Every concrete packet type satisfies this capability set (§4.2): a wire
/// identifier, size computation, serialize/deserialize against a cursor, and
/// standalone pre-validation. One `impl Packet for X` per packet struct in
/// `ember-protocol`'s catalog.
pub trait Packet: Sized {
    /// Dense nonnegative identifier; unique within the reserved 0..512 range.
    const ID: i32;

    fn computed_size(&self) -> usize;

    fn serialize(&self, buf: &mut bytes::BytesMut) -> ProtocolResult<()>;

    fn deserialize(buf: &mut bytes::BytesMut) -> ProtocolResult<Self>;

    /// Identical traversal to `deserialize` but without populating a value.
    /// The default implementation is correct for every packet (deserialize
    /// and discard) but concrete types may override it to avoid the
    /// allocation when validation alone is needed on a hot path.
    fn validate(buf: &bytes::BytesMut) -> ValidationResult {
        let mut copy = buf.clone();
        let start_len = copy.len();
        match Self::deserialize(&mut copy) {
            Ok(_) => ValidationResult::Valid {
                bytes_consumed: start_len - copy.len(),
            },
            Err(e) => ValidationResult::Invalid(e),
        }
    }
}
