use crate::cursor::{read_fixed_bytes, write_fixed_bytes};
use crate::error::{ProtocolError, ProtocolResult};
use bytes::BytesMut;

/// A leading bitmask declaring which optional fields of a packet are present.
/// Bit `i` (LSB-first within the byte stream, little-endian across bytes) set
/// means "optional field `i` is present." `declared_bits` is the number of
/// optional fields the packet type actually has; any bit at or beyond that
/// index must be zero on read (§4.1 strict policy, to avoid forward-compat
/// ambiguity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullableBitField {
    bytes: Vec<u8>,
    declared_bits: usize,
}

impl NullableBitField {
    /// A field width of 0 bytes is valid for packets with no optional fields.
    pub fn width_for(declared_bits: usize) -> usize {
        declared_bits.div_ceil(8)
    }

    pub fn new(declared_bits: usize) -> Self {
        Self {
            bytes: vec![0u8; Self::width_for(declared_bits)],
            declared_bits,
        }
    }

    pub fn is_set(&self, bit: usize) -> bool {
        debug_assert!(bit < self.declared_bits);
        let byte = self.bytes[bit / 8];
        (byte >> (bit % 8)) & 1 == 1
    }

    pub fn set(&mut self, bit: usize, value: bool) {
        debug_assert!(bit < self.declared_bits);
        let mask = 1u8 << (bit % 8);
        if value {
            self.bytes[bit / 8] |= mask;
        } else {
            self.bytes[bit / 8] &= !mask;
        }
    }

    pub fn read(buf: &mut BytesMut, declared_bits: usize) -> ProtocolResult<Self> {
        let width = Self::width_for(declared_bits);
        let bytes = if width == 0 {
            Vec::new()
        } else {
            read_fixed_bytes(buf, width)?
        };
        let field = Self {
            bytes,
            declared_bits,
        };
        field.check_strict_zero()?;
        Ok(field)
    }

    pub fn write(&self, buf: &mut BytesMut) {
        write_fixed_bytes(buf, &self.bytes);
    }

    /// Bits beyond `declared_bits` within the last byte must read as zero.
    fn check_strict_zero(&self) -> ProtocolResult<()> {
        if self.declared_bits == 0 {
            return Ok(());
        }
        let last_byte_bits = self.declared_bits % 8;
        if last_byte_bits == 0 {
            return Ok(());
        }
        let last_byte = *self.bytes.last().unwrap();
        let valid_mask = (1u8 << last_byte_bits) - 1;
        if last_byte & !valid_mask != 0 {
            return Err(ProtocolError::Malformed(
                "nullable bit field has set bits beyond declared count",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_rounds_up_to_whole_bytes() {
        assert_eq!(NullableBitField::width_for(0), 0);
        assert_eq!(NullableBitField::width_for(1), 1);
        assert_eq!(NullableBitField::width_for(8), 1);
        assert_eq!(NullableBitField::width_for(9), 2);
    }

    #[test]
    fn set_and_is_set_roundtrip() {
        let mut nbf = NullableBitField::new(10);
        nbf.set(0, true);
        nbf.set(9, true);
        assert!(nbf.is_set(0));
        assert!(nbf.is_set(9));
        assert!(!nbf.is_set(1));
    }

    #[test]
    fn stray_bits_beyond_declared_count_are_malformed() {
        let mut buf = BytesMut::from(&[0b0000_0010u8][..]);
        // Only bit 0 is declared; bit 1 set is out of range.
        let err = NullableBitField::read(&mut buf, 1).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Malformed("nullable bit field has set bits beyond declared count")
        );
    }

    #[test]
    fn write_then_read_preserves_bits() {
        let mut nbf = NullableBitField::new(3);
        nbf.set(1, true);
        let mut buf = BytesMut::new();
        nbf.write(&mut buf);
        let reread = NullableBitField::read(&mut buf, 3).unwrap();
        assert_eq!(reread, nbf);
    }
}
