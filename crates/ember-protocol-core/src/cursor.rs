use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, BufMut, BytesMut};
use uuid::Uuid;

/// All multi-byte values on the wire are little-endian, per §6.

pub fn read_u8(buf: &mut BytesMut) -> ProtocolResult<u8> {
    if buf.remaining() < 1 {
        return Err(ProtocolError::Truncated("u8"));
    }
    Ok(buf.get_u8())
}

pub fn write_u8(buf: &mut BytesMut, v: u8) {
    buf.put_u8(v);
}

pub fn read_i8(buf: &mut BytesMut) -> ProtocolResult<i8> {
    Ok(read_u8(buf)? as i8)
}

pub fn write_i8(buf: &mut BytesMut, v: i8) {
    buf.put_i8(v);
}

macro_rules! fixed_width_rw {
    ($read:ident, $write:ident, $ty:ty, $get:ident, $put:ident, $width:expr) => {
        pub fn $read(buf: &mut BytesMut) -> ProtocolResult<$ty> {
            if buf.remaining() < $width {
                return Err(ProtocolError::Truncated(stringify!($ty)));
            }
            Ok(buf.$get())
        }

        pub fn $write(buf: &mut BytesMut, v: $ty) {
            buf.$put(v);
        }
    };
}

fixed_width_rw!(read_u16, write_u16, u16, get_u16_le, put_u16_le, 2);
fixed_width_rw!(read_i16, write_i16, i16, get_i16_le, put_i16_le, 2);
fixed_width_rw!(read_u32, write_u32, u32, get_u32_le, put_u32_le, 4);
fixed_width_rw!(read_i32, write_i32, i32, get_i32_le, put_i32_le, 4);
fixed_width_rw!(read_u64, write_u64, u64, get_u64_le, put_u64_le, 8);
fixed_width_rw!(read_i64, write_i64, i64, get_i64_le, put_i64_le, 8);
fixed_width_rw!(read_f32, write_f32, f32, get_f32_le, put_f32_le, 4);
fixed_width_rw!(read_f64, write_f64, f64, get_f64_le, put_f64_le, 8);

/// A monotonic tick count or epoch-millis counter; each packet declares which
/// interpretation applies. Always a fixed 8-byte unsigned value on the wire.
pub fn read_instant(buf: &mut BytesMut) -> ProtocolResult<u64> {
    read_u64(buf)
}

pub fn write_instant(buf: &mut BytesMut, v: u64) {
    write_u64(buf, v);
}

/// Read a VarInt (7-bit groups, MSB continuation). Terminates in at most 5 bytes.
pub fn read_varint(buf: &mut BytesMut) -> ProtocolResult<i32> {
    let mut result: i32 = 0;
    let mut shift: u32 = 0;
    loop {
        if shift >= 35 {
            return Err(ProtocolError::VarIntTooBig);
        }
        if buf.remaining() < 1 {
            return Err(ProtocolError::Truncated("varint"));
        }
        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as i32) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub fn write_varint(buf: &mut BytesMut, mut value: i32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value = ((value as u32) >> 7) as i32;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn varint_len(value: i32) -> usize {
    let mut val = value as u32;
    let mut len = 0;
    loop {
        len += 1;
        val >>= 7;
        if val == 0 {
            break;
        }
    }
    len
}

/// Read a VarLong. Terminates in at most 10 bytes.
pub fn read_varlong(buf: &mut BytesMut) -> ProtocolResult<i64> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    loop {
        if shift >= 70 {
            return Err(ProtocolError::VarLongTooBig);
        }
        if buf.remaining() < 1 {
            return Err(ProtocolError::Truncated("varlong"));
        }
        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as i64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub fn write_varlong(buf: &mut BytesMut, mut value: i64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value = ((value as u64) >> 7) as i64;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Copy exactly N bytes out of the buffer.
pub fn read_fixed_bytes(buf: &mut BytesMut, n: usize) -> ProtocolResult<Vec<u8>> {
    if buf.remaining() < n {
        return Err(ProtocolError::Truncated("fixed bytes"));
    }
    Ok(buf.split_to(n).to_vec())
}

pub fn write_fixed_bytes(buf: &mut BytesMut, data: &[u8]) {
    buf.put_slice(data);
}

/// A length-prefixed UTF-8 string (VarInt byte length, then bytes).
/// `max_len` bounds the *byte* length, per §4.1.
pub fn read_string(
    buf: &mut BytesMut,
    field: &'static str,
    max_len: usize,
) -> ProtocolResult<String> {
    let len = read_varint(buf)? as usize;
    if len > max_len {
        return Err(ProtocolError::InvalidLength {
            field,
            len,
            max: max_len,
        });
    }
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated(field));
    }
    let bytes = buf.split_to(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::BadEncoding(field))
}

pub fn write_string(buf: &mut BytesMut, s: &str) {
    write_varint(buf, s.len() as i32);
    buf.put_slice(s.as_bytes());
}

pub fn string_len(s: &str) -> usize {
    varint_len(s.len() as i32) + s.len()
}

/// A UUID is always 16 raw bytes, no length prefix.
pub fn read_uuid(buf: &mut BytesMut) -> ProtocolResult<Uuid> {
    if buf.remaining() < 16 {
        return Err(ProtocolError::Truncated("uuid"));
    }
    let mut bytes = [0u8; 16];
    buf.copy_to_slice(&mut bytes);
    Ok(Uuid::from_bytes(bytes))
}

pub fn write_uuid(buf: &mut BytesMut, uuid: &Uuid) {
    buf.put_slice(uuid.as_bytes());
}

/// Read a VarInt-prefixed byte array (distinct from a string: no UTF-8 check).
pub fn read_byte_array(
    buf: &mut BytesMut,
    field: &'static str,
    max_len: usize,
) -> ProtocolResult<Vec<u8>> {
    let len = read_varint(buf)? as usize;
    if len > max_len {
        return Err(ProtocolError::InvalidLength {
            field,
            len,
            max: max_len,
        });
    }
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(buf.split_to(len).to_vec())
}

pub fn write_byte_array(buf: &mut BytesMut, data: &[u8]) {
    write_varint(buf, data.len() as i32);
    buf.put_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip_matches_known_encodings() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (25565, &[0xDD, 0xC7, 0x01]),
            (-1, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
        ];
        for (value, bytes) in cases {
            let mut buf = BytesMut::new();
            write_varint(&mut buf, *value);
            assert_eq!(&buf[..], *bytes);
            let mut reread = BytesMut::from(*bytes);
            assert_eq!(read_varint(&mut reread).unwrap(), *value);
        }
    }

    #[test]
    fn varint_over_length_is_rejected() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01][..]);
        assert_eq!(read_varint(&mut buf), Err(ProtocolError::VarIntTooBig));
    }

    #[test]
    fn string_over_max_len_is_rejected() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "hello world");
        let err = read_string(&mut buf, "field", 4).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength { .. }));
    }

    #[test]
    fn truncated_buffer_never_panics() {
        let mut buf = BytesMut::from(&[0x01][..]);
        assert_eq!(read_u64(&mut buf), Err(ProtocolError::Truncated("u64")));
    }

    #[test]
    fn uuid_roundtrips() {
        let uuid = Uuid::from_u128(0x1234_5678_9abc_def0_1122_3344_5566_7788);
        let mut buf = BytesMut::new();
        write_uuid(&mut buf, &uuid);
        assert_eq!(read_uuid(&mut buf).unwrap(), uuid);
    }
}
