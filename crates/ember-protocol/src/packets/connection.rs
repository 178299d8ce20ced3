use bytes::BytesMut;
use ember_protocol_core::{
    read_byte_array, read_fixed_bytes, read_string, read_u32, read_u8, read_uuid, write_byte_array,
    write_fixed_bytes, write_string, write_u32, write_u8, write_uuid, NullableBitField, Packet,
    ProtocolError, ProtocolResult, VarOffsetReader, VarOffsetWriter,
};
use uuid::Uuid;

/// Width of the protocol-fingerprint field, NUL-padded (§9 open-question
/// resolution: NUL over space padding, enforced identically on both peers).
pub const FINGERPRINT_WIDTH: usize = 64;
const LOCALE_WIDTH: usize = 8;
const MAX_USERNAME_LEN: usize = 16;
const MAX_IDENTITY_TOKEN_LEN: usize = 4096;
const MAX_CONNECT_VARIABLE_SIZE: u32 = (MAX_USERNAME_LEN + MAX_IDENTITY_TOKEN_LEN + 16) as u32;

/// Encode a protocol-version fingerprint into the fixed 64-byte NUL-padded slot.
pub fn encode_fingerprint(fingerprint: &str) -> [u8; FINGERPRINT_WIDTH] {
    let mut out = [0u8; FINGERPRINT_WIDTH];
    let bytes = fingerprint.as_bytes();
    let n = bytes.len().min(FINGERPRINT_WIDTH);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Decode a fixed 64-byte NUL-padded fingerprint slot back to a string,
/// trimming the NUL padding.
pub fn decode_fingerprint(raw: &[u8; FINGERPRINT_WIDTH]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// `Connect(0)`. From client: protocol fingerprint, identity, optional username
/// and identity token.
#[derive(Debug, Clone, PartialEq)]
pub struct Connect {
    pub protocol_fingerprint: [u8; FINGERPRINT_WIDTH],
    pub uuid: Uuid,
    pub locale: [u8; LOCALE_WIDTH],
    pub username: Option<String>,
    pub identity_token: Option<Vec<u8>>,
}

impl Connect {
    pub fn fingerprint_string(&self) -> String {
        decode_fingerprint(&self.protocol_fingerprint)
    }
}

impl Packet for Connect {
    const ID: i32 = 0;

    fn computed_size(&self) -> usize {
        let nbf_width = NullableBitField::width_for(2);
        let fixed = FINGERPRINT_WIDTH + 16 + LOCALE_WIDTH + 4 + 4;
        let variable = self.username.as_ref().map(|u| 1 + u.len()).unwrap_or(0)
            + self
                .identity_token
                .as_ref()
                .map(|t| 1 + t.len())
                .unwrap_or(0);
        nbf_width + fixed + variable
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(2);
        nbf.set(0, self.username.is_some());
        nbf.set(1, self.identity_token.is_some());
        nbf.write(buf);

        write_fixed_bytes(buf, &self.protocol_fingerprint);
        write_uuid(buf, &self.uuid);
        write_fixed_bytes(buf, &self.locale);

        let mut writer = VarOffsetWriter::new();
        let username_offset = match &self.username {
            Some(u) => writer.write_field(|b| write_string(b, u)),
            None => 0,
        };
        let token_offset = match &self.identity_token {
            Some(t) => writer.write_field(|b| write_byte_array(b, t)),
            None => 0,
        };

        write_u32(buf, username_offset);
        write_u32(buf, token_offset);

        let tail = writer.finish();
        if tail.len() as u32 > MAX_CONNECT_VARIABLE_SIZE {
            return Err(ProtocolError::SizeExceeded {
                size: tail.len(),
                max: MAX_CONNECT_VARIABLE_SIZE as usize,
            });
        }
        buf.extend_from_slice(&tail);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 2)?;

        let fingerprint_bytes = read_fixed_bytes(buf, FINGERPRINT_WIDTH)?;
        let mut protocol_fingerprint = [0u8; FINGERPRINT_WIDTH];
        protocol_fingerprint.copy_from_slice(&fingerprint_bytes);

        let uuid = read_uuid(buf)?;

        let locale_bytes = read_fixed_bytes(buf, LOCALE_WIDTH)?;
        let mut locale = [0u8; LOCALE_WIDTH];
        locale.copy_from_slice(&locale_bytes);

        let username_offset = read_u32(buf)?;
        let token_offset = read_u32(buf)?;

        let tail = buf.split_to(buf.len());
        let reader = VarOffsetReader::new(&tail, MAX_CONNECT_VARIABLE_SIZE);

        let username = if nbf.is_set(0) {
            Some(reader.read_field(username_offset, |b| {
                read_string(b, "username", MAX_USERNAME_LEN)
            })?)
        } else {
            None
        };
        let identity_token = if nbf.is_set(1) {
            Some(reader.read_field(token_offset, |b| {
                read_byte_array(b, "identity_token", MAX_IDENTITY_TOKEN_LEN)
            })?)
        } else {
            None
        };

        Ok(Self {
            protocol_fingerprint,
            uuid,
            locale,
            username,
            identity_token,
        })
    }
}

/// `DisconnectType` — integer discriminant per §9's explicit-enum requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisconnectType {
    Disconnect = 0,
    Crash = 1,
}

impl DisconnectType {
    fn from_u8(v: u8) -> ProtocolResult<Self> {
        match v {
            0 => Ok(Self::Disconnect),
            1 => Ok(Self::Crash),
            _ => Err(ProtocolError::BadEncoding("disconnect_type")),
        }
    }
}

pub const MAX_DISCONNECT_REASON_LEN: usize = 256;

/// `Disconnect(1)`. Bidirectional; carries a classification and a bounded
/// human-readable reason (§7: "a bounded UTF-8 reason string (≤ 256 bytes)").
#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    pub disconnect_type: DisconnectType,
    pub reason: Option<String>,
}

impl Disconnect {
    pub fn new(disconnect_type: DisconnectType, reason: impl Into<String>) -> Self {
        Self {
            disconnect_type,
            reason: Some(reason.into()),
        }
    }
}

impl Packet for Disconnect {
    const ID: i32 = 1;

    fn computed_size(&self) -> usize {
        let nbf_width = NullableBitField::width_for(1);
        let fixed = 1 + 4;
        let variable = self.reason.as_ref().map(|r| 1 + r.len()).unwrap_or(0);
        nbf_width + fixed + variable
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(1);
        nbf.set(0, self.reason.is_some());
        nbf.write(buf);

        write_u8(buf, self.disconnect_type as u8);

        let mut writer = VarOffsetWriter::new();
        let reason_offset = match &self.reason {
            Some(r) => writer.write_field(|b| write_string(b, r)),
            None => 0,
        };
        write_u32(buf, reason_offset);

        let tail = writer.finish();
        if tail.len() > 1 + MAX_DISCONNECT_REASON_LEN {
            return Err(ProtocolError::SizeExceeded {
                size: tail.len(),
                max: 1 + MAX_DISCONNECT_REASON_LEN,
            });
        }
        buf.extend_from_slice(&tail);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 1)?;
        let disconnect_type = DisconnectType::from_u8(read_u8(buf)?)?;
        let reason_offset = read_u32(buf)?;

        let tail = buf.split_to(buf.len());
        let reader = VarOffsetReader::new(&tail, (1 + MAX_DISCONNECT_REASON_LEN) as u32);

        let reason = if nbf.is_set(0) {
            Some(reader.read_field(reason_offset, |b| {
                read_string(b, "reason", MAX_DISCONNECT_REASON_LEN)
            })?)
        } else {
            None
        };

        Ok(Self {
            disconnect_type,
            reason,
        })
    }
}

/// `Ping(2)`. Fixed-layout: id, timestamp, and three reserved counters
/// (reserved for future latency-diagnostic fields; always zero today).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub id: i64,
    pub timestamp: u64,
    pub reserved: [u32; 3],
}

impl Ping {
    pub fn new(id: i64, timestamp: u64) -> Self {
        Self {
            id,
            timestamp,
            reserved: [0; 3],
        }
    }

    pub const WIRE_SIZE: usize = 8 + 8 + 4 * 3;
}

impl Packet for Ping {
    const ID: i32 = 2;

    fn computed_size(&self) -> usize {
        Self::WIRE_SIZE
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        ember_protocol_core::write_i64(buf, self.id);
        ember_protocol_core::write_instant(buf, self.timestamp);
        for r in self.reserved {
            ember_protocol_core::write_u32(buf, r);
        }
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let id = ember_protocol_core::read_i64(buf)?;
        let timestamp = ember_protocol_core::read_instant(buf)?;
        let mut reserved = [0u32; 3];
        for r in &mut reserved {
            *r = read_u32(buf)?;
        }
        Ok(Self {
            id,
            timestamp,
            reserved,
        })
    }
}

/// `PongType` — integer discriminant per §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PongType {
    Raw = 0,
    Direct = 1,
    Tick = 2,
}

impl PongType {
    fn from_u8(v: u8) -> ProtocolResult<Self> {
        match v {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Direct),
            2 => Ok(Self::Tick),
            _ => Err(ProtocolError::BadEncoding("pong_type")),
        }
    }
}

/// `Pong(3)`. Fixed 20 bytes total, derived as (§9 / DESIGN.md):
/// NBF(1) + id:i64(8) + timestamp:u64(8, zero if absent) + pong_type:u8(1) + reserved:u16(2) = 20.
/// The timestamp is a *fixed-width* optional field (no variable tail, so no
/// offset indirection is needed — only the NBF bit says whether to trust it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong {
    pub id: i64,
    pub timestamp: Option<u64>,
    pub pong_type: PongType,
}

impl Pong {
    pub const WIRE_SIZE: usize = 1 + 8 + 8 + 1 + 2;
}

impl Packet for Pong {
    const ID: i32 = 3;

    fn computed_size(&self) -> usize {
        Self::WIRE_SIZE
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(1);
        nbf.set(0, self.timestamp.is_some());
        nbf.write(buf);

        ember_protocol_core::write_i64(buf, self.id);
        ember_protocol_core::write_instant(buf, self.timestamp.unwrap_or(0));
        write_u8(buf, self.pong_type as u8);
        ember_protocol_core::write_u16(buf, 0);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 1)?;
        let id = ember_protocol_core::read_i64(buf)?;
        let raw_timestamp = ember_protocol_core::read_instant(buf)?;
        let pong_type = PongType::from_u8(read_u8(buf)?)?;
        let _reserved = ember_protocol_core::read_u16(buf)?;

        let timestamp = if nbf.is_set(0) {
            Some(raw_timestamp)
        } else {
            None
        };

        Ok(Self {
            id,
            timestamp,
            pong_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_round_trips_through_nul_padding() {
        let encoded = encode_fingerprint("proto-v1");
        assert_eq!(encoded.len(), FINGERPRINT_WIDTH);
        assert_eq!(decode_fingerprint(&encoded), "proto-v1");
        assert!(encoded[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn connect_round_trips_with_both_optionals_present() {
        let packet = Connect {
            protocol_fingerprint: encode_fingerprint(&"a".repeat(64)),
            uuid: Uuid::nil(),
            locale: *b"en_US\0\0\0",
            username: Some("Steve".to_string()),
            identity_token: Some(vec![1, 2, 3, 4]),
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        let decoded = Connect::deserialize(&mut buf).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn connect_round_trips_with_no_optionals() {
        let packet = Connect {
            protocol_fingerprint: encode_fingerprint("fp"),
            uuid: Uuid::new_v4(),
            locale: [0; 8],
            username: None,
            identity_token: None,
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        let decoded = Connect::deserialize(&mut buf).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn disconnect_round_trips_with_reason() {
        let packet = Disconnect::new(DisconnectType::Crash, "protocol version mismatch");
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        let decoded = Disconnect::deserialize(&mut buf).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn disconnect_round_trips_without_reason() {
        let packet = Disconnect {
            disconnect_type: DisconnectType::Disconnect,
            reason: None,
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        let decoded = Disconnect::deserialize(&mut buf).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn ping_is_fixed_size() {
        let packet = Ping::new(7, 1_000);
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), Ping::WIRE_SIZE);
        assert_eq!(Ping::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn pong_round_trips_with_and_without_timestamp() {
        for timestamp in [None, Some(42)] {
            let packet = Pong {
                id: 7,
                timestamp,
                pong_type: PongType::Tick,
            };
            let mut buf = BytesMut::new();
            packet.serialize(&mut buf).unwrap();
            assert_eq!(buf.len(), Pong::WIRE_SIZE);
            assert_eq!(Pong::deserialize(&mut buf).unwrap(), packet);
        }
    }
}
