use bytes::BytesMut;
use ember_protocol_core::{
    read_f32, read_i32, read_instant, read_u64, write_f32, write_i32, write_instant, write_u64,
    NullableBitField, Packet, ProtocolResult,
};
use ember_types::BlockPos;

/// `BlockDamageUpdate(166)` (supplemental, §4.2). Produced by `BlockHealth`'s
/// mutators for every change that needs to reach observers. No optional
/// fields, so no NBF is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockDamageUpdate {
    pub position: BlockPos,
    pub health: f32,
    pub last_damage_instant: u64,
}

impl Packet for BlockDamageUpdate {
    const ID: i32 = 166;

    fn computed_size(&self) -> usize {
        8 + 4 + 8
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_u64(buf, self.position.encode());
        write_f32(buf, self.health);
        write_instant(buf, self.last_damage_instant);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let position = BlockPos::decode(read_u64(buf)?);
        let health = read_f32(buf)?;
        let last_damage_instant = read_instant(buf)?;
        Ok(Self {
            position,
            health,
            last_damage_instant,
        })
    }
}

/// `BlockSetUpdate(167)` (supplemental, §4.2). Covers both filler-block
/// placement/breakage and fragile-block destruction. `cause_entity_id` is a
/// fixed-width optional field (no variable tail needed, so no offset
/// indirection — the NBF bit alone says whether to trust it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSetUpdate {
    pub position: BlockPos,
    pub block_type_id: i32,
    pub cause_entity_id: Option<i32>,
}

impl Packet for BlockSetUpdate {
    const ID: i32 = 167;

    fn computed_size(&self) -> usize {
        NullableBitField::width_for(1) + 8 + 4 + 4
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(1);
        nbf.set(0, self.cause_entity_id.is_some());
        nbf.write(buf);

        write_u64(buf, self.position.encode());
        write_i32(buf, self.block_type_id);
        write_i32(buf, self.cause_entity_id.unwrap_or(0));
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 1)?;
        let position = BlockPos::decode(read_u64(buf)?);
        let block_type_id = read_i32(buf)?;
        let raw_cause = read_i32(buf)?;
        let cause_entity_id = if nbf.is_set(0) { Some(raw_cause) } else { None };
        Ok(Self {
            position,
            block_type_id,
            cause_entity_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_damage_update_round_trips() {
        let packet = BlockDamageUpdate {
            position: BlockPos::new(1, 2, 3),
            health: 0.25,
            last_damage_instant: 9001,
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        assert_eq!(BlockDamageUpdate::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn block_set_update_round_trips_with_and_without_cause() {
        for cause in [None, Some(42)] {
            let packet = BlockSetUpdate {
                position: BlockPos::new(-1, 64, 10),
                block_type_id: 7,
                cause_entity_id: cause,
            };
            let mut buf = BytesMut::new();
            packet.serialize(&mut buf).unwrap();
            assert_eq!(BlockSetUpdate::deserialize(&mut buf).unwrap(), packet);
        }
    }
}
