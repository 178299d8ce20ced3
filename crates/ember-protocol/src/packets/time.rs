use bytes::BytesMut;
use ember_protocol_core::{
    read_f32, read_instant, read_u8, write_f32, write_instant, write_u8, Packet, ProtocolResult,
};

/// `UpdateTime`. Broadcast once per simulated second by `WorldClock` (§4.5);
/// a newly joined session also receives one immediately. No optional fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateTime {
    pub world_instant: u64,
    pub day_fraction: f32,
    pub sunlight_factor: f32,
    pub moon_phase: u8,
}

impl Packet for UpdateTime {
    const ID: i32 = 60;

    fn computed_size(&self) -> usize {
        8 + 4 + 4 + 1 + 3
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_instant(buf, self.world_instant);
        write_f32(buf, self.day_fraction);
        write_f32(buf, self.sunlight_factor);
        write_u8(buf, self.moon_phase);
        ember_protocol_core::write_fixed_bytes(buf, &[0u8; 3]);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let world_instant = read_instant(buf)?;
        let day_fraction = read_f32(buf)?;
        let sunlight_factor = read_f32(buf)?;
        let moon_phase = read_u8(buf)?;
        let _reserved = ember_protocol_core::read_fixed_bytes(buf, 3)?;
        Ok(Self {
            world_instant,
            day_fraction,
            sunlight_factor,
            moon_phase,
        })
    }
}

/// `UpdateTimeSettings`. Sent on world-config change and as part of the
/// handshake sequence's initial settings pair (§6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateTimeSettings {
    pub day_length: u64,
    pub night_length: u64,
    pub dilation: f32,
    pub paused: bool,
}

impl Packet for UpdateTimeSettings {
    const ID: i32 = 61;

    fn computed_size(&self) -> usize {
        8 + 8 + 4 + 1
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_instant(buf, self.day_length);
        write_instant(buf, self.night_length);
        write_f32(buf, self.dilation);
        write_u8(buf, self.paused as u8);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let day_length = read_instant(buf)?;
        let night_length = read_instant(buf)?;
        let dilation = read_f32(buf)?;
        let paused = read_u8(buf)? != 0;
        Ok(Self {
            day_length,
            night_length,
            dilation,
            paused,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_time_round_trips() {
        let packet = UpdateTime {
            world_instant: 123_456,
            day_fraction: 0.5,
            sunlight_factor: 0.9,
            moon_phase: 3,
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        assert_eq!(UpdateTime::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn update_time_settings_round_trips() {
        let packet = UpdateTimeSettings {
            day_length: 24_000,
            night_length: 12_000,
            dilation: 1.0,
            paused: false,
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        assert_eq!(UpdateTimeSettings::deserialize(&mut buf).unwrap(), packet);
    }
}
