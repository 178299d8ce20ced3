use bytes::BytesMut;
use ember_protocol_core::{
    read_f32, read_f64, read_i32, read_string, read_u32, read_u8, varint_len, write_f32,
    write_f64, write_i32, write_string, write_u32, write_u8, NullableBitField, Packet,
    ProtocolError, ProtocolResult, VarOffsetReader, VarOffsetWriter,
};
use ember_protocol_core::{read_varint, write_varint};
use ember_types::Vec3d;

/// `SetEntitySeed(160)`. Fixed 4-byte seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetEntitySeed {
    pub seed: i32,
}

impl Packet for SetEntitySeed {
    const ID: i32 = 160;

    fn computed_size(&self) -> usize {
        4
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_i32(buf, self.seed);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        Ok(Self {
            seed: read_i32(buf)?,
        })
    }
}

/// One structured per-entity update inside `EntityUpdates`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityUpdateEntry {
    pub entity_id: i32,
    pub position: Vec3d,
    pub yaw: f32,
    pub pitch: f32,
}

const ENTITY_UPDATE_ENTRY_SIZE: usize = 4 + 24 + 4 + 4;

fn write_entity_update_entry(buf: &mut BytesMut, e: &EntityUpdateEntry) {
    write_i32(buf, e.entity_id);
    write_f64(buf, e.position.x);
    write_f64(buf, e.position.y);
    write_f64(buf, e.position.z);
    write_f32(buf, e.yaw);
    write_f32(buf, e.pitch);
}

fn read_entity_update_entry(buf: &mut BytesMut) -> ProtocolResult<EntityUpdateEntry> {
    let entity_id = read_i32(buf)?;
    let x = read_f64(buf)?;
    let y = read_f64(buf)?;
    let z = read_f64(buf)?;
    let yaw = read_f32(buf)?;
    let pitch = read_f32(buf)?;
    Ok(EntityUpdateEntry {
        entity_id,
        position: Vec3d::new(x, y, z),
        yaw,
        pitch,
    })
}

const MAX_ENTITY_ARRAY_LEN: usize = 4096;

/// `EntityUpdates(161)`. Two optional arrays, each behind its own NBF bit and
/// offset into the variable block: removed entity ids, and structured
/// per-entity updates.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdates {
    pub removed_ids: Option<Vec<i32>>,
    pub updates: Option<Vec<EntityUpdateEntry>>,
}

fn array_tail_len<T>(items: &[T], per_item: usize) -> usize {
    varint_len(items.len() as i32) + items.len() * per_item
}

impl Packet for EntityUpdates {
    const ID: i32 = 161;

    fn computed_size(&self) -> usize {
        let nbf_width = NullableBitField::width_for(2);
        let fixed = 4 + 4;
        let variable = self
            .removed_ids
            .as_ref()
            .map(|ids| array_tail_len(ids, 4))
            .unwrap_or(0)
            + self
                .updates
                .as_ref()
                .map(|u| array_tail_len(u, ENTITY_UPDATE_ENTRY_SIZE))
                .unwrap_or(0);
        nbf_width + fixed + variable
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(2);
        nbf.set(0, self.removed_ids.is_some());
        nbf.set(1, self.updates.is_some());
        nbf.write(buf);

        let mut writer = VarOffsetWriter::new();
        let removed_offset = match &self.removed_ids {
            Some(ids) => writer.write_field(|b| {
                write_varint(b, ids.len() as i32);
                for id in ids {
                    write_i32(b, *id);
                }
            }),
            None => 0,
        };
        let updates_offset = match &self.updates {
            Some(updates) => writer.write_field(|b| {
                write_varint(b, updates.len() as i32);
                for entry in updates {
                    write_entity_update_entry(b, entry);
                }
            }),
            None => 0,
        };

        write_u32(buf, removed_offset);
        write_u32(buf, updates_offset);

        let tail = writer.finish();
        if tail.len() as u32 > MAX_ENTITY_ARRAY_LEN as u32 * (ENTITY_UPDATE_ENTRY_SIZE as u32 + 4)
        {
            return Err(ProtocolError::SizeExceeded {
                size: tail.len(),
                max: MAX_ENTITY_ARRAY_LEN * (ENTITY_UPDATE_ENTRY_SIZE + 4),
            });
        }
        buf.extend_from_slice(&tail);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 2)?;
        let removed_offset = read_u32(buf)?;
        let updates_offset = read_u32(buf)?;

        let tail = buf.split_to(buf.len());
        let max = MAX_ENTITY_ARRAY_LEN as u32 * (ENTITY_UPDATE_ENTRY_SIZE as u32 + 4);
        let reader = VarOffsetReader::new(&tail, max);

        let removed_ids = if nbf.is_set(0) {
            Some(reader.read_field(removed_offset, |b| {
                let count = read_varint(b)? as usize;
                if count > MAX_ENTITY_ARRAY_LEN {
                    return Err(ProtocolError::InvalidLength {
                        field: "removed_ids",
                        len: count,
                        max: MAX_ENTITY_ARRAY_LEN,
                    });
                }
                let mut ids = Vec::with_capacity(count);
                for _ in 0..count {
                    ids.push(read_i32(b)?);
                }
                Ok(ids)
            })?)
        } else {
            None
        };

        let updates = if nbf.is_set(1) {
            Some(reader.read_field(updates_offset, |b| {
                let count = read_varint(b)? as usize;
                if count > MAX_ENTITY_ARRAY_LEN {
                    return Err(ProtocolError::InvalidLength {
                        field: "updates",
                        len: count,
                        max: MAX_ENTITY_ARRAY_LEN,
                    });
                }
                let mut updates = Vec::with_capacity(count);
                for _ in 0..count {
                    updates.push(read_entity_update_entry(b)?);
                }
                Ok(updates)
            })?)
        } else {
            None
        };

        Ok(Self {
            removed_ids,
            updates,
        })
    }
}

const MAX_ANIMATION_ID_LEN: usize = 64;

/// `PlayAnimation(162)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayAnimation {
    pub entity_id: i32,
    pub animation_slot: i32,
    pub animation_id: Option<String>,
    pub item_animations_id: Option<String>,
}

impl Packet for PlayAnimation {
    const ID: i32 = 162;

    fn computed_size(&self) -> usize {
        let nbf_width = NullableBitField::width_for(2);
        let fixed = 4 + 4 + 4 + 4;
        let variable = self.animation_id.as_ref().map(|s| 1 + s.len()).unwrap_or(0)
            + self
                .item_animations_id
                .as_ref()
                .map(|s| 1 + s.len())
                .unwrap_or(0);
        nbf_width + fixed + variable
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(2);
        nbf.set(0, self.animation_id.is_some());
        nbf.set(1, self.item_animations_id.is_some());
        nbf.write(buf);

        write_i32(buf, self.entity_id);
        write_i32(buf, self.animation_slot);

        let mut writer = VarOffsetWriter::new();
        let anim_offset = match &self.animation_id {
            Some(s) => writer.write_field(|b| write_string(b, s)),
            None => 0,
        };
        let item_anim_offset = match &self.item_animations_id {
            Some(s) => writer.write_field(|b| write_string(b, s)),
            None => 0,
        };
        write_u32(buf, anim_offset);
        write_u32(buf, item_anim_offset);

        buf.extend_from_slice(&writer.finish());
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 2)?;
        let entity_id = read_i32(buf)?;
        let animation_slot = read_i32(buf)?;
        let anim_offset = read_u32(buf)?;
        let item_anim_offset = read_u32(buf)?;

        let tail = buf.split_to(buf.len());
        let reader = VarOffsetReader::new(&tail, (2 * (1 + MAX_ANIMATION_ID_LEN)) as u32);

        let animation_id = if nbf.is_set(0) {
            Some(reader.read_field(anim_offset, |b| {
                read_string(b, "animation_id", MAX_ANIMATION_ID_LEN)
            })?)
        } else {
            None
        };
        let item_animations_id = if nbf.is_set(1) {
            Some(reader.read_field(item_anim_offset, |b| {
                read_string(b, "item_animations_id", MAX_ANIMATION_ID_LEN)
            })?)
        } else {
            None
        };

        Ok(Self {
            entity_id,
            animation_slot,
            animation_id,
            item_animations_id,
        })
    }
}

/// `ChangeVelocityType` — Set replaces the entity's velocity, Add accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChangeVelocityType {
    Set = 0,
    Add = 1,
}

impl ChangeVelocityType {
    fn from_u8(v: u8) -> ProtocolResult<Self> {
        match v {
            0 => Ok(Self::Set),
            1 => Ok(Self::Add),
            _ => Err(ProtocolError::BadEncoding("change_velocity_type")),
        }
    }
}

/// `ChangeVelocity(163)`. Fixed 35 bytes, derived as (DESIGN.md):
/// NBF(1) + entity_id:i32(4) + vx,vy,vz:f32(12) + change_type:u8(1)
/// + hit_x,hit_y,hit_z:f32(12, zero if absent) + reserved:u8x5(5) = 35.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeVelocity {
    pub entity_id: i32,
    pub velocity: Vec3dF32,
    pub change_type: ChangeVelocityType,
    pub hit_position: Option<Vec3dF32>,
}

/// A float-precision 3-vector, used where the wire format fixes f32 width
/// rather than `Vec3d`'s f64 (velocity and hit-position fields).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3dF32 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3dF32 {
    pub const ZERO: Vec3dF32 = Vec3dF32 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

fn write_vec3f(buf: &mut BytesMut, v: &Vec3dF32) {
    write_f32(buf, v.x);
    write_f32(buf, v.y);
    write_f32(buf, v.z);
}

fn read_vec3f(buf: &mut BytesMut) -> ProtocolResult<Vec3dF32> {
    Ok(Vec3dF32 {
        x: read_f32(buf)?,
        y: read_f32(buf)?,
        z: read_f32(buf)?,
    })
}

impl ChangeVelocity {
    pub const WIRE_SIZE: usize = 1 + 4 + 12 + 1 + 12 + 5;
}

impl Packet for ChangeVelocity {
    const ID: i32 = 163;

    fn computed_size(&self) -> usize {
        Self::WIRE_SIZE
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(1);
        nbf.set(0, self.hit_position.is_some());
        nbf.write(buf);

        write_i32(buf, self.entity_id);
        write_vec3f(buf, &self.velocity);
        write_u8(buf, self.change_type as u8);
        write_vec3f(buf, &self.hit_position.unwrap_or(Vec3dF32::ZERO));
        write_fixed_bytes_zeroed(buf, 5);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 1)?;
        let entity_id = read_i32(buf)?;
        let velocity = read_vec3f(buf)?;
        let change_type = ChangeVelocityType::from_u8(read_u8(buf)?)?;
        let raw_hit = read_vec3f(buf)?;
        let _reserved = ember_protocol_core::read_fixed_bytes(buf, 5)?;

        let hit_position = if nbf.is_set(0) { Some(raw_hit) } else { None };

        Ok(Self {
            entity_id,
            velocity,
            change_type,
            hit_position,
        })
    }
}

fn write_fixed_bytes_zeroed(buf: &mut BytesMut, n: usize) {
    ember_protocol_core::write_fixed_bytes(buf, &vec![0u8; n]);
}

/// `KnockbackChangeType` — the reason/kind of an applied knockback impulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KnockbackChangeType {
    Set = 0,
    Add = 1,
    Reset = 2,
}

impl KnockbackChangeType {
    fn from_u8(v: u8) -> ProtocolResult<Self> {
        match v {
            0 => Ok(Self::Set),
            1 => Ok(Self::Add),
            2 => Ok(Self::Reset),
            _ => Err(ProtocolError::BadEncoding("knockback_change_type")),
        }
    }
}

/// `ApplyKnockback(164)`. Fixed 38 bytes: `ChangeVelocity`'s shape plus a
/// source entity id and its own explicit change-type byte (DESIGN.md):
/// NBF(1) + entity_id:i32(4) + vx,vy,vz:f32(12) + velocity_change_type:u8(1)
/// + hit_x,hit_y,hit_z:f32(12) + source_entity_id:i32(4) + knockback_change_type:u8(1)
/// + reserved:u8x3(3) = 38.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyKnockback {
    pub entity_id: i32,
    pub velocity: Vec3dF32,
    pub velocity_change_type: ChangeVelocityType,
    pub hit_position: Option<Vec3dF32>,
    pub source_entity_id: i32,
    pub knockback_change_type: KnockbackChangeType,
}

impl ApplyKnockback {
    pub const WIRE_SIZE: usize = 1 + 4 + 12 + 1 + 12 + 4 + 1 + 3;
}

impl Packet for ApplyKnockback {
    const ID: i32 = 164;

    fn computed_size(&self) -> usize {
        Self::WIRE_SIZE
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(1);
        nbf.set(0, self.hit_position.is_some());
        nbf.write(buf);

        write_i32(buf, self.entity_id);
        write_vec3f(buf, &self.velocity);
        write_u8(buf, self.velocity_change_type as u8);
        write_vec3f(buf, &self.hit_position.unwrap_or(Vec3dF32::ZERO));
        write_i32(buf, self.source_entity_id);
        write_u8(buf, self.knockback_change_type as u8);
        write_fixed_bytes_zeroed(buf, 3);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 1)?;
        let entity_id = read_i32(buf)?;
        let velocity = read_vec3f(buf)?;
        let velocity_change_type = ChangeVelocityType::from_u8(read_u8(buf)?)?;
        let raw_hit = read_vec3f(buf)?;
        let source_entity_id = read_i32(buf)?;
        let knockback_change_type = KnockbackChangeType::from_u8(read_u8(buf)?)?;
        let _reserved = ember_protocol_core::read_fixed_bytes(buf, 3)?;

        let hit_position = if nbf.is_set(0) { Some(raw_hit) } else { None };

        Ok(Self {
            entity_id,
            velocity,
            velocity_change_type,
            hit_position,
            source_entity_id,
            knockback_change_type,
        })
    }
}

/// A single model-particle spawn sample: offset from the emitter origin plus
/// an initial velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSample {
    pub offset: Vec3dF32,
    pub velocity: Vec3dF32,
}

const PARTICLE_SAMPLE_SIZE: usize = 12 + 12;
const MAX_PARTICLE_COUNT: usize = 512;

/// `SpawnModelParticles(165)`. NBF on a particle array; VarInt-prefixed count.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnModelParticles {
    pub particle_type_id: i32,
    pub origin: Vec3dF32,
    pub particles: Option<Vec<ParticleSample>>,
}

impl Packet for SpawnModelParticles {
    const ID: i32 = 165;

    fn computed_size(&self) -> usize {
        let nbf_width = NullableBitField::width_for(1);
        let fixed = 4 + 12 + 4;
        let variable = self
            .particles
            .as_ref()
            .map(|p| array_tail_len(p, PARTICLE_SAMPLE_SIZE))
            .unwrap_or(0);
        nbf_width + fixed + variable
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let mut nbf = NullableBitField::new(1);
        nbf.set(0, self.particles.is_some());
        nbf.write(buf);

        write_i32(buf, self.particle_type_id);
        write_vec3f(buf, &self.origin);

        let mut writer = VarOffsetWriter::new();
        let particles_offset = match &self.particles {
            Some(particles) => writer.write_field(|b| {
                write_varint(b, particles.len() as i32);
                for p in particles {
                    write_vec3f(b, &p.offset);
                    write_vec3f(b, &p.velocity);
                }
            }),
            None => 0,
        };
        write_u32(buf, particles_offset);

        let tail = writer.finish();
        let max = (MAX_PARTICLE_COUNT * PARTICLE_SAMPLE_SIZE + 5) as u32;
        if tail.len() as u32 > max {
            return Err(ProtocolError::SizeExceeded {
                size: tail.len(),
                max: max as usize,
            });
        }
        buf.extend_from_slice(&tail);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let nbf = NullableBitField::read(buf, 1)?;
        let particle_type_id = read_i32(buf)?;
        let origin = read_vec3f(buf)?;
        let particles_offset = read_u32(buf)?;

        let tail = buf.split_to(buf.len());
        let max = (MAX_PARTICLE_COUNT * PARTICLE_SAMPLE_SIZE + 5) as u32;
        let reader = VarOffsetReader::new(&tail, max);

        let particles = if nbf.is_set(0) {
            Some(reader.read_field(particles_offset, |b| {
                let count = read_varint(b)? as usize;
                if count > MAX_PARTICLE_COUNT {
                    return Err(ProtocolError::InvalidLength {
                        field: "particles",
                        len: count,
                        max: MAX_PARTICLE_COUNT,
                    });
                }
                let mut out = Vec::with_capacity(count);
                for _ in 0..count {
                    let offset = read_vec3f(b)?;
                    let velocity = read_vec3f(b)?;
                    out.push(ParticleSample { offset, velocity });
                }
                Ok(out)
            })?)
        } else {
            None
        };

        Ok(Self {
            particle_type_id,
            origin,
            particles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_updates_round_trips_with_both_arrays() {
        let packet = EntityUpdates {
            removed_ids: Some(vec![1, 2, 3]),
            updates: Some(vec![EntityUpdateEntry {
                entity_id: 42,
                position: Vec3d::new(1.0, 2.0, 3.0),
                yaw: 90.0,
                pitch: 0.0,
            }]),
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        assert_eq!(EntityUpdates::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn entity_updates_round_trips_with_neither_array() {
        let packet = EntityUpdates {
            removed_ids: None,
            updates: None,
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(EntityUpdates::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn change_velocity_is_exactly_35_bytes() {
        let packet = ChangeVelocity {
            entity_id: 1,
            velocity: Vec3dF32 {
                x: 1.0,
                y: 0.0,
                z: 0.0,
            },
            change_type: ChangeVelocityType::Add,
            hit_position: None,
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), 35);
        assert_eq!(ChangeVelocity::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn apply_knockback_is_exactly_38_bytes() {
        let packet = ApplyKnockback {
            entity_id: 1,
            velocity: Vec3dF32::ZERO,
            velocity_change_type: ChangeVelocityType::Set,
            hit_position: Some(Vec3dF32 {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            }),
            source_entity_id: 99,
            knockback_change_type: KnockbackChangeType::Reset,
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), 38);
        assert_eq!(ApplyKnockback::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn spawn_model_particles_round_trips() {
        let packet = SpawnModelParticles {
            particle_type_id: 7,
            origin: Vec3dF32::ZERO,
            particles: Some(vec![ParticleSample {
                offset: Vec3dF32 {
                    x: 0.1,
                    y: 0.2,
                    z: 0.3,
                },
                velocity: Vec3dF32::ZERO,
            }]),
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        assert_eq!(SpawnModelParticles::deserialize(&mut buf).unwrap(), packet);
    }
}
