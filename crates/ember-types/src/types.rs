use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A block position in world space (x, y, z integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Encode as a 64-bit value for the wire: x: 26 bits, z: 26 bits, y: 12 bits.
    pub fn encode(&self) -> u64 {
        ((self.x as u64 & 0x3FF_FFFF) << 38)
            | ((self.z as u64 & 0x3FF_FFFF) << 12)
            | (self.y as u64 & 0xFFF)
    }

    pub fn decode(val: u64) -> Self {
        let mut x = (val >> 38) as i32;
        let mut z = ((val >> 12) & 0x3FF_FFFF) as i32;
        let mut y = (val & 0xFFF) as i32;
        if x >= 1 << 25 {
            x -= 1 << 26;
        }
        if z >= 1 << 25 {
            z -= 1 << 26;
        }
        if y >= 1 << 11 {
            y -= 1 << 12;
        }
        Self { x, y, z }
    }

    /// The chunk section (32^3 voxels) this position falls in.
    pub fn section_pos(&self) -> ChunkSectionPos {
        ChunkSectionPos {
            x: self.x.div_euclid(CHUNK_SECTION_SIZE),
            y: self.y.div_euclid(CHUNK_SECTION_SIZE),
            z: self.z.div_euclid(CHUNK_SECTION_SIZE),
        }
    }

    /// This position's offset within its chunk section, as a flat 0..32768 index.
    pub fn local_index(&self) -> usize {
        let lx = self.x.rem_euclid(CHUNK_SECTION_SIZE) as usize;
        let ly = self.y.rem_euclid(CHUNK_SECTION_SIZE) as usize;
        let lz = self.z.rem_euclid(CHUNK_SECTION_SIZE) as usize;
        (ly << 10) | (lz << 5) | lx
    }
}

/// Edge length of a chunk section, in voxels.
pub const CHUNK_SECTION_SIZE: i32 = 32;
/// Total voxel count of a chunk section.
pub const CHUNK_SECTION_VOLUME: usize = 32 * 32 * 32;

/// The position of a chunk section in the world's section grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSectionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkSectionPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// World-space position of this section's origin voxel (its (0,0,0) corner).
    pub fn origin(&self) -> BlockPos {
        BlockPos::new(
            self.x * CHUNK_SECTION_SIZE,
            self.y * CHUNK_SECTION_SIZE,
            self.z * CHUNK_SECTION_SIZE,
        )
    }
}

/// A 3D position with double precision, used for entity transforms and velocities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const ZERO: Vec3d = Vec3d { x: 0.0, y: 0.0, z: 0.0 };
}

/// A namespaced asset/block-type identifier (e.g. "core:stone_filler").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId {
    pub namespace: String,
    pub path: String,
}

impl AssetId {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    pub fn core(path: impl Into<String>) -> Self {
        Self::new("core", path)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl std::str::FromStr for AssetId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((ns, path)) = s.split_once(':') {
            Ok(Self::new(ns, path))
        } else {
            Ok(Self::core(s))
        }
    }
}

/// A verified player identity (post-handshake).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub uuid: Uuid,
    pub username: String,
}

impl PlayerIdentity {
    pub fn new(uuid: Uuid, username: impl Into<String>) -> Self {
        Self {
            uuid,
            username: username.into(),
        }
    }
}

/// An item stack occupying one slot of an item container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: i32,
    pub count: i8,
}

impl ItemStack {
    pub fn new(item_id: i32, count: i8) -> Self {
        Self { item_id, count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_pos_round_trips_through_encode() {
        let pos = BlockPos::new(-100_000, 255, 4_000_000);
        assert_eq!(BlockPos::decode(pos.encode()), pos);
    }

    #[test]
    fn block_pos_negative_round_trips() {
        let pos = BlockPos::new(-1, -1, -1);
        assert_eq!(BlockPos::decode(pos.encode()), pos);
    }

    #[test]
    fn section_pos_handles_negative_coordinates() {
        let pos = BlockPos::new(-1, -1, -1);
        assert_eq!(pos.section_pos(), ChunkSectionPos::new(-1, -1, -1));
        assert_eq!(pos.local_index(), (31 << 10) | (31 << 5) | 31);
    }

    #[test]
    fn asset_id_parses_without_namespace() {
        let id: AssetId = "stone".parse().unwrap();
        assert_eq!(id, AssetId::core("stone"));
    }

    #[test]
    fn asset_id_display_round_trips() {
        let id = AssetId::new("mods", "glow_crystal");
        assert_eq!(id.to_string(), "mods:glow_crystal");
    }
}
