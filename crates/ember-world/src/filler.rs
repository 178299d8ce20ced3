use ember_types::BlockPos;
use std::collections::HashMap;
use thiserror::Error;

/// A block-type identifier, as carried raw on the wire by `BlockSetUpdate`
/// (§4.2). The asset-to-BlockType mapping itself is out of scope (§1).
pub type BlockTypeId = i32;

/// The four horizontal facings plus up/down, matching how a placed
/// multi-voxel block's footprint is rotated into world space (§3/§4.4.4).
/// Integer discriminants per §9's explicit-enum requirement, even though
/// this type never crosses the wire directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Orientation {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
    Up = 4,
    Down = 5,
}

impl Orientation {
    /// Rotate a local offset (relative to the origin voxel) into world space.
    fn rotate(&self, (dx, dy, dz): (i32, i32, i32)) -> (i32, i32, i32) {
        match self {
            Orientation::North => (dx, dy, dz),
            Orientation::East => (-dz, dy, dx),
            Orientation::South => (-dx, dy, -dz),
            Orientation::West => (dz, dy, -dx),
            Orientation::Up => (dx, dz, -dy),
            Orientation::Down => (dx, -dz, dy),
        }
    }
}

fn offset_pos(origin: BlockPos, offset: (i32, i32, i32)) -> BlockPos {
    BlockPos::new(origin.x + offset.0, origin.y + offset.1, origin.z + offset.2)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FillerError {
    #[error("voxel {0:?} is already occupied")]
    Occupied(BlockPos),
    #[error("position {0:?} is not part of any multi-voxel structure")]
    NotPartOfStructure(BlockPos),
}

#[derive(Debug, Clone)]
struct OriginEntry {
    block_type: BlockTypeId,
    orientation: Orientation,
    filler_positions: Vec<BlockPos>,
}

#[derive(Debug, Clone, Copy)]
enum Voxel {
    Origin,
    Filler { origin: BlockPos },
}

/// Structural maintenance for multi-voxel blocks (§3/§4.4.4): one "origin"
/// voxel carrying the `BlockType`/`Orientation`, plus N-1 "filler" voxels
/// occupying the rest of its rotated bounding box, each pointing back to the
/// origin. Owned by a chunk section, mutated only by that world's executor.
#[derive(Debug, Default)]
pub struct FillerBlocks {
    voxels: HashMap<BlockPos, Voxel>,
    origins: HashMap<BlockPos, OriginEntry>,
}

impl FillerBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_origin(&self, pos: BlockPos) -> bool {
        self.origins.contains_key(&pos)
    }

    pub fn is_filler(&self, pos: BlockPos) -> bool {
        matches!(self.voxels.get(&pos), Some(Voxel::Filler { .. }))
    }

    /// Place a multi-voxel block. `footprint` is the block's local voxel
    /// offsets in its unrotated (`Orientation::North`) form, including the
    /// origin's own `(0, 0, 0)` offset (which is ignored). Every rotated
    /// offset other than the origin must land on an unoccupied voxel, or the
    /// whole placement fails without writing anything (§4.4.4: "the entire
    /// placement fails atomically").
    pub fn place(
        &mut self,
        origin_pos: BlockPos,
        block_type: BlockTypeId,
        orientation: Orientation,
        footprint: &[(i32, i32, i32)],
    ) -> Result<(), FillerError> {
        let filler_positions: Vec<BlockPos> = footprint
            .iter()
            .copied()
            .filter(|&offset| offset != (0, 0, 0))
            .map(|offset| offset_pos(origin_pos, orientation.rotate(offset)))
            .collect();

        if self.voxels.contains_key(&origin_pos) {
            return Err(FillerError::Occupied(origin_pos));
        }
        for &pos in &filler_positions {
            if self.voxels.contains_key(&pos) {
                return Err(FillerError::Occupied(pos));
            }
        }

        self.voxels.insert(origin_pos, Voxel::Origin);
        for &pos in &filler_positions {
            self.voxels.insert(pos, Voxel::Filler { origin: origin_pos });
        }
        self.origins.insert(
            origin_pos,
            OriginEntry {
                block_type,
                orientation,
                filler_positions,
            },
        );
        Ok(())
    }

    /// Break the structure containing `pos` (which may be the origin or any
    /// of its fillers), clearing every voxel in its bounding box. Returns the
    /// origin position and block type that was broken, for the caller to
    /// emit a `BlockSetUpdate`.
    pub fn break_at(&mut self, pos: BlockPos) -> Result<(BlockPos, BlockTypeId), FillerError> {
        let origin_pos = match self.voxels.get(&pos) {
            Some(Voxel::Origin) => pos,
            Some(Voxel::Filler { origin }) => *origin,
            None => return Err(FillerError::NotPartOfStructure(pos)),
        };
        let entry = self
            .origins
            .remove(&origin_pos)
            .ok_or(FillerError::NotPartOfStructure(pos))?;

        self.voxels.remove(&origin_pos);
        for filler_pos in &entry.filler_positions {
            self.voxels.remove(filler_pos);
        }
        Ok((origin_pos, entry.block_type))
    }

    /// Verify every placed origin's fillers are still consistent, repairing
    /// mismatches rather than crashing (§4.4.4: "treat mismatches as
    /// corruption to be reported but not crash"). Returns the origin
    /// positions that needed repair, for the caller to log.
    pub fn sweep_and_repair(&mut self) -> Vec<BlockPos> {
        let mut repaired = Vec::new();
        let origin_positions: Vec<BlockPos> = self.origins.keys().copied().collect();

        for origin_pos in origin_positions {
            let mut needs_repair = false;
            let filler_positions = self.origins[&origin_pos].filler_positions.clone();
            for &filler_pos in &filler_positions {
                match self.voxels.get(&filler_pos) {
                    Some(Voxel::Filler { origin }) if *origin == origin_pos => {}
                    _ => {
                        needs_repair = true;
                        self.voxels.insert(filler_pos, Voxel::Filler { origin: origin_pos });
                    }
                }
            }
            if !matches!(self.voxels.get(&origin_pos), Some(Voxel::Origin)) {
                needs_repair = true;
                self.voxels.insert(origin_pos, Voxel::Origin);
            }
            if needs_repair {
                repaired.push(origin_pos);
            }
        }
        repaired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 2x1x2 footprint: origin at (0,0,0) plus three fillers.
    const DOUBLE_WIDE: &[(i32, i32, i32)] = &[(0, 0, 0), (1, 0, 0), (0, 0, 1), (1, 0, 1)];

    #[test]
    fn place_then_break_clears_every_voxel() {
        let mut blocks = FillerBlocks::new();
        let origin = BlockPos::new(0, 0, 0);
        blocks
            .place(origin, 7, Orientation::North, DOUBLE_WIDE)
            .unwrap();

        assert!(blocks.is_origin(origin));
        assert!(blocks.is_filler(BlockPos::new(1, 0, 0)));
        assert!(blocks.is_filler(BlockPos::new(0, 0, 1)));
        assert!(blocks.is_filler(BlockPos::new(1, 0, 1)));

        let (broken_origin, block_type) = blocks.break_at(BlockPos::new(1, 0, 1)).unwrap();
        assert_eq!(broken_origin, origin);
        assert_eq!(block_type, 7);

        for offset in DOUBLE_WIDE {
            let pos = offset_pos(origin, *offset);
            assert!(!blocks.is_origin(pos));
            assert!(!blocks.is_filler(pos));
        }
    }

    #[test]
    fn place_is_atomic_when_a_filler_cell_is_occupied() {
        let mut blocks = FillerBlocks::new();
        let occupant = BlockPos::new(0, 0, 0);
        blocks
            .place(occupant, 1, Orientation::North, &[(0, 0, 0)])
            .unwrap();

        let origin = BlockPos::new(-1, 0, -1);
        // Footprint's (1,0,1) offset from origin (-1,-1) lands on `occupant`.
        let result = blocks.place(origin, 2, Orientation::North, DOUBLE_WIDE);
        assert_eq!(result, Err(FillerError::Occupied(occupant)));

        assert!(!blocks.is_origin(origin));
        assert!(blocks.is_origin(occupant));
    }

    #[test]
    fn break_on_unrelated_voxel_fails() {
        let mut blocks = FillerBlocks::new();
        let err = blocks.break_at(BlockPos::new(5, 5, 5)).unwrap_err();
        assert_eq!(err, FillerError::NotPartOfStructure(BlockPos::new(5, 5, 5)));
    }

    #[test]
    fn sweep_repairs_a_missing_filler_marker() {
        let mut blocks = FillerBlocks::new();
        let origin = BlockPos::new(0, 0, 0);
        blocks
            .place(origin, 9, Orientation::North, DOUBLE_WIDE)
            .unwrap();

        // Corrupt state: drop one filler marker without going through break_at.
        blocks.voxels.remove(&BlockPos::new(1, 0, 1));

        let repaired = blocks.sweep_and_repair();
        assert_eq!(repaired, vec![origin]);
        assert!(blocks.is_filler(BlockPos::new(1, 0, 1)));
    }
}
