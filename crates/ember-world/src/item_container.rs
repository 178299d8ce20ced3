use ember_types::{BlockPos, ChunkSectionPos};
use std::collections::HashSet;

/// Tracks which block positions in a chunk section host an item container
/// (chest, furnace, etc.) and whether any of them have unsaved changes
/// (§4.4.5). The container's actual inventory contents are owned elsewhere
/// (by the world's item-stack storage); this type only tracks placement and
/// a chunk-wide dirty flag so a persistence pass knows to revisit the chunk.
#[derive(Debug, Default)]
pub struct ItemContainerState {
    positions: HashSet<BlockPos>,
    dirty: bool,
}

impl ItemContainerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pos: BlockPos) {
        self.positions.insert(pos);
        self.dirty = true;
    }

    pub fn unregister(&mut self, pos: BlockPos) -> bool {
        let removed = self.positions.remove(&pos);
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.positions.contains(&pos)
    }

    /// Mark the chunk dirty without changing which positions are tracked,
    /// e.g. when a container's inventory contents change in place.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Consume and reset the dirty flag, reporting whether it had been set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All tracked positions, expressed as world-space block positions
    /// derived from `section`'s origin — the form a persistence or
    /// network-sync pass actually needs.
    pub fn world_positions(&self, section: ChunkSectionPos) -> Vec<BlockPos> {
        let origin = section.origin();
        self.positions
            .iter()
            .map(|pos| BlockPos::new(origin.x + pos.x, origin.y + pos.y, origin.z + pos.z))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_sets_dirty_and_take_dirty_clears_it() {
        let mut state = ItemContainerState::new();
        assert!(!state.take_dirty());
        state.register(BlockPos::new(1, 2, 3));
        assert!(state.is_dirty());
        assert!(state.take_dirty());
        assert!(!state.is_dirty());
    }

    #[test]
    fn unregister_reports_whether_present() {
        let mut state = ItemContainerState::new();
        let pos = BlockPos::new(0, 0, 0);
        assert!(!state.unregister(pos));
        state.register(pos);
        state.take_dirty();
        assert!(state.unregister(pos));
        assert!(state.is_dirty());
        assert!(!state.contains(pos));
    }

    #[test]
    fn world_positions_offsets_by_section_origin() {
        let mut state = ItemContainerState::new();
        state.register(BlockPos::new(1, 2, 3));
        let section = ChunkSectionPos::new(0, 1, 0);
        let world = state.world_positions(section);
        assert_eq!(world, vec![BlockPos::new(1, 2 + 32, 3)]);
    }
}
