use std::collections::HashMap;

/// Stable small-integer index assignment for asset ids that need a dense
/// index on the wire (§4.6). Indices are assigned on first sight and kept for
/// the lifetime of the session; a removed id's index is recycled on the next
/// `assign` rather than left to grow the table forever.
///
/// Read-mostly: once published, lookups never block (§5's resource model).
/// Writes (`assign`/`remove`) are expected to run only on the owning
/// asset-loader executor.
#[derive(Debug, Default)]
pub struct IndexedLookupTable {
    forward: HashMap<String, i32>,
    reverse: Vec<Option<String>>,
    free_indices: Vec<i32>,
}

impl IndexedLookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(&self, id: &str) -> Option<i32> {
        self.forward.get(id).copied()
    }

    pub fn id_of(&self, index: i32) -> Option<&str> {
        self.reverse
            .get(index as usize)
            .and_then(|slot| slot.as_deref())
    }

    /// Returns the existing index if `id` was seen before, else assigns the
    /// next free one (reusing a removed slot when available).
    pub fn assign(&mut self, id: &str) -> i32 {
        if let Some(&index) = self.forward.get(id) {
            return index;
        }
        let index = match self.free_indices.pop() {
            Some(reused) => reused,
            None => {
                let next = self.reverse.len() as i32;
                self.reverse.push(None);
                next
            }
        };
        self.reverse[index as usize] = Some(id.to_string());
        self.forward.insert(id.to_string(), index);
        index
    }

    /// Frees `id`'s index for reuse. Returns the freed index, if any.
    pub fn remove(&mut self, id: &str) -> Option<i32> {
        let index = self.forward.remove(id)?;
        self.reverse[index as usize] = None;
        self.free_indices.push(index);
        Some(index)
    }

    /// The highest index ever assigned (the `max_index` hint carried by
    /// `UpdateAssetsBody`), or -1 if the table is empty.
    pub fn max_index(&self) -> i32 {
        self.reverse.len() as i32 - 1
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_is_stable_and_idempotent() {
        let mut table = IndexedLookupTable::new();
        let a = table.assign("core:stone");
        let b = table.assign("core:stone");
        assert_eq!(a, b);
        assert_eq!(table.index_of("core:stone"), Some(a));
    }

    #[test]
    fn remove_recycles_the_freed_index() {
        let mut table = IndexedLookupTable::new();
        let a = table.assign("core:stone");
        table.assign("core:dirt");
        table.remove("core:stone");
        assert_eq!(table.index_of("core:stone"), None);
        let reused = table.assign("core:sand");
        assert_eq!(reused, a);
    }

    #[test]
    fn max_index_tracks_the_high_water_mark() {
        let mut table = IndexedLookupTable::new();
        assert_eq!(table.max_index(), -1);
        table.assign("core:stone");
        table.assign("core:dirt");
        assert_eq!(table.max_index(), 1);
        table.remove("core:dirt");
        assert_eq!(table.max_index(), 1);
    }
}
