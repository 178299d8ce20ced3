use crate::error::AssetSyncResult;
use crate::lookup::IndexedLookupTable;
use crate::AssetSyncError;
use ember_protocol::{
    AssetEntry, AssetKey, UpdateAssetsBody, UpdateAssetsItemQualities, UpdateAssetsItemReticles,
    UpdateAssetsItems, UpdateAssetsRecipes, UpdateKind,
};
use std::collections::HashMap;

/// Externally serialized asset payloads, keyed by asset id. The codec/schema
/// for any particular asset type is out of scope (§1) — this engine only
/// carries whatever bytes the asset loader already produced.
pub type AssetMap = HashMap<String, Vec<u8>>;

fn index_keyed_entries(
    ids: &[String],
    current: &AssetMap,
    table: &IndexedLookupTable,
) -> AssetSyncResult<Vec<AssetEntry>> {
    ids.iter()
        .map(|id| {
            let index = table
                .index_of(id)
                .ok_or_else(|| AssetSyncError::MissingIndex(id.clone()))?;
            Ok(AssetEntry {
                key: AssetKey::IndexKeyed(index),
                data: current.get(id).cloned().unwrap_or_default(),
            })
        })
        .collect()
}

fn string_keyed_entries(ids: &[String], current: &AssetMap) -> Vec<AssetEntry> {
    ids.iter()
        .map(|id| AssetEntry {
            key: AssetKey::StringKeyed(id.clone()),
            data: current.get(id).cloned().unwrap_or_default(),
        })
        .collect()
}

/// One managed asset type's sync operations (§4.6): pure functions of the
/// current asset map, the affected id set, and the lookup table. No hidden
/// state — every call is independently reproducible from its arguments.
pub trait AssetGenerator {
    type Packet;

    fn init(&self, all_ids: &[String], current: &AssetMap, table: &IndexedLookupTable)
        -> AssetSyncResult<Self::Packet>;

    fn update(
        &self,
        changed_ids: &[String],
        current: &AssetMap,
        table: &IndexedLookupTable,
    ) -> AssetSyncResult<Self::Packet>;

    fn remove(
        &self,
        removed_ids: &[String],
        table: &IndexedLookupTable,
    ) -> AssetSyncResult<Self::Packet>;
}

/// Defines one index-keyed `AssetGenerator` wrapping the packet type the
/// engine assigned it (`ember-protocol`'s `UpdateAssets*` catalog, §4.2/§4.6).
macro_rules! define_index_keyed_generator {
    ($name:ident, $packet:ident) => {
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl AssetGenerator for $name {
            type Packet = $packet;

            fn init(
                &self,
                all_ids: &[String],
                current: &AssetMap,
                table: &IndexedLookupTable,
            ) -> AssetSyncResult<$packet> {
                Ok($packet {
                    body: UpdateAssetsBody {
                        kind: UpdateKind::Init,
                        max_index: table.max_index(),
                        entries: index_keyed_entries(all_ids, current, table)?,
                    },
                })
            }

            fn update(
                &self,
                changed_ids: &[String],
                current: &AssetMap,
                table: &IndexedLookupTable,
            ) -> AssetSyncResult<$packet> {
                Ok($packet {
                    body: UpdateAssetsBody {
                        kind: UpdateKind::AddOrUpdate,
                        max_index: table.max_index(),
                        entries: index_keyed_entries(changed_ids, current, table)?,
                    },
                })
            }

            fn remove(
                &self,
                removed_ids: &[String],
                table: &IndexedLookupTable,
            ) -> AssetSyncResult<$packet> {
                Ok($packet {
                    body: UpdateAssetsBody {
                        kind: UpdateKind::Remove,
                        max_index: table.max_index(),
                        entries: index_keyed_entries(removed_ids, &AssetMap::new(), table)?,
                    },
                })
            }
        }
    };
}

define_index_keyed_generator!(ItemAssetGenerator, UpdateAssetsItems);
define_index_keyed_generator!(ItemQualityAssetGenerator, UpdateAssetsItemQualities);
define_index_keyed_generator!(ItemReticleAssetGenerator, UpdateAssetsItemReticles);

/// Recipes have no dense index (§4.6: "used for types without a dense
/// index"), so the generator carries ids verbatim and never touches the
/// lookup table.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecipeAssetGenerator;

impl AssetGenerator for RecipeAssetGenerator {
    type Packet = UpdateAssetsRecipes;

    fn init(
        &self,
        all_ids: &[String],
        current: &AssetMap,
        _table: &IndexedLookupTable,
    ) -> AssetSyncResult<UpdateAssetsRecipes> {
        Ok(UpdateAssetsRecipes {
            body: UpdateAssetsBody {
                kind: UpdateKind::Init,
                max_index: 0,
                entries: string_keyed_entries(all_ids, current),
            },
        })
    }

    fn update(
        &self,
        changed_ids: &[String],
        current: &AssetMap,
        _table: &IndexedLookupTable,
    ) -> AssetSyncResult<UpdateAssetsRecipes> {
        Ok(UpdateAssetsRecipes {
            body: UpdateAssetsBody {
                kind: UpdateKind::AddOrUpdate,
                max_index: 0,
                entries: string_keyed_entries(changed_ids, current),
            },
        })
    }

    fn remove(
        &self,
        removed_ids: &[String],
        _table: &IndexedLookupTable,
    ) -> AssetSyncResult<UpdateAssetsRecipes> {
        Ok(UpdateAssetsRecipes {
            body: UpdateAssetsBody {
                kind: UpdateKind::Remove,
                max_index: 0,
                entries: string_keyed_entries(removed_ids, &AssetMap::new()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_keyed_init_resolves_every_assigned_index() {
        let mut table = IndexedLookupTable::new();
        table.assign("core:stone");
        table.assign("core:dirt");
        let mut current = AssetMap::new();
        current.insert("core:stone".into(), vec![1]);
        current.insert("core:dirt".into(), vec![2]);

        let packet = ItemAssetGenerator
            .init(
                &["core:stone".into(), "core:dirt".into()],
                &current,
                &table,
            )
            .unwrap();
        assert_eq!(packet.body.entries.len(), 2);
        assert_eq!(packet.body.max_index, 1);
    }

    #[test]
    fn index_keyed_generator_rejects_unassigned_id() {
        let table = IndexedLookupTable::new();
        let current = AssetMap::new();
        let err = ItemAssetGenerator
            .update(&["core:stone".into()], &current, &table)
            .unwrap_err();
        assert_eq!(err, AssetSyncError::MissingIndex("core:stone".into()));
    }

    #[test]
    fn string_keyed_generator_never_touches_the_table() {
        let table = IndexedLookupTable::new();
        let mut current = AssetMap::new();
        current.insert("core:plank_table".into(), vec![9]);
        let packet = RecipeAssetGenerator
            .init(&["core:plank_table".into()], &current, &table)
            .unwrap();
        assert_eq!(packet.body.entries.len(), 1);
    }
}
