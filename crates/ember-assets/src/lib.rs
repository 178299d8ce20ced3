mod error;
mod generator;
mod lookup;

pub use error::{AssetSyncError, AssetSyncResult};
pub use generator::{
    AssetGenerator, AssetMap, ItemAssetGenerator, ItemQualityAssetGenerator,
    ItemReticleAssetGenerator, RecipeAssetGenerator,
};
pub use lookup::IndexedLookupTable;
