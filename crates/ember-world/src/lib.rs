pub mod block_health;
pub mod block_physics;
pub mod chunk;
pub mod filler;
pub mod fragile_block;
pub mod item_container;

pub use block_health::{BlockHealth, DamageOutcome};
pub use block_physics::{BlockPhysics, DECO_VALUE};
pub use chunk::{ChunkSection, ChunkSectionTickResult};
pub use filler::{BlockTypeId, FillerBlocks, FillerError, Orientation};
pub use fragile_block::FragileBlockTimers;
pub use item_container::ItemContainerState;
