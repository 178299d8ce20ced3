use bytes::Bytes;
use ember_assets::{
    AssetGenerator, AssetMap, IndexedLookupTable, ItemAssetGenerator, ItemQualityAssetGenerator,
    ItemReticleAssetGenerator, RecipeAssetGenerator,
};
use ember_protocol::{BlockDamageUpdate, BlockSetUpdate, Packet, UpdateTime, UpdateTimeSettings};
use ember_time::WorldClock;
use ember_types::{BlockPos, ChunkSectionPos};
use ember_world::ChunkSection;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::WorldConfig;

/// A framed outbound packet ready for the network layer to write: an
/// identifier plus its already-serialized body (§4.1's `serialize` step has
/// already run by the time this crosses the channel).
pub struct OutboundFrame {
    pub id: i32,
    pub payload: Bytes,
}

pub fn encode_frame<P: Packet>(packet: &P) -> ember_protocol_core::ProtocolResult<OutboundFrame> {
    let mut buf = bytes::BytesMut::with_capacity(packet.computed_size());
    packet.serialize(&mut buf)?;
    Ok(OutboundFrame {
        id: P::ID,
        payload: buf.freeze(),
    })
}

/// What a newly joined session needs to complete the handshake sequence
/// (§6 step 5): time settings, the current time snapshot, and one asset-sync
/// Init envelope per managed asset type.
pub struct JoinAck {
    pub time_settings: UpdateTimeSettings,
    pub time_update: UpdateTime,
    pub asset_init: Vec<OutboundFrame>,
}

/// Commands an I/O worker submits to a world's executor (§5's implementation
/// note: the enum-based stand-in for cross-executor "closures"). Every
/// variant is self-contained; the executor never calls back into I/O code.
pub enum WorldCommand {
    Join {
        session: Uuid,
        outbound: mpsc::UnboundedSender<OutboundFrame>,
        reply: tokio::sync::oneshot::Sender<JoinAck>,
    },
    Leave {
        session: Uuid,
    },
    DamageBlock {
        pos: BlockPos,
        amount: f32,
        now_millis: u64,
    },
    RepairBlock {
        pos: BlockPos,
        amount: f32,
    },
    PlaceFiller {
        origin: BlockPos,
        block_type: ember_world::BlockTypeId,
        orientation: ember_world::Orientation,
        footprint: Vec<(i32, i32, i32)>,
        cause_entity_id: Option<i32>,
    },
    BreakFiller {
        pos: BlockPos,
        cause_entity_id: Option<i32>,
    },
    /// Advance the world by one tick. `dt_millis` is real tick time; the
    /// `WorldClock` applies dilation internally (§4.5).
    Tick {
        dt_millis: u64,
        now_millis: u64,
    },
    Shutdown,
}

fn section_for(
    chunks: &mut HashMap<ChunkSectionPos, ChunkSection>,
    pos: BlockPos,
) -> &mut ChunkSection {
    let section_pos = pos.section_pos();
    chunks
        .entry(section_pos)
        .or_insert_with(|| ChunkSection::new(section_pos))
}

fn build_asset_init_frames(
    items: &AssetMap,
    item_table: &IndexedLookupTable,
    qualities: &AssetMap,
    quality_table: &IndexedLookupTable,
    reticles: &AssetMap,
    reticle_table: &IndexedLookupTable,
    recipes: &AssetMap,
) -> Vec<OutboundFrame> {
    let item_ids: Vec<String> = items.keys().cloned().collect();
    let quality_ids: Vec<String> = qualities.keys().cloned().collect();
    let reticle_ids: Vec<String> = reticles.keys().cloned().collect();
    let recipe_ids: Vec<String> = recipes.keys().cloned().collect();

    let mut frames = Vec::with_capacity(4);
    if let Ok(packet) = ItemAssetGenerator.init(&item_ids, items, item_table) {
        if let Ok(frame) = encode_frame(&packet) {
            frames.push(frame);
        }
    }
    if let Ok(packet) = ItemQualityAssetGenerator.init(&quality_ids, qualities, quality_table) {
        if let Ok(frame) = encode_frame(&packet) {
            frames.push(frame);
        }
    }
    if let Ok(packet) = ItemReticleAssetGenerator.init(&reticle_ids, reticles, reticle_table) {
        if let Ok(frame) = encode_frame(&packet) {
            frames.push(frame);
        }
    }
    if let Ok(packet) = RecipeAssetGenerator.init(&recipe_ids, recipes, &IndexedLookupTable::new())
    {
        if let Ok(frame) = encode_frame(&packet) {
            frames.push(frame);
        }
    }
    frames
}

/// Runs one world's executor loop: owns every chunk section, the world
/// clock, and the asset-sync lookup tables, draining `WorldCommand`s until
/// told to shut down (§5). This is the only task that ever mutates any of
/// that state directly.
pub async fn run_world_executor(
    config: WorldConfig,
    mut commands: mpsc::UnboundedReceiver<WorldCommand>,
) {
    let mut clock =
        WorldClock::new(config.day_length_millis, config.night_length_millis, config.dilation);
    let mut chunks: HashMap<ChunkSectionPos, ChunkSection> = HashMap::new();
    let mut sessions: HashMap<Uuid, mpsc::UnboundedSender<OutboundFrame>> = HashMap::new();

    // Populated by the (out-of-scope) asset loader; empty at startup, so the
    // handshake's Init envelopes simply carry zero entries until a loader
    // event arrives.
    let item_table = IndexedLookupTable::new();
    let quality_table = IndexedLookupTable::new();
    let reticle_table = IndexedLookupTable::new();
    let items = AssetMap::new();
    let qualities = AssetMap::new();
    let reticles = AssetMap::new();
    let recipes = AssetMap::new();

    let broadcast = |sessions: &HashMap<Uuid, mpsc::UnboundedSender<OutboundFrame>>,
                      frame: OutboundFrame| {
        for (id, tx) in sessions {
            let clone = OutboundFrame {
                id: frame.id,
                payload: frame.payload.clone(),
            };
            if tx.send(clone).is_err() {
                debug!(session = %id, "dropping broadcast for closed session channel");
            }
        }
    };

    while let Some(command) = commands.recv().await {
        match command {
            WorldCommand::Join {
                session,
                outbound,
                reply,
            } => {
                sessions.insert(session, outbound);
                let snapshot = clock.snapshot();
                let ack = JoinAck {
                    time_settings: UpdateTimeSettings {
                        day_length: clock.day_length(),
                        night_length: clock.night_length(),
                        dilation: clock.dilation(),
                        paused: clock.paused(),
                    },
                    time_update: UpdateTime {
                        world_instant: clock.instant(),
                        day_fraction: snapshot.day_fraction,
                        sunlight_factor: snapshot.sunlight_factor,
                        moon_phase: snapshot.moon_phase,
                    },
                    asset_init: build_asset_init_frames(
                        &items,
                        &item_table,
                        &qualities,
                        &quality_table,
                        &reticles,
                        &reticle_table,
                        &recipes,
                    ),
                };
                let _ = reply.send(ack);
            }
            WorldCommand::Leave { session } => {
                sessions.remove(&session);
            }
            WorldCommand::DamageBlock {
                pos,
                amount,
                now_millis,
            } => {
                let section = section_for(&mut chunks, pos);
                let outcome = section.health.damage(pos, amount, now_millis);
                let health = section.health.get(pos);
                if let Ok(frame) = encode_frame(&BlockDamageUpdate {
                    position: pos,
                    health,
                    last_damage_instant: now_millis,
                }) {
                    broadcast(&sessions, frame);
                }
                if matches!(outcome, ember_world::DamageOutcome::Destroyed) {
                    debug!(?pos, "block destroyed by damage");
                }
            }
            WorldCommand::RepairBlock { pos, amount } => {
                let section = section_for(&mut chunks, pos);
                section.health.repair(pos, amount);
            }
            WorldCommand::PlaceFiller {
                origin,
                block_type,
                orientation,
                footprint,
                cause_entity_id,
            } => {
                let section = section_for(&mut chunks, origin);
                match section.filler.place(origin, block_type, orientation, &footprint) {
                    Ok(()) => {
                        if let Ok(frame) = encode_frame(&BlockSetUpdate {
                            position: origin,
                            block_type_id: block_type,
                            cause_entity_id,
                        }) {
                            broadcast(&sessions, frame);
                        }
                    }
                    Err(e) => warn!(?origin, error = %e, "filler placement rejected"),
                }
            }
            WorldCommand::BreakFiller { pos, cause_entity_id } => {
                let section = section_for(&mut chunks, pos);
                match section.filler.break_at(pos) {
                    Ok((origin, _block_type)) => {
                        if let Ok(frame) = encode_frame(&BlockSetUpdate {
                            position: origin,
                            block_type_id: 0,
                            cause_entity_id,
                        }) {
                            broadcast(&sessions, frame);
                        }
                    }
                    Err(e) => warn!(?pos, error = %e, "filler break rejected"),
                }
            }
            WorldCommand::Tick { dt_millis, now_millis } => {
                let due = clock.advance(dt_millis);
                for section in chunks.values_mut() {
                    let result = section.tick(dt_millis as f64 / 1000.0, now_millis);
                    for pos in result.fragile_expired {
                        if let Ok(frame) = encode_frame(&BlockSetUpdate {
                            position: pos,
                            block_type_id: 0,
                            cause_entity_id: None,
                        }) {
                            broadcast(&sessions, frame);
                        }
                    }
                    for pos in result.regenerated {
                        if let Ok(frame) = encode_frame(&BlockDamageUpdate {
                            position: pos,
                            health: 1.0,
                            last_damage_instant: now_millis,
                        }) {
                            broadcast(&sessions, frame);
                        }
                    }
                }
                if due {
                    let snapshot = clock.snapshot();
                    let update = UpdateTime {
                        world_instant: clock.instant(),
                        day_fraction: snapshot.day_fraction,
                        sunlight_factor: snapshot.sunlight_factor,
                        moon_phase: snapshot.moon_phase,
                    };
                    if let Ok(frame) = encode_frame(&update) {
                        broadcast(&sessions, frame);
                    }
                }
            }
            WorldCommand::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_receives_current_time_settings_and_empty_asset_init() {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = WorldConfig {
            name: "test".into(),
            day_length_millis: 1_000,
            night_length_millis: 500,
            dilation: 1.0,
        };
        let handle = tokio::spawn(run_world_executor(config, rx));

        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(WorldCommand::Join {
            session: Uuid::nil(),
            outbound: out_tx,
            reply: reply_tx,
        })
        .unwrap();

        let ack = reply_rx.await.unwrap();
        assert_eq!(ack.time_settings.day_length, 1_000);
        assert_eq!(ack.asset_init.len(), 4);

        tx.send(WorldCommand::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn tick_broadcasts_update_time_once_due() {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = WorldConfig {
            name: "test".into(),
            day_length_millis: 10_000,
            night_length_millis: 5_000,
            dilation: 1.0,
        };
        let handle = tokio::spawn(run_world_executor(config, rx));

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(WorldCommand::Join {
            session: Uuid::nil(),
            outbound: out_tx,
            reply: reply_tx,
        })
        .unwrap();
        reply_rx.await.unwrap();

        tx.send(WorldCommand::Tick {
            dt_millis: 1_000,
            now_millis: 1_000,
        })
        .unwrap();

        let frame = out_rx.recv().await.unwrap();
        assert_eq!(frame.id, UpdateTime::ID);

        tx.send(WorldCommand::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn damage_block_broadcasts_damage_update() {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = WorldConfig::default();
        let handle = tokio::spawn(run_world_executor(config, rx));

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(WorldCommand::Join {
            session: Uuid::nil(),
            outbound: out_tx,
            reply: reply_tx,
        })
        .unwrap();
        reply_rx.await.unwrap();

        tx.send(WorldCommand::DamageBlock {
            pos: BlockPos::new(1, 1, 1),
            amount: 0.25,
            now_millis: 0,
        })
        .unwrap();

        let frame = out_rx.recv().await.unwrap();
        assert_eq!(frame.id, BlockDamageUpdate::ID);

        tx.send(WorldCommand::Shutdown).unwrap();
        handle.await.unwrap();
    }
}
