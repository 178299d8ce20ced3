use bytes::BytesMut;
use ember_protocol_core::{
    read_f64, read_u64, read_u8, read_varint, write_f64, write_u64, write_u8, write_varint,
    ProtocolResult,
};
use ember_types::BlockPos;
use std::collections::HashMap;

/// Persisted-format version byte preceding this component's bytes (§6).
const FRAGILE_BLOCK_FORMAT_VERSION: u8 = 1;

/// Per-chunk-section map of position -> remaining fragility seconds (§4.4.3).
/// An entry is evicted as soon as its timer reaches zero.
#[derive(Debug, Default)]
pub struct FragileBlockTimers {
    entries: HashMap<BlockPos, f64>,
}

impl FragileBlockTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a fragile block with `seconds` remaining.
    pub fn start(&mut self, pos: BlockPos, seconds: f64) {
        self.entries.insert(pos, seconds.max(0.0));
    }

    pub fn remaining(&self, pos: BlockPos) -> Option<f64> {
        self.entries.get(&pos).copied()
    }

    /// Remove `pos`'s timer without firing the destruction hook. Returns
    /// whether a timer was actually present.
    pub fn cancel(&mut self, pos: BlockPos) -> bool {
        self.entries.remove(&pos).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Decrement every timer by `dt_seconds`. Returns every position whose
    /// timer crossed zero this tick, in an unspecified order — the caller
    /// invokes the destruction hook (typically a block-break effect) for
    /// each one and is expected to emit a `BlockSetUpdate`.
    pub fn tick(&mut self, dt_seconds: f64) -> Vec<BlockPos> {
        let mut expired = Vec::new();
        self.entries.retain(|&pos, remaining| {
            *remaining -= dt_seconds;
            if *remaining <= 0.0 {
                expired.push(pos);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Persisted-state serialization (§6): a version byte, a VarInt entry
    /// count, then each entry as (position: u64, remaining: f64) — the same
    /// cursor primitives used for wire packets.
    pub fn serialize(&self, buf: &mut BytesMut) {
        write_u8(buf, FRAGILE_BLOCK_FORMAT_VERSION);
        write_varint(buf, self.entries.len() as i32);
        for (&pos, &remaining) in &self.entries {
            write_u64(buf, pos.encode());
            write_f64(buf, remaining);
        }
    }

    pub fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let _version = read_u8(buf)?;
        let count = read_varint(buf)? as usize;
        let mut entries = HashMap::with_capacity(count);
        for _ in 0..count {
            let pos = BlockPos::decode(read_u64(buf)?);
            let remaining = read_f64(buf)?;
            entries.insert(pos, remaining);
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32) -> BlockPos {
        BlockPos::new(x, 0, 0)
    }

    #[test]
    fn tick_expires_entries_at_or_below_zero() {
        let mut timers = FragileBlockTimers::new();
        timers.start(pos(0), 1.0);
        assert!(timers.tick(0.5).is_empty());
        assert_eq!(timers.remaining(pos(0)), Some(0.5));
        assert_eq!(timers.tick(0.5), vec![pos(0)]);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancel_removes_without_reporting_expiry() {
        let mut timers = FragileBlockTimers::new();
        timers.start(pos(0), 5.0);
        assert!(timers.cancel(pos(0)));
        assert!(!timers.cancel(pos(0)));
        assert!(timers.is_empty());
    }

    #[test]
    fn serialize_round_trips() {
        let mut timers = FragileBlockTimers::new();
        timers.start(pos(1), 3.5);
        timers.start(pos(2), 1.25);
        let mut buf = BytesMut::new();
        timers.serialize(&mut buf);
        let decoded = FragileBlockTimers::deserialize(&mut buf).unwrap();
        assert_eq!(decoded.remaining(pos(1)), Some(3.5));
        assert_eq!(decoded.remaining(pos(2)), Some(1.25));
        assert_eq!(decoded.len(), 2);
    }
}
