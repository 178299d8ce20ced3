use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

/// The reserved core packet identifier range (§3): a dense 0..512 space.
pub const PACKET_ID_SLOTS: usize = 512;

/// How many (size, timestamp) samples each direction's recent-sample window
/// retains before the oldest is evicted.
const RECENT_WINDOW_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct SizeSample {
    pub size: u32,
    pub timestamp_millis: u64,
}

/// Per-packet-id counters and rolling size metrics. All scalar fields are
/// atomic; the recent-sample windows are guarded by a short critical section
/// (a lock held only for a `push_back`/`pop_front` pair), matching the
/// spec's "single-producer lock-free or guarded by short-critical-section
/// locks" allowance.
struct PacketStatEntry {
    send_count: AtomicU64,
    receive_count: AtomicU64,
    uncompressed_bytes: AtomicU64,
    compressed_bytes: AtomicU64,
    min_size: AtomicU32,
    max_size: AtomicU32,
    recent_sent: Mutex<VecDeque<SizeSample>>,
    recent_received: Mutex<VecDeque<SizeSample>>,
}

impl Default for PacketStatEntry {
    fn default() -> Self {
        Self {
            send_count: AtomicU64::new(0),
            receive_count: AtomicU64::new(0),
            uncompressed_bytes: AtomicU64::new(0),
            compressed_bytes: AtomicU64::new(0),
            min_size: AtomicU32::new(u32::MAX),
            max_size: AtomicU32::new(0),
            recent_sent: Mutex::new(VecDeque::with_capacity(RECENT_WINDOW_CAPACITY)),
            recent_received: Mutex::new(VecDeque::with_capacity(RECENT_WINDOW_CAPACITY)),
        }
    }
}

/// A point-in-time snapshot of one packet id's counters, safe to hand to a
/// metrics exporter or admin command without holding any lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketStatsSnapshot {
    pub send_count: u64,
    pub receive_count: u64,
    pub uncompressed_bytes: u64,
    pub compressed_bytes: u64,
    pub min_size: Option<u32>,
    pub max_size: Option<u32>,
}

/// Lock-free (aside from the short recent-sample critical sections) per-packet-id
/// recorder. `record_send`/`record_receive` are constant-time, never block on
/// contention beyond the brief window-mutation lock, and silently discard any
/// id outside `0..PACKET_ID_SLOTS`.
pub struct PacketStatsRecorder {
    entries: Vec<PacketStatEntry>,
}

impl Default for PacketStatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketStatsRecorder {
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(PACKET_ID_SLOTS);
        entries.resize_with(PACKET_ID_SLOTS, PacketStatEntry::default);
        Self { entries }
    }

    pub fn record_send(&self, packet_id: i32, uncompressed: u32, compressed: u32, now_millis: u64) {
        self.record(packet_id, uncompressed, compressed, now_millis, true);
    }

    pub fn record_receive(
        &self,
        packet_id: i32,
        uncompressed: u32,
        compressed: u32,
        now_millis: u64,
    ) {
        self.record(packet_id, uncompressed, compressed, now_millis, false);
    }

    fn record(
        &self,
        packet_id: i32,
        uncompressed: u32,
        compressed: u32,
        now_millis: u64,
        is_send: bool,
    ) {
        let Some(entry) = self.entry_for(packet_id) else {
            return;
        };

        if is_send {
            entry.send_count.fetch_add(1, Ordering::Relaxed);
        } else {
            entry.receive_count.fetch_add(1, Ordering::Relaxed);
        }
        entry
            .uncompressed_bytes
            .fetch_add(uncompressed as u64, Ordering::Relaxed);
        entry
            .compressed_bytes
            .fetch_add(compressed as u64, Ordering::Relaxed);

        entry.min_size.fetch_min(uncompressed, Ordering::Relaxed);
        entry.max_size.fetch_max(uncompressed, Ordering::Relaxed);

        let window = if is_send {
            &entry.recent_sent
        } else {
            &entry.recent_received
        };
        let mut window = window.lock().unwrap();
        if window.len() == RECENT_WINDOW_CAPACITY {
            window.pop_front();
        }
        window.push_back(SizeSample {
            size: uncompressed,
            timestamp_millis: now_millis,
        });
    }

    pub fn snapshot(&self, packet_id: i32) -> Option<PacketStatsSnapshot> {
        let entry = self.entry_for(packet_id)?;
        let min = entry.min_size.load(Ordering::Relaxed);
        let max = entry.max_size.load(Ordering::Relaxed);
        Some(PacketStatsSnapshot {
            send_count: entry.send_count.load(Ordering::Relaxed),
            receive_count: entry.receive_count.load(Ordering::Relaxed),
            uncompressed_bytes: entry.uncompressed_bytes.load(Ordering::Relaxed),
            compressed_bytes: entry.compressed_bytes.load(Ordering::Relaxed),
            min_size: (min != u32::MAX).then_some(min),
            max_size: (max != 0).then_some(max),
        })
    }

    /// Recent sent-size samples, oldest first.
    pub fn recent_sent(&self, packet_id: i32) -> Vec<SizeSample> {
        self.entry_for(packet_id)
            .map(|e| e.recent_sent.lock().unwrap().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn recent_received(&self, packet_id: i32) -> Vec<SizeSample> {
        self.entry_for(packet_id)
            .map(|e| e.recent_received.lock().unwrap().iter().copied().collect())
            .unwrap_or_default()
    }

    fn entry_for(&self, packet_id: i32) -> Option<&PacketStatEntry> {
        if packet_id < 0 || packet_id as usize >= PACKET_ID_SLOTS {
            return None;
        }
        self.entries.get(packet_id as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_ids_are_silently_discarded() {
        let recorder = PacketStatsRecorder::new();
        recorder.record_send(-1, 10, 10, 0);
        recorder.record_send(512, 10, 10, 0);
        recorder.record_send(1_000_000, 10, 10, 0);
        assert!(recorder.snapshot(-1).is_none());
        assert!(recorder.snapshot(512).is_none());
    }

    #[test]
    fn counts_and_sizes_accumulate() {
        let recorder = PacketStatsRecorder::new();
        recorder.record_send(3, 100, 40, 0);
        recorder.record_send(3, 200, 80, 1);
        recorder.record_receive(3, 50, 20, 2);

        let snap = recorder.snapshot(3).unwrap();
        assert_eq!(snap.send_count, 2);
        assert_eq!(snap.receive_count, 1);
        assert_eq!(snap.uncompressed_bytes, 350);
        assert_eq!(snap.compressed_bytes, 140);
        assert_eq!(snap.min_size, Some(50));
        assert_eq!(snap.max_size, Some(200));
    }

    #[test]
    fn recent_window_evicts_oldest_beyond_capacity() {
        let recorder = PacketStatsRecorder::new();
        for i in 0..(RECENT_WINDOW_CAPACITY + 10) {
            recorder.record_send(7, i as u32, i as u32, i as u64);
        }
        let recent = recorder.recent_sent(7);
        assert_eq!(recent.len(), RECENT_WINDOW_CAPACITY);
        assert_eq!(recent.first().unwrap().size, 10);
        assert_eq!(recent.last().unwrap().size, (RECENT_WINDOW_CAPACITY + 9) as u32);
    }
}
