mod recorder;

pub use recorder::{PacketStatsRecorder, PacketStatsSnapshot, SizeSample, PACKET_ID_SLOTS};
