pub mod packets;
pub mod session;

pub use packets::*;
pub use session::{ConnectionPhase, PingStats, Session, SessionError, SessionResult};
