use crate::packets::connection::{
    decode_fingerprint, encode_fingerprint, Connect, Disconnect, DisconnectType, Ping, Pong,
    PongType, FINGERPRINT_WIDTH,
};
use ember_protocol_core::Packet;
use ember_types::PlayerIdentity;
use std::collections::VecDeque;
use thiserror::Error;

/// Lifecycle phase of a connection (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Handshaking,
    Authenticating,
    InGame,
    Closing,
}

/// How many recent RTT samples the rolling window keeps (§4.3: "a
/// bounded-size recent-sample window (fixed capacity, FIFO)").
const RTT_WINDOW_CAPACITY: usize = 32;

/// Rolling ping/pong latency statistics for one session.
#[derive(Debug, Clone, Default)]
pub struct PingStats {
    min_millis: Option<u64>,
    max_millis: Option<u64>,
    sum_millis: u64,
    count: u64,
    recent: VecDeque<u64>,
}

impl PingStats {
    pub fn record(&mut self, rtt_millis: u64) {
        self.min_millis = Some(self.min_millis.map_or(rtt_millis, |m| m.min(rtt_millis)));
        self.max_millis = Some(self.max_millis.map_or(rtt_millis, |m| m.max(rtt_millis)));
        self.sum_millis += rtt_millis;
        self.count += 1;
        if self.recent.len() == RTT_WINDOW_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(rtt_millis);
    }

    pub fn min(&self) -> Option<u64> {
        self.min_millis
    }

    pub fn max(&self) -> Option<u64> {
        self.max_millis
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum_millis as f64 / self.count as f64)
    }

    pub fn recent_samples(&self) -> impl Iterator<Item = u64> + '_ {
        self.recent.iter().copied()
    }
}

/// Errors a session's state machine can raise while processing a packet or a
/// scheduled deadline. Each maps to exactly one remedy in `into_disconnect`
/// (§7's error taxonomy).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("protocol fingerprint mismatch")]
    FingerprintMismatch,
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("handshake did not complete before the phase deadline")]
    HandshakeTimeout,
    #[error("no pong received before the keep-alive grace window expired")]
    KeepAliveTimeout,
    #[error("packet {0} is not valid in the current phase")]
    UnexpectedPacket(i32),
}

impl SessionError {
    /// The `Disconnect` this error produces, per §7's propagation policy.
    /// `Transport errors` are deliberately excluded: those never go through
    /// `SessionError` because no `Disconnect` is written for them at all.
    pub fn into_disconnect(self) -> Disconnect {
        match self {
            SessionError::FingerprintMismatch => {
                Disconnect::new(DisconnectType::Crash, "protocol version")
            }
            SessionError::AuthenticationFailed(_) => {
                Disconnect::new(DisconnectType::Disconnect, "authentication")
            }
            SessionError::HandshakeTimeout => {
                Disconnect::new(DisconnectType::Disconnect, "timeout")
            }
            SessionError::KeepAliveTimeout => {
                Disconnect::new(DisconnectType::Disconnect, "timeout")
            }
            SessionError::UnexpectedPacket(id) => Disconnect::new(
                DisconnectType::Disconnect,
                format!("unexpected packet {id} for current phase"),
            ),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Per-session connection state (§3, §4.3). Transport- and
/// game-logic-agnostic: callers drive it by feeding decoded packets and
/// wall-clock timestamps, and act on the `Ping`/`Disconnect` values it
/// returns — the actual I/O belongs to the network executor (§5).
pub struct Session {
    pub phase: ConnectionPhase,
    server_fingerprint: [u8; FINGERPRINT_WIDTH],
    pub identity: Option<PlayerIdentity>,
    pub ping_stats: PingStats,
    next_ping_id: i64,
    pending_ping: Option<(i64, u64)>,
    last_inbound_millis: u64,
    phase_deadline_millis: Option<u64>,
}

impl Session {
    pub fn new(server_fingerprint: &str, now_millis: u64, handshake_deadline_millis: u64) -> Self {
        Self {
            phase: ConnectionPhase::Handshaking,
            server_fingerprint: encode_fingerprint(server_fingerprint),
            identity: None,
            ping_stats: PingStats::default(),
            next_ping_id: 1,
            pending_ping: None,
            last_inbound_millis: now_millis,
            phase_deadline_millis: Some(now_millis + handshake_deadline_millis),
        }
    }

    /// Validate an inbound `Connect` against the server's negotiated
    /// fingerprint. On success the session moves to `Authenticating`; the
    /// caller is then expected to invoke the out-of-scope `AuthClient` and
    /// call `complete_authentication`/`fail_authentication`.
    pub fn handle_connect(&mut self, connect: &Connect) -> SessionResult<()> {
        if self.phase != ConnectionPhase::Handshaking {
            return Err(SessionError::UnexpectedPacket(<Connect as Packet>::ID));
        }
        if connect.protocol_fingerprint != self.server_fingerprint {
            self.phase = ConnectionPhase::Closing;
            return Err(SessionError::FingerprintMismatch);
        }
        self.phase = ConnectionPhase::Authenticating;
        Ok(())
    }

    pub fn complete_authentication(&mut self, identity: PlayerIdentity, now_millis: u64) {
        self.identity = Some(identity);
        self.phase = ConnectionPhase::InGame;
        self.last_inbound_millis = now_millis;
        self.phase_deadline_millis = None;
    }

    pub fn fail_authentication(&mut self, reason: impl Into<String>) -> SessionError {
        self.phase = ConnectionPhase::Closing;
        SessionError::AuthenticationFailed(reason.into())
    }

    /// Called for every inbound packet once `InGame`: cancels the current
    /// phase timeout and schedules the next keep-alive expectation.
    pub fn note_inbound_packet(&mut self, now_millis: u64) {
        self.last_inbound_millis = now_millis;
    }

    pub fn server_fingerprint_string(&self) -> String {
        decode_fingerprint(&self.server_fingerprint)
    }

    /// True if no packet (including a Pong) has arrived within
    /// `grace_millis` of the last one — the keep-alive timeout of §4.3/§6.
    pub fn is_keepalive_expired(&self, now_millis: u64, grace_millis: u64) -> bool {
        self.phase == ConnectionPhase::InGame
            && now_millis.saturating_sub(self.last_inbound_millis) > grace_millis
    }

    /// True if `Connect` has not arrived before the handshake deadline.
    pub fn is_handshake_expired(&self, now_millis: u64) -> bool {
        self.phase == ConnectionPhase::Handshaking
            && self
                .phase_deadline_millis
                .is_some_and(|deadline| now_millis >= deadline)
    }

    /// Build the next keep-alive `Ping` and record its dispatch time.
    pub fn dispatch_ping(&mut self, now_millis: u64) -> Ping {
        let id = self.next_ping_id;
        self.next_ping_id += 1;
        self.pending_ping = Some((id, now_millis));
        Ping::new(id, now_millis)
    }

    /// Match an inbound `Pong` against the outstanding `Ping` and update
    /// rolling RTT statistics. Returns the computed RTT in milliseconds, or
    /// `None` if the Pong doesn't match (stale id, or none was outstanding).
    pub fn handle_pong(&mut self, pong: &Pong, now_millis: u64) -> Option<u64> {
        let (pending_id, dispatch_millis) = self.pending_ping?;
        if pong.pong_type != PongType::Direct && pong.pong_type != PongType::Tick {
            return None;
        }
        if pong.id != pending_id {
            return None;
        }
        self.pending_ping = None;
        self.last_inbound_millis = now_millis;
        let rtt = now_millis.saturating_sub(dispatch_millis);
        self.ping_stats.record(rtt);
        Some(rtt)
    }

    /// Begin a graceful close: caller writes the returned `Disconnect`, then
    /// half-closes the write side and waits up to a short grace period.
    pub fn begin_graceful_close(&mut self, reason: impl Into<String>) -> Disconnect {
        self.phase = ConnectionPhase::Closing;
        Disconnect::new(DisconnectType::Disconnect, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn connect_with_fingerprint(fp: &str) -> Connect {
        Connect {
            protocol_fingerprint: encode_fingerprint(fp),
            uuid: Uuid::nil(),
            locale: [0; 8],
            username: Some("p".into()),
            identity_token: Some(vec![1]),
        }
    }

    #[test]
    fn matching_fingerprint_advances_to_authenticating() {
        let mut session = Session::new(&"a".repeat(64), 0, 5_000);
        let connect = connect_with_fingerprint(&"a".repeat(64));
        session.handle_connect(&connect).unwrap();
        assert_eq!(session.phase, ConnectionPhase::Authenticating);
    }

    #[test]
    fn mismatched_fingerprint_closes_with_crash_disconnect() {
        let mut session = Session::new(&"a".repeat(64), 0, 5_000);
        let connect = connect_with_fingerprint(&"b".repeat(64));
        let err = session.handle_connect(&connect).unwrap_err();
        assert_eq!(err, SessionError::FingerprintMismatch);
        assert_eq!(session.phase, ConnectionPhase::Closing);
        let disconnect = err.into_disconnect();
        assert_eq!(disconnect.disconnect_type, DisconnectType::Crash);
        assert!(disconnect.reason.unwrap().contains("protocol"));
    }

    #[test]
    fn ping_pong_round_trip_records_rtt() {
        let mut session = Session::new(&"a".repeat(64), 0, 5_000);
        session.complete_authentication(PlayerIdentity::new(Uuid::nil(), "p"), 0);
        let ping = session.dispatch_ping(0);
        let pong = Pong {
            id: ping.id,
            timestamp: None,
            pong_type: PongType::Direct,
        };
        let rtt = session.handle_pong(&pong, 50).unwrap();
        assert_eq!(rtt, 50);
        assert_eq!(session.ping_stats.mean(), Some(50.0));
        assert_eq!(session.ping_stats.min(), Some(50));
        assert_eq!(session.ping_stats.max(), Some(50));
    }

    #[test]
    fn keepalive_expires_after_grace_window() {
        let mut session = Session::new(&"a".repeat(64), 0, 5_000);
        session.complete_authentication(PlayerIdentity::new(Uuid::nil(), "p"), 0);
        assert!(!session.is_keepalive_expired(9_000, 10_000));
        assert!(session.is_keepalive_expired(10_001, 10_000));
    }

    #[test]
    fn handshake_timeout_fires_only_while_handshaking() {
        let session = Session::new(&"a".repeat(64), 0, 1_000);
        assert!(session.is_handshake_expired(1_000));
        assert!(!session.is_handshake_expired(999));
    }
}
