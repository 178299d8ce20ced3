use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use ember_protocol::{Connect, Disconnect, Packet, Pong, Session, SessionError};
use ember_protocol_core::{read_varint, write_varint, ProtocolError};
use ember_stats::PacketStatsRecorder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::interfaces::AuthClient;
use crate::world::{encode_frame, OutboundFrame, WorldCommand};

/// Read a single length-prefixed frame off `stream` into `(packet_id,
/// payload)`, buffering partial reads across calls. No compression or
/// encryption layer; this protocol doesn't use either.
async fn read_frame(
    stream: &mut TcpStream,
    read_buf: &mut BytesMut,
) -> anyhow::Result<(i32, BytesMut)> {
    loop {
        if let Some(frame) = try_parse_frame(read_buf)? {
            return Ok(frame);
        }
        let mut tmp = [0u8; 4096];
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Err(anyhow::anyhow!("connection closed"));
        }
        read_buf.extend_from_slice(&tmp[..n]);
    }
}

fn try_parse_frame(read_buf: &mut BytesMut) -> anyhow::Result<Option<(i32, BytesMut)>> {
    if read_buf.is_empty() {
        return Ok(None);
    }
    let mut peek = read_buf.clone();
    let length = match read_varint(&mut peek) {
        Ok(len) => len as usize,
        Err(ProtocolError::Truncated(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let varint_bytes = read_buf.len() - peek.len();
    if peek.remaining() < length {
        return Ok(None);
    }
    read_buf.advance(varint_bytes);
    let mut body = read_buf.split_to(length);
    let packet_id = read_varint(&mut body)?;
    Ok(Some((packet_id, body)))
}

async fn write_frame(stream: &mut TcpStream, frame: OutboundFrame) -> anyhow::Result<()> {
    let mut header = BytesMut::new();
    write_varint(&mut header, frame.id);
    let total_len = header.len() + frame.payload.len();

    let mut out = BytesMut::with_capacity(total_len + 5);
    write_varint(&mut out, total_len as i32);
    out.extend_from_slice(&header);
    out.extend_from_slice(&frame.payload);

    stream.write_all(&out).await?;
    Ok(())
}

async fn send_packet<P: Packet>(stream: &mut TcpStream, packet: &P) -> anyhow::Result<()> {
    let frame = encode_frame(packet)?;
    write_frame(stream, frame).await
}

pub async fn accept_loop(
    listener: tokio::net::TcpListener,
    config: Arc<ServerConfig>,
    auth: Arc<dyn AuthClient>,
    stats: Arc<PacketStatsRecorder>,
    world: mpsc::UnboundedSender<WorldCommand>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("new connection from {}", peer);
                let config = config.clone();
                let auth = auth.clone();
                let stats = stats.clone();
                let world = world.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        handle_connection(stream, config, auth, stats, world).await
                    {
                        debug!("connection from {} ended: {}", peer, e);
                    }
                });
            }
            Err(e) => warn!("failed to accept connection: {}", e),
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    config: Arc<ServerConfig>,
    auth: Arc<dyn AuthClient>,
    stats: Arc<PacketStatsRecorder>,
    world: mpsc::UnboundedSender<WorldCommand>,
) -> anyhow::Result<()> {
    let mut read_buf = BytesMut::with_capacity(4096);

    // === Handshake (§6 steps 1-4) ===
    let (id, mut body) = read_frame(&mut stream, &mut read_buf).await?;
    stats.record_receive(id, body.len() as u32, body.len() as u32, now_millis());
    if id != Connect::ID {
        return Err(anyhow::anyhow!("expected Connect, got packet {id}"));
    }
    let connect = Connect::deserialize(&mut body)?;

    let now = now_millis();
    let mut session = Session::new(&config.protocol_fingerprint, now, config.handshake_timeout_millis);

    if let Err(e) = session.handle_connect(&connect) {
        let disconnect = e.into_disconnect();
        send_packet(&mut stream, &disconnect).await.ok();
        return Err(anyhow::anyhow!("handshake rejected: {e}"));
    }

    let identity_token = connect.identity_token.clone().unwrap_or_default();
    let identity = match auth.verify(&identity_token) {
        Ok(identity) => identity,
        Err(e) => {
            let session_err = session.fail_authentication(e.to_string());
            let disconnect = session_err.into_disconnect();
            send_packet(&mut stream, &disconnect).await.ok();
            return Err(anyhow::anyhow!("authentication failed: {e}"));
        }
    };
    session.complete_authentication(identity.clone(), now_millis());
    info!("{} authenticated as {}", identity.uuid, identity.username);

    // === Join the world executor and send the initial settings/time/asset pair (§6 step 5) ===
    let session_id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
    let (reply_tx, reply_rx) = oneshot::channel();
    world
        .send(WorldCommand::Join {
            session: session_id,
            outbound: outbound_tx,
            reply: reply_tx,
        })
        .map_err(|_| anyhow::anyhow!("world executor is no longer running"))?;
    let ack = reply_rx
        .await
        .map_err(|_| anyhow::anyhow!("world executor dropped the join reply"))?;

    send_packet(&mut stream, &ack.time_settings).await?;
    send_packet(&mut stream, &ack.time_update).await?;
    for frame in ack.asset_init {
        write_frame(&mut stream, frame).await?;
    }

    let result = play_loop(
        &mut stream,
        &mut read_buf,
        &mut session,
        &config,
        &stats,
        &mut outbound_rx,
    )
    .await;

    let _ = world.send(WorldCommand::Leave { session: session_id });
    result
}

/// The in-game phase's main loop: concurrently services inbound frames,
/// outbound broadcasts relayed from the world executor, and the keep-alive
/// cadence (default 1 Hz Ping / 10 s no-Pong timeout).
async fn play_loop(
    stream: &mut TcpStream,
    read_buf: &mut BytesMut,
    session: &mut Session,
    config: &ServerConfig,
    stats: &PacketStatsRecorder,
    outbound_rx: &mut mpsc::UnboundedReceiver<OutboundFrame>,
) -> anyhow::Result<()> {
    let keepalive_interval = Duration::from_millis(config.keepalive_interval_millis);
    let mut next_ping_at = Instant::now() + keepalive_interval;

    loop {
        tokio::select! {
            result = read_frame(stream, read_buf) => {
                let (id, mut body) = result?;
                stats.record_receive(id, body.len() as u32, body.len() as u32, now_millis());
                session.note_inbound_packet(now_millis());

                if id == Disconnect::ID {
                    let _ = Disconnect::deserialize(&mut body);
                    return Ok(());
                } else if id == Pong::ID {
                    let pong = Pong::deserialize(&mut body)?;
                    if let Some(rtt) = session.handle_pong(&pong, now_millis()) {
                        debug!("measured rtt {} ms", rtt);
                    }
                } else {
                    debug!("unhandled inbound packet id {}", id);
                }
            }
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        stats.record_send(frame.id, frame.payload.len() as u32, frame.payload.len() as u32, now_millis());
                        write_frame(stream, frame).await?;
                    }
                    None => return Ok(()),
                }
            }
            _ = tokio::time::sleep_until(next_ping_at) => {
                let ping = session.dispatch_ping(now_millis());
                send_packet(stream, &ping).await?;
                next_ping_at = Instant::now() + keepalive_interval;

                if session.is_keepalive_expired(now_millis(), config.keepalive_grace_millis) {
                    let disconnect = SessionError::KeepAliveTimeout.into_disconnect();
                    send_packet(stream, &disconnect).await.ok();
                    return Err(anyhow::anyhow!("keep-alive timeout"));
                }
            }
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
