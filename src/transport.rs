//! Relay transport – a Tokio thread owning the WebSocket + STOMP session.
//!
//! ## Threading model
//!
//! ```text
//! Game thread                  │  Bridge thread (Tokio, current-thread)
//! ──────────────────────────── │ ──────────────────────────────────────
//! GameSession::tick            │ run_bridge()
//!   → poll_events()            │   connect → CONNECT → CONNECTED
//!       events.try_recv()      │   SUBSCRIBE /topic/*
//!                              │   MESSAGE → RelayEvent → events.send
//!   → publish(dest, body)      │
//!       commands.try_send()    │   commands.recv() → SEND frame
//!                              │
//!   → disconnect()             │   shutdown → flush, DISCONNECT, close
//! ```
//!
//! The bridge thread never touches game state.  The game thread never awaits;
//! it only reads a `crossbeam_channel` receiver and a shared status flag.
//!
//! A lost connection (socket error, STOMP `ERROR`, heart-beat silence) is
//! retried after a fixed delay.  Publishes issued while disconnected are
//! dropped, never replayed.

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::Instrument;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::events::RelayEvent;
use crate::link::RelayLink;
use crate::protocol::topics;
use crate::stomp;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket endpoint (e.g. "ws://localhost:8080/ws/websocket")
    pub url: String,
    pub reconnect_delay: Duration,
    /// Heart-beat we offer to send, ms (0 = never)
    pub heartbeat_outgoing_ms: u64,
    /// Heart-beat we ask to receive, ms (0 = never)
    pub heartbeat_incoming_ms: u64,
    pub handshake_timeout: Duration,
    /// How deep to buffer relay events before dropping
    pub event_buffer: usize,
    /// How deep to buffer outbound publishes
    pub command_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for TransportConfig {
    fn from(cfg: &RelayConfig) -> Self {
        Self {
            url: cfg.url.clone(),
            reconnect_delay: Duration::from_millis(cfg.reconnect_delay_ms),
            heartbeat_outgoing_ms: cfg.heartbeat_outgoing_ms,
            heartbeat_incoming_ms: cfg.heartbeat_incoming_ms,
            handshake_timeout: Duration::from_millis(cfg.handshake_timeout_ms),
            event_buffer: cfg.event_buffer.max(1),
            command_buffer: cfg.command_buffer.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub connects: u64,
    pub frames_in: u64,
    pub frames_out: u64,
    pub decode_errors: u64,
    pub dropped_events: u64,
    pub dropped_publishes: u64,
}

#[derive(Debug, Default)]
struct LinkStatus {
    connected: bool,
    closed: bool,
    /// Bumped with `stats.connects`.
    generation: u64,
    stats: LinkStats,
}

type SharedStatus = Arc<RwLock<LinkStatus>>;

#[derive(Debug)]
enum Command {
    Publish { destination: String, body: Bytes },
}

// ---------------------------------------------------------------------------
// Handle (owned by the game thread)
// ---------------------------------------------------------------------------

pub struct TransportSession {
    events: Receiver<RelayEvent>,
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    status: SharedStatus,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl TransportSession {
    /// Spawn the bridge thread and start connecting in the background.
    ///
    /// Returns immediately; watch [`RelayLink::is_connected`] or the
    /// `Connected` event for the session to come up.
    pub fn connect(config: TransportConfig) -> Result<Self> {
        let (event_tx, event_rx) = crossbeam_channel::bounded(config.event_buffer);
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let status: SharedStatus = Arc::new(RwLock::new(LinkStatus::default()));

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let bridge_status = status.clone();
        let span = tracing::info_span!("relay", url = %config.url);
        let handle = thread::Builder::new()
            .name("arena-sync-relay".into())
            .spawn(move || {
                rt.block_on(
                    run_bridge(config, event_tx, cmd_rx, shutdown_rx, bridge_status)
                        .instrument(span),
                );
            })?;

        Ok(Self {
            events: event_rx,
            commands: cmd_tx,
            shutdown: shutdown_tx,
            status,
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn stats(&self) -> LinkStats {
        self.status.read().stats.clone()
    }

    /// Disconnect and give the bridge up to `timeout` to flush and exit.
    /// Returns `true` if the thread finished in time.
    pub fn close(&self, timeout: Duration) -> bool {
        self.disconnect();
        let deadline = Instant::now() + timeout;
        loop {
            let finished = match self.thread.lock().as_ref() {
                Some(h) => h.is_finished(),
                None => true,
            };
            if finished {
                if let Some(h) = self.thread.lock().take() {
                    let _ = h.join();
                }
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl RelayLink for TransportSession {
    fn is_connected(&self) -> bool {
        self.status.read().connected
    }

    fn connection_generation(&self) -> Option<u64> {
        let st = self.status.read();
        st.connected.then_some(st.generation)
    }

    fn publish(&self, destination: &str, body: Bytes) {
        if !self.is_connected() {
            return;
        }
        let cmd = Command::Publish {
            destination: destination.to_string(),
            body,
        };
        match self.commands.try_send(cmd) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("[transport] Outbound queue full – dropping publish to {}", destination);
                self.status.write().stats.dropped_publishes += 1;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn poll_events(&self, limit: usize) -> Vec<RelayEvent> {
        let mut out = Vec::new();
        while out.len() < limit {
            match self.events.try_recv() {
                Ok(ev) => out.push(ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    fn disconnect(&self) {
        {
            let mut st = self.status.write();
            if st.closed {
                return;
            }
            st.closed = true;
            st.connected = false;
        }
        log::info!("[transport] Disconnect requested");
        let _ = self.shutdown.send(true);
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ---------------------------------------------------------------------------
// Async bridge implementation
// ---------------------------------------------------------------------------

enum ConnectionEnd {
    Shutdown,
    Lost(String),
}

async fn run_bridge(
    config: TransportConfig,
    event_tx: Sender<RelayEvent>,
    mut cmd_rx: mpsc::Receiver<Command>,
    mut shutdown_rx: watch::Receiver<bool>,
    status: SharedStatus,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        log::info!("[transport] Connecting to {}", config.url);
        let end = run_connection(&config, &event_tx, &mut cmd_rx, &mut shutdown_rx, &status).await;

        let was_connected = {
            let mut st = status.write();
            std::mem::replace(&mut st.connected, false)
        };

        let reason = match end {
            ConnectionEnd::Shutdown => break,
            ConnectionEnd::Lost(reason) => reason,
        };

        if was_connected {
            log::warn!("[transport] Connection lost: {}", reason);
            emit(&event_tx, &status, RelayEvent::Disconnected { reason });
        } else {
            log::warn!("[transport] Connect failed: {}", reason);
        }

        log::info!(
            "[transport] Reconnecting in {} ms",
            config.reconnect_delay.as_millis()
        );
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.changed() => break,
        }

        // Nothing is queued across a disconnect.
        while cmd_rx.try_recv().is_ok() {}
    }

    status.write().connected = false;
    log::info!("[transport] Bridge stopped");
}

async fn run_connection(
    config: &TransportConfig,
    event_tx: &Sender<RelayEvent>,
    cmd_rx: &mut mpsc::Receiver<Command>,
    shutdown_rx: &mut watch::Receiver<bool>,
    status: &SharedStatus,
) -> ConnectionEnd {
    // --- socket --------------------------------------------------------
    let mut ws: WsStream = tokio::select! {
        r = tokio_tungstenite::connect_async(config.url.as_str()) => match r {
            Ok((ws, _response)) => ws,
            Err(e) => return ConnectionEnd::Lost(e.to_string()),
        },
        _ = shutdown_rx.changed() => return ConnectionEnd::Shutdown,
    };

    // --- STOMP handshake ----------------------------------------------
    let client_hb = (config.heartbeat_outgoing_ms, config.heartbeat_incoming_ms);
    let connect = stomp::connect_frame(stomp::host_of(&config.url), client_hb.0, client_hb.1);
    if let Err(e) = ws.send(Message::text(connect)).await {
        return ConnectionEnd::Lost(e.to_string());
    }

    let connected = tokio::select! {
        r = tokio::time::timeout(config.handshake_timeout, await_connected(&mut ws)) => match r {
            Ok(Ok(frame)) => frame,
            Ok(Err(reason)) => return ConnectionEnd::Lost(reason),
            Err(_) => return ConnectionEnd::Lost("handshake timed out".into()),
        },
        _ = shutdown_rx.changed() => {
            let _ = ws.close(None).await;
            return ConnectionEnd::Shutdown;
        }
    };

    let server_hb = connected
        .header("heart-beat")
        .map(stomp::parse_heartbeat)
        .unwrap_or((0, 0));
    let (hb_out, hb_in) = stomp::negotiate_heartbeat(client_hb, server_hb);

    for (i, topic) in topics::ALL.iter().enumerate() {
        let frame = stomp::subscribe_frame(&format!("sub-{}", i), topic);
        if let Err(e) = ws.send(Message::text(frame)).await {
            return ConnectionEnd::Lost(e.to_string());
        }
    }

    // Anything published before we were up is stale.
    while cmd_rx.try_recv().is_ok() {}

    {
        let mut st = status.write();
        if st.closed {
            drop(st);
            let _ = ws.close(None).await;
            return ConnectionEnd::Shutdown;
        }
        st.connected = true;
        st.generation += 1;
        st.stats.connects += 1;
    }
    let session = connected.header("session").map(str::to_string);
    log::info!(
        "[transport] Connected (session={:?}, heart-beat out={}ms in={}ms)",
        session,
        hb_out,
        hb_in
    );
    emit(event_tx, status, RelayEvent::Connected { session });

    // --- main loop ----------------------------------------------------
    let check_every = [hb_out, hb_in]
        .into_iter()
        .filter(|ms| *ms > 0)
        .min()
        .map(|ms| Duration::from_millis((ms / 2).max(100)))
        .unwrap_or(Duration::from_secs(1));
    let mut beat = tokio::time::interval(check_every);
    beat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_rx = Instant::now();
    let mut last_tx = Instant::now();

    loop {
        tokio::select! {
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    last_rx = Instant::now();
                    for frame in stomp::parse_frames(text.as_str()) {
                        if let Some(reason) = handle_frame(frame, event_tx, status) {
                            return ConnectionEnd::Lost(reason);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return ConnectionEnd::Lost("socket closed".into());
                }
                Some(Ok(_)) => {
                    last_rx = Instant::now();
                }
                Some(Err(e)) => return ConnectionEnd::Lost(e.to_string()),
            },

            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Publish { destination, body }) => {
                    if let Err(e) = send_publish(&mut ws, &destination, &body, status).await {
                        return ConnectionEnd::Lost(e);
                    }
                    last_tx = Instant::now();
                }
                // Every handle is gone: nobody left to publish for.
                None => {
                    say_goodbye(&mut ws).await;
                    return ConnectionEnd::Shutdown;
                }
            },

            _ = shutdown_rx.changed() => {
                // Flush what the game queued before asking to leave (e.g. unregister).
                while let Ok(Command::Publish { destination, body }) = cmd_rx.try_recv() {
                    if send_publish(&mut ws, &destination, &body, status).await.is_err() {
                        break;
                    }
                }
                say_goodbye(&mut ws).await;
                return ConnectionEnd::Shutdown;
            },

            _ = beat.tick() => {
                if hb_out > 0 && last_tx.elapsed() >= Duration::from_millis(hb_out) {
                    if let Err(e) = ws.send(Message::text(stomp::heartbeat_frame())).await {
                        return ConnectionEnd::Lost(e.to_string());
                    }
                    last_tx = Instant::now();
                }
                if hb_in > 0 && last_rx.elapsed() > Duration::from_millis(hb_in * 2) {
                    return ConnectionEnd::Lost("heart-beat timeout".into());
                }
            },
        }
    }
}

/// Read frames until `CONNECTED`.  `ERROR` or a closed socket fails.
async fn await_connected(ws: &mut WsStream) -> std::result::Result<stomp::StompFrame, String> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                for frame in stomp::parse_frames(text.as_str()) {
                    match frame.command.as_str() {
                        "CONNECTED" => return Ok(frame),
                        "ERROR" => {
                            return Err(format!(
                                "relay refused session: {}",
                                frame.header("message").unwrap_or("(no message)")
                            ))
                        }
                        _ => {}
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
    Err("socket closed during handshake".into())
}

/// Apply one inbound frame.  Returns a reason when the connection must drop.
fn handle_frame(
    frame: stomp::StompFrame,
    event_tx: &Sender<RelayEvent>,
    status: &SharedStatus,
) -> Option<String> {
    status.write().stats.frames_in += 1;
    match frame.command.as_str() {
        "MESSAGE" => {
            let destination = frame.header("destination").unwrap_or_default();
            match RelayEvent::decode(destination, &frame.body) {
                Ok(Some(ev)) => emit(event_tx, status, ev),
                Ok(None) => log::debug!("[transport] Ignoring message on {}", destination),
                Err(e) => {
                    log::warn!("[transport] Malformed body on {}: {}", destination, e);
                    status.write().stats.decode_errors += 1;
                }
            }
            None
        }
        "ERROR" => {
            let message = frame.header("message").unwrap_or("(no message)").to_string();
            log::error!("[transport] Relay ERROR frame: {} {}", message, frame.body);
            Some(format!("relay error: {}", message))
        }
        "RECEIPT" => {
            log::debug!("[transport] Receipt {:?}", frame.header("receipt-id"));
            None
        }
        other => {
            log::debug!("[transport] Ignoring {} frame", other);
            None
        }
    }
}

async fn send_publish(
    ws: &mut WsStream,
    destination: &str,
    body: &Bytes,
    status: &SharedStatus,
) -> std::result::Result<(), String> {
    let body = String::from_utf8_lossy(body);
    ws.send(Message::text(stomp::send_frame(destination, &body)))
        .await
        .map_err(|e| e.to_string())?;
    status.write().stats.frames_out += 1;
    Ok(())
}

async fn say_goodbye(ws: &mut WsStream) {
    let _ = ws
        .send(Message::text(stomp::disconnect_frame("disconnect")))
        .await;
    let _ = ws.close(None).await;
    log::info!("[transport] Session closed");
}

fn emit(event_tx: &Sender<RelayEvent>, status: &SharedStatus, ev: RelayEvent) {
    match event_tx.try_send(ev) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            log::warn!("[transport] Event channel full – dropping event");
            status.write().stats.dropped_events += 1;
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}
