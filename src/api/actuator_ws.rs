//! Actuator controller channel
//!
//! `GET /ws/ac-control` - one socket per controller.
//!
//! A writer task drains the socket's command queue and pings a quiet
//! controller so the idle timeout only drops dead peers; the read loop below handles
//! `REGISTER` and `AC_STATUS_ACK`. On close every cluster this socket registered
//! for is unregistered, unless a newer socket has taken it over.

use std::collections::HashSet;
use std::time::Duration;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    ClusterId,
    actors::{
        actuator::{ConnectionId, ControlError},
        messages::ControlFrame,
    },
    api::{
        socket::{Inbound, next_inbound},
        state::ApiState,
        types::ControllerFrame,
    },
};

/// Commands buffered per controller before dispatch reports congestion
const CONTROL_QUEUE: usize = 16;

/// WebSocket upgrade handler
///
/// GET /ws/ac-control
pub async fn actuator_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_controller_socket(socket, state))
}

#[instrument(skip_all, fields(conn_id))]
async fn handle_controller_socket(socket: WebSocket, state: ApiState) {
    let conn_id = state.registry().next_connection_id();
    tracing::Span::current().record("conn_id", conn_id);

    info!("actuator controller connected");

    let (sink, mut stream) = socket.split();
    let (frame_tx, frame_rx) = mpsc::channel::<ControlFrame>(CONTROL_QUEUE);

    let keepalive = keepalive_period(state.idle_timeout);
    let mut writer = tokio::spawn(write_frames(sink, frame_rx, keepalive));

    let mut registered: HashSet<ClusterId> = HashSet::new();

    loop {
        let inbound = tokio::select! {
            inbound = next_inbound(&mut stream, state.idle_timeout) => inbound,
            _ = &mut writer => {
                debug!("writer finished, closing controller socket");
                break;
            }
        };

        let payload = match inbound {
            Inbound::Payload(payload) => payload,
            Inbound::Control => continue,
            Inbound::Closed => break,
            Inbound::Idle => {
                info!("controller idle for {:?}, closing", state.idle_timeout);
                break;
            }
        };

        match serde_json::from_slice::<ControllerFrame>(&payload) {
            Ok(frame) => {
                handle_frame(&state, conn_id, &frame_tx, &mut registered, frame).await;
            }
            Err(e) => warn!("dropping unrecognised controller frame: {e}"),
        }
    }

    for cluster_id in &registered {
        if state.registry().unregister(cluster_id, conn_id) {
            info!("actuator for cluster {cluster_id} unregistered");
        }
    }

    writer.abort();
    info!("actuator controller disconnected");
}

/// Ping interval keeping a quiet but healthy controller inside the idle timeout
fn keepalive_period(idle_timeout: Option<Duration>) -> Option<Duration> {
    idle_timeout.map(|idle| (idle / 3).max(Duration::from_millis(100)))
}

/// Drain the command queue into the socket, pinging whenever it is quiet.
///
/// The controller's pongs count as inbound traffic, so only a dead peer hits
/// the idle timeout.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut frame_rx: mpsc::Receiver<ControlFrame>,
    keepalive: Option<Duration>,
) {
    let mut ping = keepalive.map(|period| {
        let mut ping = interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping
    });

    loop {
        let message = tokio::select! {
            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                match serde_json::to_string(&frame) {
                    Ok(text) => Message::Text(text),
                    Err(e) => {
                        error!("failed to serialize control frame: {e}");
                        continue;
                    }
                }
            }
            _ = next_ping(&mut ping) => Message::Ping(Vec::new()),
        };

        if sink.send(message).await.is_err() {
            debug!("send failed, controller disconnected");
            break;
        }
    }
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(ping) => {
            ping.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn handle_frame(
    state: &ApiState,
    conn_id: ConnectionId,
    frame_tx: &mpsc::Sender<ControlFrame>,
    registered: &mut HashSet<ClusterId>,
    frame: ControllerFrame,
) {
    match frame {
        ControllerFrame::Register { cluster_id } => {
            match state.catalog.get_cluster(&cluster_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!("REGISTER for unknown cluster {cluster_id}, ignoring");
                    return;
                }
                Err(e) => {
                    error!("catalog failure while registering cluster {cluster_id}: {e}");
                    return;
                }
            }

            let replaced = state
                .registry()
                .register(cluster_id.clone(), conn_id, frame_tx.clone());

            if replaced {
                info!("actuator for cluster {cluster_id} registered, replacing previous controller");
            } else {
                info!("actuator for cluster {cluster_id} registered");
            }
            registered.insert(cluster_id);
        }

        ControllerFrame::AcStatusAck {
            cluster_id,
            ac,
            status,
        } => {
            let on = ac == 1;
            debug!(
                "ack from cluster {cluster_id}: ac={} status={}",
                if on { "ON" } else { "OFF" },
                status.as_deref().unwrap_or("-")
            );

            match state.gate.acknowledge(&cluster_id, on).await {
                Ok(()) => {}
                Err(ControlError::UnknownCluster(_)) => {
                    warn!("AC_STATUS_ACK for unknown cluster {cluster_id}, dropping");
                }
                Err(e) => error!("failed to record actuator state for {cluster_id}: {e}"),
            }
        }
    }
}
