//! Telemetry ingest channel
//!
//! `GET /ws/alerts` - one socket per hub. Every frame is handled on its own:
//! a malformed or unknown frame is logged and dropped, the socket stays open.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    actors::rack_state::IngestError,
    api::{
        socket::{Inbound, next_inbound},
        state::ApiState,
        types::{TelemetryAck, TelemetryFrame},
    },
};

/// WebSocket upgrade handler
///
/// GET /ws/alerts
pub async fn telemetry_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_hub_socket(socket, state))
}

#[instrument(skip_all)]
async fn handle_hub_socket(mut socket: WebSocket, state: ApiState) {
    info!("hub connected");

    loop {
        let payload = match next_inbound(&mut socket, state.idle_timeout).await {
            Inbound::Payload(payload) => payload,
            Inbound::Control => continue,
            Inbound::Closed => break,
            Inbound::Idle => {
                info!("hub idle for {:?}, closing", state.idle_timeout);
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        };

        let frame: TelemetryFrame = match serde_json::from_slice(&payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping malformed telemetry frame: {e}");
                continue;
            }
        };

        let update = match state
            .racks
            .ingest(&frame.hub_id, &frame.sensor_name, frame.temperature, frame.humidity)
            .await
        {
            Ok(update) => update,
            Err(IngestError::Catalog(e)) => {
                error!("catalog failure while applying reading: {e}");
                continue;
            }
            Err(e) => {
                warn!("dropping telemetry frame: {e}");
                continue;
            }
        };

        let ack = match serde_json::to_string(&TelemetryAck::from(&update)) {
            Ok(ack) => ack,
            Err(e) => {
                error!("failed to serialize acknowledgement: {e}");
                continue;
            }
        };

        if let Err(e) = socket.send(Message::Text(ack)).await {
            debug!("failed to acknowledge reading for rack {}: {e}", update.rack_id);
        }
    }

    info!("hub disconnected");
}
