//! Receive side shared by both socket channels

use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};

/// What the next read from a socket produced
#[derive(Debug)]
pub enum Inbound {
    /// A text or binary payload
    Payload(Vec<u8>),
    /// Ping/pong or another frame with nothing to handle
    Control,
    /// Closed by the peer or by a transport error
    Closed,
    /// Nothing received within the idle timeout
    Idle,
}

/// Read the next frame, giving up after `idle` of silence
pub async fn next_inbound<S>(stream: &mut S, idle: Option<Duration>) -> Inbound
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let next = match idle {
        Some(idle) => match tokio::time::timeout(idle, stream.next()).await {
            Ok(next) => next,
            Err(_) => return Inbound::Idle,
        },
        None => stream.next().await,
    };

    match next {
        Some(Ok(Message::Text(text))) => Inbound::Payload(text.into_bytes()),
        Some(Ok(Message::Binary(data))) => Inbound::Payload(data),
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => Inbound::Closed,
        // pongs are sent by axum
        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => Inbound::Control,
    }
}
