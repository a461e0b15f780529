/// WebSocket transport for live chat rooms
///
/// Clients authenticate with the session token (query parameter or bearer
/// header), then exchange JSON frames of the form
/// `{"event": "...", "data": {...}}`.
///
/// ## Connection health
/// - Ping every 30 seconds when the socket has been idle
/// - Sends time out after 5 seconds and drop the slow client
/// - Lagging room subscribers are told how many events they missed
use crate::{
    api::middleware::extract_bearer_token,
    chat::{ChatConnection, ClientEvent, RoomBroadcast, ServerEvent},
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time::{interval, timeout, Duration, Instant},
};

const SEND_TIMEOUT_MS: u64 = 5000;
const PING_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    pub token: Option<String>,
}

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/chat/ws", get(chat_socket))
}

/// Authenticate, then upgrade
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    Query(params): Query<SocketParams>,
    headers: HeaderMap,
    State(ctx): State<AppContext>,
) -> AppResult<Response> {
    let token = params
        .token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| extract_bearer_token(&headers))
        .ok_or_else(|| AppError::Authentication("Authentication error".to_string()))?;

    let account = ctx.account_manager.validate_session(&token).await?;
    tracing::info!(account_id = %account.id, "Chat socket connected");

    let connection = ChatConnection::new(account, ctx.chat.clone(), ctx.rooms.clone());
    Ok(ws.on_upgrade(move |socket| run_connection(socket, connection)))
}

async fn run_connection(socket: WebSocket, mut connection: ChatConnection) {
    let (mut sender, mut receiver) = socket.split();
    let mut room_rx: Option<broadcast::Receiver<RoomBroadcast>> = None;

    let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            // Fan out room events
            received = next_broadcast(&mut room_rx) => {
                let event = match received {
                    Ok(broadcast) if connection.accepts(&broadcast) => broadcast.event,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(connection = %connection.id(), missed, "Chat subscriber lagged");
                        ServerEvent::Error {
                            message: format!("Missed {} events, please reload the room", missed),
                        }
                    }
                    Err(RecvError::Closed) => {
                        room_rx = None;
                        continue;
                    }
                };

                match send_event_with_timeout(&mut sender, &event).await {
                    Ok(_) => last_activity = Instant::now(),
                    Err(SendError::Timeout) => {
                        tracing::warn!(connection = %connection.id(), "Send timeout, client may be slow");
                        break;
                    }
                    Err(SendError::Disconnected) => {
                        tracing::debug!("Client disconnected during send");
                        break;
                    }
                }
            }

            _ = ping_interval.tick() => {
                if last_activity.elapsed() > Duration::from_secs(PING_INTERVAL_SECS)
                    && sender.send(Message::Ping(vec![])).await.is_err()
                {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();

                        let (joined, reply) = match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => connection.handle(event).await,
                            Err(e) => {
                                tracing::debug!(error = %e, "Unreadable chat frame");
                                (None, Some(ServerEvent::Error {
                                    message: "Invalid event".to_string(),
                                }))
                            }
                        };

                        if let Some(rx) = joined {
                            room_rx = Some(rx);
                        }
                        if let Some(reply) = reply {
                            if send_event_with_timeout(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!("Client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        tracing::debug!("Client disconnected");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!(connection = %connection.id(), room = ?connection.room(), "Chat socket closed");
    connection.disconnect();
}

/// Pends forever until a room has been joined
async fn next_broadcast(
    rx: &mut Option<broadcast::Receiver<RoomBroadcast>>,
) -> Result<RoomBroadcast, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[derive(Debug)]
enum SendError {
    Timeout,
    Disconnected,
}

async fn send_event_with_timeout(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), SendError> {
    let json = serde_json::to_string(event).map_err(|_| SendError::Disconnected)?;

    match timeout(
        Duration::from_millis(SEND_TIMEOUT_MS),
        sender.send(Message::Text(json)),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(SendError::Disconnected),
        Err(_) => Err(SendError::Timeout),
    }
}
