//! Per-connection handler: identity, request routing, event delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Derive the PlayerId from the connection id, send `connected`
//!   2. Spawn a writer task that drains the player's event channel
//!   3. Loop: receive envelopes → dispatch to the registry or a room
//!   4. On exit, leave whatever room the player was in

use std::sync::Arc;

use tokio::sync::mpsc;
use tombola_protocol::{ClientRequest, Codec, Envelope, PlayerId, RoomCode, ServerEvent};
use tombola_room::{PlayerSender, RoomError, RoomHandle};
use tombola_transport::{Connection, WebSocketConnection};

use crate::TombolaError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Drop guard that removes the player from their room when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the registry call runs in a spawned task.
struct LeaveGuard<C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for LeaveGuard<C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if state.rooms.player_room(player_id).is_some() {
                if let Err(e) = state.rooms.leave(player_id).await {
                    tracing::debug!(%player_id, error = %e, "leave on disconnect failed");
                }
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), TombolaError> {
    let conn = Arc::new(conn);
    let player_id = PlayerId(conn.id().into_inner());
    tracing::info!(conn_id = %conn.id(), %player_id, "player connected");

    let (events, outbox) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_events(Arc::clone(&conn), Arc::clone(&state), outbox));
    let _ = events.send(ServerEvent::Connected {
        player_id,
        protocol_version: PROTOCOL_VERSION,
    });

    let _guard = LeaveGuard {
        player_id,
        state: Arc::clone(&state),
    };

    loop {
        let remaining = state.idle_timeout.saturating_sub(conn.idle_for());
        let data = match tokio::time::timeout(remaining, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            // Control frames refresh activity without surfacing here.
            Err(_) if conn.idle_for() < state.idle_timeout => continue,
            Err(_) => {
                tracing::info!(%player_id, "connection idle, closing");
                break;
            }
        };

        let envelope: Envelope<ClientRequest> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                let _ = events.send(ServerEvent::Error {
                    message: format!("malformed request: {e}"),
                });
                continue;
            }
        };

        tracing::trace!(%player_id, room = ?envelope.payload.room_code(), "request received");
        if let Err(e) = dispatch(&state, player_id, &events, envelope.payload).await {
            tracing::debug!(%player_id, error = %e, "request rejected");
            let _ = events.send(ServerEvent::Error {
                message: e.to_string(),
            });
        }
    }

    writer.abort();
    let _ = conn.close().await;
    // _guard drops here → the player leaves their room.
    Ok(())
}

/// Encodes events in order and writes them to the connection.
///
/// Ends when the connection fails or every sender is gone.
async fn write_events<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut outbox: mpsc::UnboundedReceiver<ServerEvent>,
) {
    let mut seq: u64 = 1;
    while let Some(event) = outbox.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: state.uptime_ms(),
            payload: event,
        };
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(conn_id = %conn.id(), error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// Applies one request on behalf of `player_id`.
///
/// Successful requests answer through the room's broadcasts; only
/// rejections come back here.
async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    player_id: PlayerId,
    events: &PlayerSender,
    request: ClientRequest,
) -> Result<(), RoomError> {
    match request {
        ClientRequest::Heartbeat { client_time } => {
            let _ = events.send(ServerEvent::HeartbeatAck {
                client_time,
                server_time: state.uptime_ms(),
            });
        }
        ClientRequest::CreateRoom { name, board_size } => {
            let name = display_name(name, player_id);
            state
                .rooms
                .create(player_id, name, board_size, events.clone())?;
        }
        ClientRequest::JoinRoom { room_id, name } => {
            let name = display_name(name, player_id);
            state
                .rooms
                .join(&room_id, player_id, name, events.clone())
                .await?;
        }
        ClientRequest::LeaveRoom { room_id } => {
            if state.rooms.player_room(player_id).as_ref() != Some(&room_id) {
                return Err(RoomError::NotInRoom(player_id, room_id));
            }
            state.rooms.leave(player_id).await?;
        }
        ClientRequest::StartGame { room_id } => {
            room_for(state, player_id, &room_id)?.start(player_id).await?;
        }
        ClientRequest::Rematch { room_id } => {
            room_for(state, player_id, &room_id)?.rematch(player_id).await?;
        }
        ClientRequest::CallNumber { room_id, number } => {
            room_for(state, player_id, &room_id)?
                .call_number(player_id, number)
                .await?;
        }
        ClientRequest::MarkDone { room_id } => {
            let handle = state.rooms.get(&room_id)?;
            if state.rooms.player_room(player_id).as_ref() != Some(handle.code()) {
                tracing::trace!(%player_id, room = %room_id, "acknowledgment from non-member ignored");
                return Ok(());
            }
            handle.acknowledge(player_id).await?;
        }
        ClientRequest::ClaimBingo {
            room_id,
            marked,
            name,
        } => {
            room_for(state, player_id, &room_id)?
                .claim_win(player_id, marked, name)
                .await?;
        }
    }
    Ok(())
}

/// Resolves `code` to a room the player is seated in.
fn room_for<C: Codec>(
    state: &ServerState<C>,
    player_id: PlayerId,
    code: &RoomCode,
) -> Result<RoomHandle, RoomError> {
    let handle = state.rooms.get(code)?;
    if state.rooms.player_room(player_id).as_ref() != Some(handle.code()) {
        return Err(RoomError::NotInRoom(player_id, handle.code().clone()));
    }
    Ok(handle)
}

fn display_name(name: String, player_id: PlayerId) -> String {
    match name.trim() {
        "" => format!("Player {}", player_id.0),
        trimmed => trimmed.to_string(),
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
