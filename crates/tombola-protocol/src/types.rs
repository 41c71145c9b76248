//! Core protocol types for Tombola's wire format.
//!
//! Every type here is serialized to JSON and sent over the network, so the
//! serde attributes are part of the contract with the browser client:
//! requests and events are internally tagged by `"type"` and every name on
//! the wire is camelCase.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A square grid stored row-major: `grid[row][col]`.
pub type Grid<T> = Vec<Vec<T>>;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Assigned by the server from the transport's connection id; it carries
/// no authentication meaning. Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A short, human-shareable room code such as `"K3QZ8A"`.
///
/// Codes are normalized on construction (surrounding whitespace trimmed,
/// letters uppercased) so that a code typed as `" k3qz8a"` finds the same
/// room. Deserialization goes through the same normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Creates a normalized room code.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for RoomCode {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive a server event produced by a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every participant in the room.
    All,
    /// One participant (private boards, targeted notices).
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every frame on the wire is an envelope.
///
/// `seq` counts frames per connection and direction; `timestamp` is
/// milliseconds since the server started. Clients may omit both on the
/// requests they send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub timestamp: u64,
    pub payload: P,
}

// ---------------------------------------------------------------------------
// Views: what the server reveals about a room
// ---------------------------------------------------------------------------

/// A roster entry: just enough to show a name next to a turn marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
}

/// Public room metadata sent on join and on roster changes.
///
/// Boards are private and never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: RoomCode,
    pub board_size: usize,
    pub host_id: PlayerId,
    pub players: Vec<PlayerSummary>,
    pub game_started: bool,
    pub current_turn_index: usize,
    pub winner: Option<PlayerSummary>,
}

/// The call currently in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallView {
    pub number: u32,
    /// Acknowledgment deadline, in milliseconds since the Unix epoch.
    pub expires_at: u64,
}

/// Payload of `turnUpdate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnView {
    pub current_turn_index: usize,
    pub players: Vec<PlayerSummary>,
    pub turn_locked: bool,
    /// Participants that still owe an acknowledgment for the current call.
    pub remaining: usize,
    pub pending_names: Vec<String>,
}

/// Payload of `calledNumbersUpdate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalledNumbersView {
    pub called_numbers: Vec<u32>,
    pub current_call: Option<CallView>,
    pub remaining: usize,
    pub pending_names: Vec<String>,
}

// ---------------------------------------------------------------------------
// ClientRequest
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do.
///
/// ```json
/// { "type": "callNumber", "roomId": "K3QZ8A", "number": 17 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    /// Open a new room with the sender as host.
    CreateRoom { name: String, board_size: usize },

    /// Join an existing room by code.
    JoinRoom { room_id: RoomCode, name: String },

    /// Host only: deal boards and begin.
    StartGame { room_id: RoomCode },

    /// Turn-holder only: put a number in play.
    CallNumber { room_id: RoomCode, number: u32 },

    /// "I have finished reacting to the current call."
    MarkDone { room_id: RoomCode },

    /// Claim a win with the client's marking grid.
    ClaimBingo {
        room_id: RoomCode,
        marked: Grid<bool>,
        #[serde(default)]
        name: String,
    },

    /// Host only: start over in the same room.
    Rematch { room_id: RoomCode },

    /// Leave the room without closing the connection.
    LeaveRoom { room_id: RoomCode },

    /// Keep-alive. Echoed back with the server's clock.
    Heartbeat { client_time: u64 },
}

impl ClientRequest {
    /// The room this request targets, if it targets one.
    pub fn room_code(&self) -> Option<&RoomCode> {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::StartGame { room_id }
            | Self::CallNumber { room_id, .. }
            | Self::MarkDone { room_id }
            | Self::ClaimBingo { room_id, .. }
            | Self::Rematch { room_id }
            | Self::LeaveRoom { room_id } => Some(room_id),
            Self::CreateRoom { .. } | Self::Heartbeat { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Everything the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// First frame on every connection: tells the client who it is.
    Connected { player_id: PlayerId, protocol_version: u32 },

    /// To the creator of a room.
    RoomJoined(RoomView),

    /// To the whole room whenever the roster changes.
    RoomUpdated(RoomView),

    /// Private: the receiving participant's board.
    GameStarted { board: Grid<u32>, board_size: usize },

    TurnUpdate(TurnView),

    CalledNumbersUpdate(CalledNumbersView),

    WinnerDeclared { winner_id: PlayerId, winner_name: String },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// A rejected request. Only ever sent to the requester.
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================
