//! Room configuration and the game phase machine.

use std::time::Duration;

use tracing::warn;

use crate::RoomError;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room on a server.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Maximum participants per room. Never above [`Self::MAX_PLAYERS_CAP`].
    pub max_players: usize,

    /// How long players have to acknowledge a call before the turn is
    /// forced forward.
    pub ack_window: Duration,

    /// Smallest board dimension a room may be created with.
    pub min_board_size: usize,

    /// Largest board dimension a room may be created with.
    pub max_board_size: usize,

    /// Length of generated room codes.
    pub code_len: usize,

    /// Capacity of each room actor's command mailbox.
    pub mailbox_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: Self::MAX_PLAYERS_CAP,
            ack_window: Duration::from_secs(10),
            min_board_size: 3,
            max_board_size: 10,
            code_len: 6,
            mailbox_size: 64,
        }
    }
}

impl RoomConfig {
    /// Hard cap on participants per room.
    pub const MAX_PLAYERS_CAP: usize = 10;

    /// Shortest code length we accept; shorter codes collide too often.
    pub const MIN_CODE_LEN: usize = 4;

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`RoomRegistry::new`](crate::RoomRegistry::new). Rules:
    /// - `max_players` clamped to `1..=MAX_PLAYERS_CAP`.
    /// - `min_board_size` at least 1, `max_board_size` at least `min_board_size`.
    /// - `code_len` at least [`Self::MIN_CODE_LEN`], `mailbox_size` at least 1.
    pub fn validated(mut self) -> Self {
        if self.max_players == 0 || self.max_players > Self::MAX_PLAYERS_CAP {
            warn!(
                max_players = self.max_players,
                cap = Self::MAX_PLAYERS_CAP,
                "max_players out of range, clamping"
            );
            self.max_players = self.max_players.clamp(1, Self::MAX_PLAYERS_CAP);
        }
        self.min_board_size = self.min_board_size.max(1);
        if self.max_board_size < self.min_board_size {
            warn!(
                min = self.min_board_size,
                max = self.max_board_size,
                "max_board_size below min_board_size, raising"
            );
            self.max_board_size = self.min_board_size;
        }
        self.code_len = self.code_len.max(Self::MIN_CODE_LEN);
        self.mailbox_size = self.mailbox_size.max(1);
        self
    }

    /// Checks a requested board dimension against the configured bounds.
    pub fn validate_board_size(&self, size: usize) -> Result<(), RoomError> {
        if (self.min_board_size..=self.max_board_size).contains(&size) {
            Ok(())
        } else {
            Err(RoomError::InvalidBoardSize {
                size,
                min: self.min_board_size,
                max: self.max_board_size,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a room's game currently is.
///
/// ```text
/// Lobby ──start──→ Open ──call──→ Pending ──all acked / deadline──→ Open
///                    │                │
///                    └──── claim ─────┴──→ Finished ──rematch──→ Open
/// ```
///
/// The phase is derived from the session's flags rather than stored, so it
/// can never disagree with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Players are gathering; no boards yet.
    Lobby,
    /// The turn-holder may call a number.
    Open,
    /// A call is out and acknowledgments are outstanding.
    Pending,
    /// A winner has been declared.
    Finished,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::Open => write!(f, "Open"),
            Self::Pending => write!(f, "Pending"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}
