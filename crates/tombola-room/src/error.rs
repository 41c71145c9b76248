//! Error types for the room layer.
//!
//! Every variant is a rejected request: the room's state is untouched and
//! the `Display` text is what the requester sees.

use tombola_protocol::{PlayerId, RoomCode};

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room already holds its maximum number of participants.
    #[error("room {0} is full ({1} players)")]
    RoomFull(RoomCode, usize),

    /// The player is already in a room.
    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The player is not a participant of this room.
    #[error("player {0} is not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The player is not in any room.
    #[error("player {0} is not in any room")]
    NotInAnyRoom(PlayerId),

    /// A host-only action was requested by someone else.
    #[error("only the host can do that")]
    NotHost,

    /// The game has not been started yet.
    #[error("the game has not started")]
    NotStarted,

    /// A call is still waiting for acknowledgments.
    #[error("waiting for players to finish the current call")]
    TurnLocked,

    /// The requester does not hold the current turn.
    #[error("it is not your turn")]
    NotYourTurn,

    /// The called number is outside `1..=N²`.
    #[error("number {number} is out of range (1-{max})")]
    NumberOutOfRange { number: u32, max: u32 },

    /// The number was already called this game.
    #[error("number {0} has already been called")]
    AlreadyCalled(u32),

    /// The game is finished; no more calls.
    #[error("the game is over")]
    GameOver,

    /// Someone already won this game.
    #[error("{0} has already won this game")]
    WinnerAlreadyDeclared(String),

    /// The claimed marking grid does not show a win.
    #[error("invalid bingo: {0}")]
    InvalidBingo(String),

    /// The requested board dimension is outside the configured bounds.
    #[error("board size {size} is not allowed ({min}-{max})")]
    InvalidBoardSize { size: usize, min: usize, max: usize },

    /// No free room code could be found.
    #[error("no free room code available, try again")]
    CodeSpaceExhausted,

    /// The room's actor is gone or its mailbox is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}
