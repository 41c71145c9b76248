//! Rooms for Tombola.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns a
//! [`Session`]: the participants, their boards, and the turn/call state
//! machine. Requests, departures and acknowledgment deadlines all reach
//! the session through the room's mailbox, one at a time.
//!
//! # Key types
//!
//! - [`Session`]: the turn/call/acknowledgment state machine
//! - [`RoomRegistry`]: creates, looks up and retires rooms
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`RoomConfig`]: capacity, ack window, board bounds
//! - [`generate_board`] / [`is_bingo`]: boards and win detection

mod board;
mod config;
mod error;
mod registry;
mod room;
mod session;
mod validator;

pub use board::{find_cell, generate_board};
pub use config::{Phase, RoomConfig};
pub use error::RoomError;
pub use registry::{CODE_ALPHABET, RoomRegistry, generate_code, unique_code};
pub use room::{PlayerSender, RoomHandle, RoomInfo};
pub use session::{AckOutcome, Call, CallIssued, Departure, Participant, Session, Winner};
pub use validator::{check_shape, is_bingo};
