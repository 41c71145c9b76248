//! Wire protocol for Tombola.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Envelope`], [`ClientRequest`], [`ServerEvent`], the
//!   view structs): the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding
//!   or decoding.
//!
//! The protocol layer knows nothing about sockets or game rules.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope<ClientRequest>) → Room (Session)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    CallView, CalledNumbersView, ClientRequest, Envelope, Grid, PlayerId, PlayerSummary,
    Recipient, RoomCode, RoomView, ServerEvent, TurnView,
};
