//! # Tombola
//!
//! A turn-based Bingo room server.
//!
//! Players create or join rooms by a short code, take turns calling
//! numbers, and acknowledge each call. A turn advances as soon as every
//! participant has acknowledged, or when the acknowledgment window runs
//! out, whichever comes first.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tombola::prelude::*;
//!
//! # async fn run() -> Result<(), TombolaError> {
//! let server = TombolaServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::TombolaError;
pub use server::{
    DEFAULT_BIND, DEFAULT_IDLE_TIMEOUT, PROTOCOL_VERSION, TombolaServer, TombolaServerBuilder,
};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{PROTOCOL_VERSION, TombolaError, TombolaServer, TombolaServerBuilder};
    pub use tombola_protocol::{
        CallView, CalledNumbersView, ClientRequest, Envelope, Grid, PlayerId, PlayerSummary,
        RoomCode, RoomView, ServerEvent, TurnView,
    };
    pub use tombola_room::{RoomConfig, RoomError};
}
