//! Unified error type for the Tombola server.

use tombola_protocol::ProtocolError;
use tombola_room::RoomError;
use tombola_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TombolaError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A rejected room request.
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tombola_protocol::RoomCode;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let tombola_err: TombolaError = err.into();
        assert!(matches!(tombola_err, TombolaError::Transport(_)));
        assert!(tombola_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let tombola_err: TombolaError = err.into();
        assert!(matches!(tombola_err, TombolaError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error_keeps_message() {
        let err = RoomError::NotFound(RoomCode::new("ABC234"));
        let tombola_err: TombolaError = err.into();
        assert!(matches!(tombola_err, TombolaError::Room(_)));
        assert_eq!(tombola_err.to_string(), "room ABC234 not found");
    }
}
