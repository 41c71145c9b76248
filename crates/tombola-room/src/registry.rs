//! Room registry: creates, tracks, and retires rooms, and routes players
//! to them.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::Rng;
use tombola_protocol::{PlayerId, RoomCode, RoomView};

use crate::room::spawn_room;
use crate::{PlayerSender, RoomConfig, RoomError, RoomHandle, Session};

/// Characters room codes are drawn from. Omits `I`, `O`, `0` and `1`,
/// which are easy to misread when a code is shared aloud.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// How many fresh codes to try before giving up.
const MAX_CODE_ATTEMPTS: usize = 64;

/// Draws a random room code of `len` characters from [`CODE_ALPHABET`].
pub fn generate_code<R: Rng + ?Sized>(len: usize, rng: &mut R) -> RoomCode {
    let code: String = (0..len)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect();
    RoomCode::new(code)
}

/// Draws codes until one is not live.
pub fn unique_code<R: Rng + ?Sized>(
    len: usize,
    rng: &mut R,
    is_live: impl Fn(&RoomCode) -> bool,
) -> Result<RoomCode, RoomError> {
    (0..MAX_CODE_ATTEMPTS)
        .map(|_| generate_code(len, rng))
        .find(|code| !is_live(code))
        .ok_or(RoomError::CodeSpaceExhausted)
}

/// Tracks every live room and which room each player is in.
///
/// A player is in at most one room at a time. The registry never touches
/// game state; it only spawns room actors and forwards roster changes.
///
/// The tables sit behind a short synchronous lock that is never held
/// while a room is awaited.
#[derive(Debug)]
pub struct RoomRegistry {
    config: RoomConfig,
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    rooms: HashMap<RoomCode, RoomHandle>,
    player_rooms: HashMap<PlayerId, RoomCode>,
}

impl Tables {
    fn retire(&mut self, code: &RoomCode) {
        if self.rooms.remove(code).is_some() {
            self.player_rooms.retain(|_, c| c != code);
            tracing::info!(room = %code, "room retired");
        }
    }
}

impl RoomRegistry {
    /// Creates an empty registry. `config` is validated first.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: config.validated(),
            tables: Mutex::new(Tables::default()),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room of dimension `board_size` with `host` as its only
    /// participant.
    ///
    /// `sender` receives the host's events, starting with `RoomJoined`.
    pub fn create(
        &self,
        host: PlayerId,
        host_name: String,
        board_size: usize,
        sender: PlayerSender,
    ) -> Result<RoomCode, RoomError> {
        let mut tables = self.tables.lock();
        if let Some(current) = tables.player_rooms.get(&host) {
            return Err(RoomError::AlreadyInRoom(host, current.clone()));
        }
        self.config.validate_board_size(board_size)?;

        let code = unique_code(self.config.code_len, &mut rand::rng(), |c| {
            tables.rooms.contains_key(c)
        })?;
        let session = Session::new(code.clone(), board_size, host, host_name, &self.config);
        let handle = spawn_room(session, sender, &self.config);

        tables.rooms.insert(code.clone(), handle);
        tables.player_rooms.insert(host, code.clone());
        tracing::info!(room = %code, %host, board_size, "room created");
        Ok(code)
    }

    /// Seats `player` in the room with `code`.
    pub async fn join(
        &self,
        code: &RoomCode,
        player: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<RoomView, RoomError> {
        let handle = {
            let tables = self.tables.lock();
            if let Some(current) = tables.player_rooms.get(&player) {
                return Err(RoomError::AlreadyInRoom(player, current.clone()));
            }
            Self::live(&tables, code)?
        };

        match handle.join(player, name, sender).await {
            Ok(view) => {
                self.tables
                    .lock()
                    .player_rooms
                    .insert(player, handle.code().clone());
                Ok(view)
            }
            Err(RoomError::Unavailable(code)) => {
                self.tables.lock().retire(&code);
                Err(RoomError::NotFound(code))
            }
            Err(e) => Err(e),
        }
    }

    /// Removes `player` from whatever room they are in. The room is
    /// retired once nobody is left.
    pub async fn leave(&self, player: PlayerId) -> Result<RoomCode, RoomError> {
        let (code, handle) = {
            let mut tables = self.tables.lock();
            let code = tables
                .player_rooms
                .remove(&player)
                .ok_or(RoomError::NotInAnyRoom(player))?;
            let handle = tables.rooms.get(&code).cloned();
            (code, handle)
        };
        let Some(handle) = handle else {
            return Ok(code);
        };

        match handle.leave(player).await {
            Ok(0) | Err(RoomError::Unavailable(_)) => {
                self.tables.lock().retire(&code);
            }
            Ok(_) => {}
            Err(e) => return Err(e),
        }
        Ok(code)
    }

    /// Looks up a live room.
    pub fn get(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        Self::live(&self.tables.lock(), code)
    }

    /// The room `player` is in, if any.
    pub fn player_room(&self, player: PlayerId) -> Option<RoomCode> {
        self.tables.lock().player_rooms.get(&player).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.tables.lock().rooms.len()
    }

    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.tables.lock().rooms.keys().cloned().collect()
    }

    fn live(tables: &Tables, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        tables
            .rooms
            .get(code)
            .filter(|handle| !handle.is_closed())
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }
}
