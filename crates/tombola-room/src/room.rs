//! Room actor: an isolated Tokio task that owns one [`Session`].
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc mailbox. Requests, departures and deadline firings all arrive
//! as [`RoomCommand`]s and are applied one at a time, so every state
//! machine operation is atomic with respect to every other.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tombola_protocol::{Grid, PlayerId, Recipient, RoomCode, RoomView, ServerEvent};

use crate::session::{AckOutcome, Call, Winner};
use crate::{Phase, RoomConfig, RoomError, Session};

/// Channel sender for delivering events to one player's connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to a room actor through its mailbox.
///
/// Variants with a `reply` are request/response: the caller waits on the
/// oneshot for the outcome.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<RoomView, RoomError>>,
    },

    /// Replies with the number of participants left.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    Start {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Rematch {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Call {
        player_id: PlayerId,
        number: u32,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Acknowledge {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    ClaimWin {
        player_id: PlayerId,
        marked: Grid<bool>,
        name: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// The acknowledgment window for call `call_seq` elapsed. Posted by
    /// the room's own timer task.
    Deadline { call_seq: u64 },

    Snapshot { reply: oneshot::Sender<RoomInfo> },
}

/// A point-in-time summary of a room, for the registry and tests.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: Phase,
    pub host: PlayerId,
    pub player_count: usize,
    pub max_players: usize,
    pub turn_index: usize,
    pub turn_locked: bool,
    pub called_numbers: Vec<u32>,
    pub current_call: Option<Call>,
    /// Participants that still owe an acknowledgment.
    pub outstanding: usize,
    pub winner: Option<Winner>,
}

/// Handle to a running room actor.
///
/// Cheap to clone: it wraps an `mpsc::Sender`. The registry holds one per
/// room and hands out clones so callers never hold the registry lock while
/// waiting on a room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Join { .. } => "Join",
            Self::Leave { .. } => "Leave",
            Self::Start { .. } => "Start",
            Self::Rematch { .. } => "Rematch",
            Self::Call { .. } => "Call",
            Self::Acknowledge { .. } => "Acknowledge",
            Self::ClaimWin { .. } => "ClaimWin",
            Self::Deadline { .. } => "Deadline",
            Self::Snapshot { .. } => "Snapshot",
        };
        f.write_str(name)
    }
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Seats a player and returns the room as they now see it.
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<RoomView, RoomError> {
        self.request(|reply| RoomCommand::Join {
            player_id,
            name,
            sender,
            reply,
        })
        .await?
    }

    /// Removes a player; returns how many participants remain.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    pub async fn start(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Start { player_id, reply })
            .await?
    }

    pub async fn rematch(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Rematch { player_id, reply })
            .await?
    }

    pub async fn call_number(&self, player_id: PlayerId, number: u32) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Call {
            player_id,
            number,
            reply,
        })
        .await?
    }

    /// Acknowledges the current call. Stale acknowledgments, and those
    /// from players the room does not know, succeed and do nothing.
    pub async fn acknowledge(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Acknowledge { player_id, reply })
            .await?
    }

    pub async fn claim_win(
        &self,
        player_id: PlayerId,
        marked: Grid<bool>,
        name: String,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::ClaimWin {
            player_id,
            marked,
            name,
            reply,
        })
        .await?
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RoomActor {
    session: Session,
    senders: HashMap<PlayerId, PlayerSender>,
    ack_window: Duration,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Weak so that a sleeping timer never keeps the room alive.
    mailbox: mpsc::WeakSender<RoomCommand>,
    deadline: Option<AbortHandle>,
}

impl RoomActor {
    /// Processes commands until the room empties or every handle is gone.
    async fn run(mut self) {
        let code = self.session.code().clone();
        tracing::info!(room = %code, "room actor started");

        let host = self.session.host();
        self.send_to(host, ServerEvent::RoomJoined(self.session.room_view()));

        while let Some(cmd) = self.receiver.recv().await {
            tracing::trace!(room = %code, command = ?cmd, "room command");
            match cmd {
                RoomCommand::Join {
                    player_id,
                    name,
                    sender,
                    reply,
                } => {
                    let _ = reply.send(self.handle_join(player_id, name, sender));
                }
                RoomCommand::Leave { player_id, reply } => {
                    let result = self.handle_leave(player_id);
                    let empty = matches!(result, Ok(0));
                    let _ = reply.send(result);
                    if empty {
                        break;
                    }
                }
                RoomCommand::Start { player_id, reply } => {
                    let _ = reply.send(self.handle_start(player_id, false));
                }
                RoomCommand::Rematch { player_id, reply } => {
                    let _ = reply.send(self.handle_start(player_id, true));
                }
                RoomCommand::Call {
                    player_id,
                    number,
                    reply,
                } => {
                    let _ = reply.send(self.handle_call(player_id, number));
                }
                RoomCommand::Acknowledge { player_id, reply } => {
                    let _ = reply.send(self.handle_acknowledge(player_id));
                }
                RoomCommand::ClaimWin {
                    player_id,
                    marked,
                    name,
                    reply,
                } => {
                    let _ = reply.send(self.handle_claim(player_id, marked, &name));
                }
                RoomCommand::Deadline { call_seq } => self.handle_deadline(call_seq),
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.info());
                }
            }
        }

        self.disarm_deadline();
        tracing::info!(room = %code, "room actor stopped");
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<RoomView, RoomError> {
        self.session.add_participant(player_id, name)?;
        self.senders.insert(player_id, sender);
        tracing::info!(
            room = %self.session.code(),
            %player_id,
            players = self.session.participants().len(),
            "player joined"
        );

        let view = self.session.room_view();
        self.dispatch(vec![(Recipient::All, ServerEvent::RoomUpdated(view.clone()))]);
        if self.session.is_started() {
            // Catch the newcomer up; they get a board on the next deal.
            self.dispatch(vec![
                (Recipient::Player(player_id), self.turn_update()),
                (Recipient::Player(player_id), self.called_update()),
            ]);
        }
        Ok(view)
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<usize, RoomError> {
        let departure = self
            .session
            .remove_participant(player_id)
            .ok_or_else(|| RoomError::NotInRoom(player_id, self.session.code().clone()))?;
        self.senders.remove(&player_id);
        tracing::info!(
            room = %self.session.code(),
            %player_id,
            players = departure.remaining,
            "player left"
        );

        if departure.call_completed {
            self.disarm_deadline();
        }
        if departure.remaining > 0 {
            let mut events = vec![(Recipient::All, ServerEvent::RoomUpdated(self.session.room_view()))];
            if self.session.is_started() {
                events.push((Recipient::All, self.turn_update()));
                events.push((Recipient::All, self.called_update()));
            }
            self.dispatch(events);
        }
        Ok(departure.remaining)
    }

    fn handle_start(&mut self, player_id: PlayerId, rematch: bool) -> Result<(), RoomError> {
        let mut rng = rand::rng();
        if rematch {
            self.session.rematch(player_id, &mut rng)?;
        } else {
            self.session.start(player_id, &mut rng)?;
        }
        self.disarm_deadline();
        tracing::info!(
            room = %self.session.code(),
            players = self.session.participants().len(),
            rematch,
            "game started"
        );

        let board_size = self.session.board_size();
        let mut events: Vec<_> = self
            .session
            .participants()
            .iter()
            .filter_map(|p| {
                let board = p.board.clone()?;
                Some((
                    Recipient::Player(p.id),
                    ServerEvent::GameStarted { board, board_size },
                ))
            })
            .collect();
        events.push((Recipient::All, self.turn_update()));
        events.push((Recipient::All, self.called_update()));
        self.dispatch(events);
        Ok(())
    }

    fn handle_call(&mut self, player_id: PlayerId, number: u32) -> Result<(), RoomError> {
        let issued = self.session.call(player_id, number, epoch_millis())?;
        tracing::debug!(
            room = %self.session.code(),
            %player_id,
            number,
            call_seq = issued.seq,
            "number called"
        );

        if !issued.completed {
            self.arm_deadline(issued.seq);
        }
        self.dispatch(vec![
            (Recipient::All, self.called_update()),
            (Recipient::All, self.turn_update()),
        ]);
        Ok(())
    }

    fn handle_acknowledge(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        match self.session.acknowledge(player_id) {
            AckOutcome::Ignored => {
                tracing::trace!(room = %self.session.code(), %player_id, "stale acknowledgment");
                return Ok(());
            }
            AckOutcome::Recorded => {}
            AckOutcome::Completed => {
                self.disarm_deadline();
                tracing::debug!(room = %self.session.code(), "all acknowledged, turn advanced");
            }
        }
        self.dispatch(vec![
            (Recipient::All, self.turn_update()),
            (Recipient::All, self.called_update()),
        ]);
        Ok(())
    }

    fn handle_claim(&mut self, player_id: PlayerId, marked: Grid<bool>, name: &str) -> Result<(), RoomError> {
        let winner = self.session.claim_win(player_id, marked, name)?;
        self.disarm_deadline();
        tracing::info!(
            room = %self.session.code(),
            winner = %winner.id,
            name = %winner.name,
            "winner declared"
        );
        self.dispatch(vec![(
            Recipient::All,
            ServerEvent::WinnerDeclared {
                winner_id: winner.id,
                winner_name: winner.name,
            },
        )]);
        Ok(())
    }

    fn handle_deadline(&mut self, call_seq: u64) {
        if !self.session.expire_call(call_seq) {
            tracing::trace!(room = %self.session.code(), call_seq, "stale deadline ignored");
            return;
        }
        self.deadline = None;
        tracing::debug!(
            room = %self.session.code(),
            call_seq,
            outstanding = ?self.session.pending_names(),
            "acknowledgment window elapsed, turn advanced"
        );
        self.dispatch(vec![(Recipient::All, self.turn_update())]);
    }

    /// Schedules a [`RoomCommand::Deadline`] for `call_seq` one ack
    /// window from now, replacing any earlier timer.
    fn arm_deadline(&mut self, call_seq: u64) {
        self.disarm_deadline();
        let mailbox = self.mailbox.clone();
        let window = self.ack_window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(RoomCommand::Deadline { call_seq }).await;
            }
        });
        self.deadline = Some(timer.abort_handle());
    }

    fn disarm_deadline(&mut self) {
        if let Some(timer) = self.deadline.take() {
            timer.abort();
        }
    }

    fn turn_update(&self) -> ServerEvent {
        ServerEvent::TurnUpdate(self.session.turn_view())
    }

    fn called_update(&self) -> ServerEvent {
        ServerEvent::CalledNumbersUpdate(self.session.called_numbers_view())
    }

    /// Delivers events in order to their recipients.
    fn dispatch(&self, events: Vec<(Recipient, ServerEvent)>) {
        for (recipient, event) in events {
            match recipient {
                Recipient::All => {
                    for p in self.session.participants() {
                        self.send_to(p.id, event.clone());
                    }
                }
                Recipient::Player(pid) => self.send_to(pid, event),
            }
        }
    }

    /// Silently drops the event if the player's connection is gone.
    fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        let s = &self.session;
        RoomInfo {
            code: s.code().clone(),
            phase: s.phase(),
            host: s.host(),
            player_count: s.participants().len(),
            max_players: s.max_players(),
            turn_index: s.turn_index(),
            turn_locked: s.is_turn_locked(),
            called_numbers: s.called_numbers().to_vec(),
            current_call: s.current_call().copied(),
            outstanding: s.outstanding(),
            winner: s.winner().cloned(),
        }
    }
}

/// Milliseconds since the Unix epoch, for call expiry timestamps.
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Spawns the actor for a freshly created `session` and returns a handle.
///
/// The session's host is the only participant; `host_sender` is their
/// outbound channel and receives `RoomJoined` as soon as the actor runs.
pub(crate) fn spawn_room(session: Session, host_sender: PlayerSender, config: &RoomConfig) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_size);
    let code = session.code().clone();

    let actor = RoomActor {
        senders: HashMap::from([(session.host(), host_sender)]),
        session,
        ack_window: config.ack_window,
        receiver: rx,
        mailbox: tx.downgrade(),
        deadline: None,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
