//! The turn/call state machine for one room.
//!
//! A [`Session`] is plain data plus synchronous transitions. It never
//! sleeps, spawns, or sends: the room actor owns one, runs each operation
//! to completion, and turns the result into broadcasts and timers. That
//! keeps every rule here testable without a runtime.
//!
//! # Turn cycle
//!
//! ```text
//! call(n)        → number appended, call seq += 1, turn locked,
//!                  every participant owes an ack, caller acks itself
//! acknowledge(p) → p marked; if nobody is outstanding, advance now
//! expire(seq)    → advance, but only if call `seq` is still the one pending
//! ```
//!
//! The call seq is never reset, not even by a rematch, so a deadline armed
//! for an earlier call can always be recognised as stale.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tombola_protocol::{
    CallView, CalledNumbersView, Grid, PlayerId, PlayerSummary, RoomCode, RoomView, TurnView,
};

use crate::board::{find_cell, generate_board};
use crate::validator::{check_shape, is_bingo};
use crate::{Phase, RoomConfig, RoomError};

/// A player seated in a room.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: PlayerId,
    pub name: String,
    /// Dealt on start; `None` for players who joined after the deal.
    pub board: Option<Grid<u32>>,
    /// Cells the server has seen this player mark.
    pub marked: Grid<bool>,
}

impl Participant {
    fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            board: None,
            marked: Vec::new(),
        }
    }

    fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// The number currently in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub number: u32,
    /// Identity of this call within the room. Strictly increasing.
    pub seq: u64,
    /// Acknowledgment deadline, milliseconds since the Unix epoch.
    pub expires_at: u64,
}

/// The declared winner of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub id: PlayerId,
    pub name: String,
}

/// Result of a successful [`Session::call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallIssued {
    pub seq: u64,
    /// The caller's own acknowledgment already completed the call (a
    /// room of one); the turn has advanced and no deadline is needed.
    pub completed: bool,
}

/// What an acknowledgment did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Nothing changed: no call pending, unknown player, already
    /// acknowledged, or the game is over.
    Ignored,
    /// Recorded; others are still outstanding.
    Recorded,
    /// Recorded and it was the last one; the turn advanced.
    Completed,
}

/// What a departure did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// Participants left after the removal.
    pub remaining: usize,
    /// The departure removed the last outstanding acknowledgment and
    /// the turn advanced.
    pub call_completed: bool,
}

/// Game state for one room.
#[derive(Debug, Clone)]
pub struct Session {
    code: RoomCode,
    board_size: usize,
    max_players: usize,
    ack_window: Duration,
    participants: Vec<Participant>,
    host: PlayerId,
    started: bool,
    called: Vec<u32>,
    current_call: Option<Call>,
    turn_index: usize,
    turn_locked: bool,
    acks: HashMap<PlayerId, bool>,
    winner: Option<Winner>,
    last_call_seq: u64,
}

impl Session {
    /// Opens a room with `host` as its only participant.
    pub fn new(
        code: RoomCode,
        board_size: usize,
        host: PlayerId,
        host_name: String,
        config: &RoomConfig,
    ) -> Self {
        Self {
            code,
            board_size,
            max_players: config.max_players,
            ack_window: config.ack_window,
            participants: vec![Participant::new(host, host_name)],
            host,
            started: false,
            called: Vec::new(),
            current_call: None,
            turn_index: 0,
            turn_locked: false,
            acks: HashMap::from([(host, true)]),
            winner: None,
            last_call_seq: 0,
        }
    }

    // -- Accessors -------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    pub fn host(&self) -> PlayerId {
        self.host
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: PlayerId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.participant(id).is_some()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn called_numbers(&self) -> &[u32] {
        &self.called
    }

    pub fn current_call(&self) -> Option<&Call> {
        self.current_call.as_ref()
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn is_turn_locked(&self) -> bool {
        self.turn_locked
    }

    /// Whether `id` has responded to the current call. `None` for
    /// players the room doesn't know.
    pub fn acknowledged(&self, id: PlayerId) -> Option<bool> {
        self.acks.get(&id).copied()
    }

    pub fn winner(&self) -> Option<&Winner> {
        self.winner.as_ref()
    }

    /// The participant whose turn it is.
    pub fn turn_holder(&self) -> Option<&Participant> {
        self.participants.get(self.turn_index)
    }

    pub fn phase(&self) -> Phase {
        if self.winner.is_some() {
            Phase::Finished
        } else if !self.started {
            Phase::Lobby
        } else if self.turn_locked {
            Phase::Pending
        } else {
            Phase::Open
        }
    }

    /// Largest number that can be called: N².
    pub fn max_number(&self) -> u32 {
        u32::try_from(self.board_size * self.board_size).unwrap_or(u32::MAX)
    }

    /// Number of participants that still owe an acknowledgment.
    pub fn outstanding(&self) -> usize {
        self.acks.values().filter(|&&done| !done).count()
    }

    /// Names of the participants that still owe an acknowledgment, in
    /// turn order.
    pub fn pending_names(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| self.acks.get(&p.id) == Some(&false))
            .map(|p| p.name.clone())
            .collect()
    }

    // -- Roster ----------------------------------------------------------

    /// Seats a new participant at the end of the turn order.
    ///
    /// A player joining while a call is pending was not there when it was
    /// issued, so they are recorded as having already responded.
    pub fn add_participant(&mut self, id: PlayerId, name: String) -> Result<(), RoomError> {
        if self.contains(id) {
            return Err(RoomError::AlreadyInRoom(id, self.code.clone()));
        }
        if self.participants.len() >= self.max_players {
            return Err(RoomError::RoomFull(self.code.clone(), self.max_players));
        }
        self.participants.push(Participant::new(id, name));
        self.acks.insert(id, true);
        Ok(())
    }

    /// Removes a participant and repairs turn order, host, and the
    /// pending call.
    ///
    /// Returns `None` if `id` was not seated here.
    pub fn remove_participant(&mut self, id: PlayerId) -> Option<Departure> {
        let idx = self.participants.iter().position(|p| p.id == id)?;
        self.participants.remove(idx);
        self.acks.remove(&id);

        let len = self.participants.len();
        if len == 0 {
            self.turn_index = 0;
            self.turn_locked = false;
            return Some(Departure {
                remaining: 0,
                call_completed: false,
            });
        }

        if idx < self.turn_index {
            self.turn_index -= 1;
        } else if idx == self.turn_index {
            let follower = idx % len;
            // While a call is in flight the next advance must land on the
            // follower, so park the index just before it.
            self.turn_index = if self.turn_locked {
                (follower + len - 1) % len
            } else {
                follower
            };
        }

        if self.host == id {
            self.host = self.participants[0].id;
        }

        let call_completed = self.winner.is_none()
            && self.turn_locked
            && self.outstanding() == 0
            && self.advance_turn();

        Some(Departure {
            remaining: len,
            call_completed,
        })
    }

    // -- Game ------------------------------------------------------------

    /// Host only: deals fresh boards and resets the game.
    pub fn start<R: Rng + ?Sized>(&mut self, requester: PlayerId, rng: &mut R) -> Result<(), RoomError> {
        if requester != self.host {
            return Err(RoomError::NotHost);
        }

        let n = self.board_size;
        for p in &mut self.participants {
            p.board = Some(generate_board(n, rng));
            p.marked = vec![vec![false; n]; n];
        }
        self.called.clear();
        self.current_call = None;
        self.winner = None;
        self.turn_index = 0;
        self.turn_locked = false;
        self.acks = self.participants.iter().map(|p| (p.id, true)).collect();
        self.started = true;
        Ok(())
    }

    /// Host only: starts a new game with the same participants.
    pub fn rematch<R: Rng + ?Sized>(&mut self, requester: PlayerId, rng: &mut R) -> Result<(), RoomError> {
        self.start(requester, rng)
    }

    /// The turn-holder puts `number` in play.
    ///
    /// `now_ms` is the current time in milliseconds since the Unix epoch;
    /// the call expires one ack window later.
    pub fn call(&mut self, requester: PlayerId, number: u32, now_ms: u64) -> Result<CallIssued, RoomError> {
        if self.winner.is_some() {
            return Err(RoomError::GameOver);
        }
        if !self.started {
            return Err(RoomError::NotStarted);
        }
        if self.turn_locked {
            return Err(RoomError::TurnLocked);
        }
        if self.turn_holder().map(|p| p.id) != Some(requester) {
            return Err(RoomError::NotYourTurn);
        }
        let max = self.max_number();
        if number == 0 || number > max {
            return Err(RoomError::NumberOutOfRange { number, max });
        }
        if self.called.contains(&number) {
            return Err(RoomError::AlreadyCalled(number));
        }

        self.called.push(number);
        self.last_call_seq += 1;
        let window_ms = u64::try_from(self.ack_window.as_millis()).unwrap_or(u64::MAX);
        self.current_call = Some(Call {
            number,
            seq: self.last_call_seq,
            expires_at: now_ms.saturating_add(window_ms),
        });
        self.turn_locked = true;
        self.acks = self.participants.iter().map(|p| (p.id, false)).collect();

        let completed = self.record_ack(requester) == AckOutcome::Completed;
        Ok(CallIssued {
            seq: self.last_call_seq,
            completed,
        })
    }

    /// Records that `id` has finished reacting to the current call.
    ///
    /// Never an error: stale or duplicate acknowledgments are ignored.
    pub fn acknowledge(&mut self, id: PlayerId) -> AckOutcome {
        if self.winner.is_some() || !self.turn_locked || self.current_call.is_none() {
            return AckOutcome::Ignored;
        }
        self.record_ack(id)
    }

    /// Unlocks and passes the turn to the next participant.
    ///
    /// Does nothing unless a call is pending, so a second advance for the
    /// same call is harmless. Returns whether it advanced.
    pub fn advance_turn(&mut self) -> bool {
        if !self.turn_locked || self.participants.is_empty() {
            return false;
        }
        self.turn_locked = false;
        self.turn_index = (self.turn_index + 1) % self.participants.len();
        true
    }

    /// Deadline for call `seq` elapsed.
    ///
    /// Advances only if that exact call is still the one pending; a timer
    /// from an earlier call, or one that lost the race against the last
    /// acknowledgment, is a no-op.
    pub fn expire_call(&mut self, seq: u64) -> bool {
        let is_current = self.current_call.is_some_and(|call| call.seq == seq);
        if !is_current || self.winner.is_some() {
            return false;
        }
        self.advance_turn()
    }

    /// `id` claims a win with their marking grid.
    ///
    /// Beyond the line check, every marked cell must hold a number that
    /// has actually been called on the claimant's own board.
    pub fn claim_win(&mut self, id: PlayerId, marked: Grid<bool>, name: &str) -> Result<Winner, RoomError> {
        let idx = self
            .participants
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| RoomError::NotInRoom(id, self.code.clone()))?;
        if let Some(winner) = &self.winner {
            return Err(RoomError::WinnerAlreadyDeclared(winner.name.clone()));
        }
        if !self.started {
            return Err(RoomError::NotStarted);
        }
        check_shape(&marked, self.board_size).map_err(RoomError::InvalidBingo)?;

        let claimant = &self.participants[idx];
        let board = claimant
            .board
            .as_ref()
            .ok_or_else(|| RoomError::InvalidBingo("you have no board in this game".into()))?;
        for (row, cells) in marked.iter().enumerate() {
            for (col, _) in cells.iter().enumerate().filter(|(_, on)| **on) {
                let number = board[row][col];
                if !self.called.contains(&number) {
                    return Err(RoomError::InvalidBingo(format!("{number} has not been called")));
                }
            }
        }
        if !is_bingo(&marked) {
            return Err(RoomError::InvalidBingo("no complete row, column, or diagonal".into()));
        }

        let name = match name.trim() {
            "" => claimant.name.clone(),
            given => given.to_string(),
        };
        let winner = Winner { id, name };
        self.participants[idx].marked = marked;
        self.winner = Some(winner.clone());
        Ok(winner)
    }

    // -- Views -----------------------------------------------------------

    pub fn room_view(&self) -> RoomView {
        RoomView {
            room_id: self.code.clone(),
            board_size: self.board_size,
            host_id: self.host,
            players: self.roster(),
            game_started: self.started,
            current_turn_index: self.turn_index,
            winner: self.winner.as_ref().map(|w| PlayerSummary {
                id: w.id,
                name: w.name.clone(),
            }),
        }
    }

    pub fn turn_view(&self) -> TurnView {
        TurnView {
            current_turn_index: self.turn_index,
            players: self.roster(),
            turn_locked: self.turn_locked,
            remaining: self.outstanding(),
            pending_names: self.pending_names(),
        }
    }

    pub fn called_numbers_view(&self) -> CalledNumbersView {
        CalledNumbersView {
            called_numbers: self.called.clone(),
            current_call: self.current_call.map(|call| CallView {
                number: call.number,
                expires_at: call.expires_at,
            }),
            remaining: self.outstanding(),
            pending_names: self.pending_names(),
        }
    }

    fn roster(&self) -> Vec<PlayerSummary> {
        self.participants.iter().map(Participant::summary).collect()
    }

    // -- Internals -------------------------------------------------------

    fn record_ack(&mut self, id: PlayerId) -> AckOutcome {
        match self.acks.get_mut(&id) {
            Some(done) if !*done => *done = true,
            _ => return AckOutcome::Ignored,
        }
        self.mark_current_call(id);

        if self.outstanding() == 0 && self.advance_turn() {
            AckOutcome::Completed
        } else {
            AckOutcome::Recorded
        }
    }

    fn mark_current_call(&mut self, id: PlayerId) {
        let Some(call) = self.current_call else {
            return;
        };
        let Some(p) = self.participants.iter_mut().find(|p| p.id == id) else {
            return;
        };
        if let Some((row, col)) = p.board.as_ref().and_then(|b| find_cell(b, call.number)) {
            p.marked[row][col] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the state machine, named
    //! `test_{operation}_{scenario}_{expected}`.

    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const HOST: PlayerId = PlayerId(1);
    const GUEST: PlayerId = PlayerId(2);
    const THIRD: PlayerId = PlayerId(3);
    const NOW: u64 = 1_700_000_000_000;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn lobby(size: usize) -> Session {
        let mut s = Session::new(
            RoomCode::new("TEST01"),
            size,
            HOST,
            "Host".into(),
            &RoomConfig::default(),
        );
        s.add_participant(GUEST, "Guest".into()).unwrap();
        s
    }

    /// Dimension 3, host + guest, started.
    fn started() -> Session {
        let mut s = lobby(3);
        s.start(HOST, &mut rng()).unwrap();
        s
    }

    /// Marking grid that selects the cells of `numbers` on `id`'s board.
    fn marks_for(s: &Session, id: PlayerId, numbers: &[u32]) -> Grid<bool> {
        let board = s.participant(id).unwrap().board.clone().unwrap();
        let n = board.len();
        let mut marked = vec![vec![false; n]; n];
        for &number in numbers {
            let (r, c) = find_cell(&board, number).unwrap();
            marked[r][c] = true;
        }
        marked
    }

    /// Calls every number in `numbers`, acknowledging each with everyone.
    fn play(s: &mut Session, numbers: &[u32]) {
        for &number in numbers {
            let caller = s.turn_holder().unwrap().id;
            s.call(caller, number, NOW).unwrap();
            let ids: Vec<_> = s.participants().iter().map(|p| p.id).collect();
            for id in ids {
                s.acknowledge(id);
            }
        }
    }

    // =====================================================================
    // start / rematch
    // =====================================================================

    #[test]
    fn test_start_by_host_deals_boards_and_opens() {
        let s = started();

        assert_eq!(s.phase(), Phase::Open);
        assert_eq!(s.turn_index(), 0);
        assert!(!s.is_turn_locked());
        assert_eq!(s.outstanding(), 0);
        for p in s.participants() {
            let board = p.board.as_ref().expect("dealt");
            assert_eq!(board.len(), 3);
            assert_eq!(p.marked, vec![vec![false; 3]; 3]);
            assert_eq!(s.acknowledged(p.id), Some(true));
        }
    }

    #[test]
    fn test_start_by_non_host_is_rejected() {
        let mut s = lobby(3);
        assert_eq!(s.start(GUEST, &mut rng()), Err(RoomError::NotHost));
        assert_eq!(s.phase(), Phase::Lobby);
    }

    #[test]
    fn test_rematch_resets_history_winner_and_turn() {
        let mut s = started();
        play(&mut s, &[1, 2, 3]);
        let board = s.participant(GUEST).unwrap().board.clone().unwrap();
        let line: Vec<u32> = board[0].clone();
        // Make sure the guest's first row has been called, then claim it.
        let missing: Vec<u32> = line
            .iter()
            .copied()
            .filter(|n| !s.called_numbers().contains(n))
            .collect();
        play(&mut s, &missing);
        let marked = marks_for(&s, GUEST, &line);
        s.claim_win(GUEST, marked, "").unwrap();
        assert_eq!(s.phase(), Phase::Finished);

        assert_eq!(s.rematch(GUEST, &mut rng()), Err(RoomError::NotHost));
        s.rematch(HOST, &mut rng()).unwrap();

        assert_eq!(s.phase(), Phase::Open);
        assert!(s.called_numbers().is_empty());
        assert!(s.current_call().is_none());
        assert!(s.winner().is_none());
        assert_eq!(s.turn_index(), 0);
    }

    // =====================================================================
    // call
    // =====================================================================

    #[test]
    fn test_call_turn_holder_locks_and_self_acknowledges() {
        let mut s = started();

        let issued = s.call(HOST, 5, NOW).unwrap();

        assert!(!issued.completed);
        let call = s.current_call().unwrap();
        assert_eq!(call.number, 5);
        assert_eq!(call.seq, issued.seq);
        assert_eq!(call.expires_at, NOW + 10_000);
        assert_eq!(s.called_numbers(), &[5]);
        assert!(s.is_turn_locked());
        assert_eq!(s.phase(), Phase::Pending);
        assert_eq!(s.acknowledged(HOST), Some(true));
        assert_eq!(s.acknowledged(GUEST), Some(false));
        assert_eq!(s.pending_names(), vec!["Guest".to_string()]);
    }

    #[test]
    fn test_call_marks_callers_cell() {
        let mut s = started();
        s.call(HOST, 5, NOW).unwrap();

        let host = s.participant(HOST).unwrap();
        let (r, c) = find_cell(host.board.as_ref().unwrap(), 5).unwrap();
        assert!(host.marked[r][c]);
    }

    #[test]
    fn test_call_before_start_is_rejected() {
        let mut s = lobby(3);
        assert_eq!(s.call(HOST, 5, NOW), Err(RoomError::NotStarted));
    }

    #[test]
    fn test_call_out_of_turn_is_rejected_without_mutation() {
        let mut s = started();
        assert_eq!(s.call(GUEST, 5, NOW), Err(RoomError::NotYourTurn));
        assert!(s.called_numbers().is_empty());
        assert!(!s.is_turn_locked());
    }

    #[test]
    fn test_call_out_of_range_is_rejected() {
        let mut s = started();
        assert_eq!(
            s.call(HOST, 0, NOW),
            Err(RoomError::NumberOutOfRange { number: 0, max: 9 })
        );
        assert_eq!(
            s.call(HOST, 10, NOW),
            Err(RoomError::NumberOutOfRange { number: 10, max: 9 })
        );
        assert!(s.call(HOST, 9, NOW).is_ok());
    }

    #[test]
    fn test_call_while_locked_is_rejected() {
        let mut s = started();
        s.call(HOST, 5, NOW).unwrap();
        assert_eq!(s.call(HOST, 6, NOW), Err(RoomError::TurnLocked));
        assert_eq!(s.called_numbers(), &[5]);
    }

    #[test]
    fn test_call_repeat_number_is_rejected() {
        let mut s = started();
        play(&mut s, &[5]);
        assert_eq!(s.turn_index(), 1);
        assert_eq!(s.call(GUEST, 5, NOW), Err(RoomError::AlreadyCalled(5)));
        assert!(!s.is_turn_locked());
    }

    #[test]
    fn test_call_every_number_once_then_none_left() {
        let mut s = started();
        let all: Vec<u32> = (1..=9).collect();
        play(&mut s, &all);

        let mut called = s.called_numbers().to_vec();
        called.sort_unstable();
        assert_eq!(called, all);
        let caller = s.turn_holder().unwrap().id;
        for n in 1..=9 {
            assert_eq!(s.call(caller, n, NOW), Err(RoomError::AlreadyCalled(n)));
        }
    }

    #[test]
    fn test_call_seq_strictly_increases_across_rematch() {
        let mut s = started();
        let first = s.call(HOST, 1, NOW).unwrap().seq;
        s.rematch(HOST, &mut rng()).unwrap();
        let second = s.call(HOST, 1, NOW).unwrap().seq;
        assert!(second > first);
    }

    #[test]
    fn test_call_in_room_of_one_completes_immediately() {
        let mut s = Session::new(
            RoomCode::new("SOLO01"),
            3,
            HOST,
            "Host".into(),
            &RoomConfig::default(),
        );
        s.start(HOST, &mut rng()).unwrap();

        let issued = s.call(HOST, 4, NOW).unwrap();

        assert!(issued.completed);
        assert!(!s.is_turn_locked());
        assert_eq!(s.turn_index(), 0);
    }

    // =====================================================================
    // acknowledge
    // =====================================================================

    #[test]
    fn test_acknowledge_last_player_advances_immediately() {
        let mut s = started();
        s.call(HOST, 5, NOW).unwrap();

        assert_eq!(s.acknowledge(GUEST), AckOutcome::Completed);

        assert_eq!(s.acknowledged(GUEST), Some(true));
        assert_eq!(s.turn_index(), 1);
        assert!(!s.is_turn_locked());
        assert_eq!(s.phase(), Phase::Open);
    }

    #[test]
    fn test_acknowledge_twice_is_same_as_once() {
        let mut s = lobby(3);
        s.add_participant(THIRD, "Third".into()).unwrap();
        s.start(HOST, &mut rng()).unwrap();
        s.call(HOST, 5, NOW).unwrap();

        assert_eq!(s.acknowledge(GUEST), AckOutcome::Recorded);
        let before = (s.turn_index(), s.is_turn_locked(), s.outstanding());
        assert_eq!(s.acknowledge(GUEST), AckOutcome::Ignored);
        assert_eq!((s.turn_index(), s.is_turn_locked(), s.outstanding()), before);
    }

    #[test]
    fn test_acknowledge_without_pending_call_is_ignored() {
        let mut s = started();
        assert_eq!(s.acknowledge(GUEST), AckOutcome::Ignored);
        assert_eq!(s.turn_index(), 0);
    }

    #[test]
    fn test_acknowledge_unknown_player_is_ignored() {
        let mut s = started();
        s.call(HOST, 5, NOW).unwrap();
        assert_eq!(s.acknowledge(PlayerId(99)), AckOutcome::Ignored);
        assert!(s.is_turn_locked());
    }

    #[test]
    fn test_acknowledge_after_advance_is_stale() {
        let mut s = started();
        s.call(HOST, 5, NOW).unwrap();
        s.acknowledge(GUEST);
        // A duplicate that arrives after the turn moved on.
        assert_eq!(s.acknowledge(GUEST), AckOutcome::Ignored);
        assert_eq!(s.turn_index(), 1);
    }

    // =====================================================================
    // advance_turn / expire_call
    // =====================================================================

    #[test]
    fn test_advance_turn_is_idempotent_per_call() {
        let mut s = started();
        s.call(HOST, 5, NOW).unwrap();
        assert!(s.advance_turn());
        assert!(!s.advance_turn());
        assert_eq!(s.turn_index(), 1);
    }

    #[test]
    fn test_advance_turn_wraps_around() {
        let mut s = started();
        play(&mut s, &[1, 2]);
        assert_eq!(s.turn_index(), 0);
    }

    #[test]
    fn test_expire_call_without_acks_advances_exactly_once() {
        let mut s = started();
        let seq = s.call(HOST, 5, NOW).unwrap().seq;

        assert!(s.expire_call(seq));
        assert_eq!(s.turn_index(), 1);
        assert!(!s.is_turn_locked());

        assert!(!s.expire_call(seq));
        assert_eq!(s.turn_index(), 1);
    }

    #[test]
    fn test_expire_call_after_fast_path_is_noop() {
        let mut s = started();
        let seq = s.call(HOST, 5, NOW).unwrap().seq;
        s.acknowledge(GUEST);

        assert!(!s.expire_call(seq));
        assert_eq!(s.turn_index(), 1);
    }

    #[test]
    fn test_expire_call_stale_seq_does_not_advance_later_call() {
        let mut s = started();
        let first = s.call(HOST, 5, NOW).unwrap().seq;
        s.acknowledge(GUEST);
        let second = s.call(GUEST, 6, NOW).unwrap().seq;

        assert!(!s.expire_call(first));
        assert!(s.is_turn_locked());
        assert_eq!(s.turn_index(), 1);

        assert!(s.expire_call(second));
        assert_eq!(s.turn_index(), 0);
    }

    #[test]
    fn test_late_ack_after_expiry_is_ignored() {
        let mut s = started();
        let seq = s.call(HOST, 5, NOW).unwrap().seq;
        s.expire_call(seq);

        assert_eq!(s.acknowledge(GUEST), AckOutcome::Ignored);
        assert_eq!(s.turn_index(), 1);
    }

    // =====================================================================
    // claim_win
    // =====================================================================

    #[test]
    fn test_claim_win_single_corner_is_rejected() {
        let mut s = started();
        let corner = s.participant(HOST).unwrap().board.as_ref().unwrap()[0][2];
        play(&mut s, &[corner]);
        let mut marked = vec![vec![false; 3]; 3];
        marked[0][2] = true;

        let result = s.claim_win(HOST, marked, "Host");

        assert!(matches!(result, Err(RoomError::InvalidBingo(_))));
        assert!(s.winner().is_none());
    }

    #[test]
    fn test_claim_win_with_called_row_succeeds() {
        let mut s = started();
        let row = s.participant(GUEST).unwrap().board.as_ref().unwrap()[1].clone();
        play(&mut s, &row);
        let marked = marks_for(&s, GUEST, &row);

        let winner = s.claim_win(GUEST, marked.clone(), "Winnie").unwrap();

        assert_eq!(winner, Winner { id: GUEST, name: "Winnie".into() });
        assert_eq!(s.phase(), Phase::Finished);
        assert_eq!(s.participant(GUEST).unwrap().marked, marked);
    }

    #[test]
    fn test_claim_win_blank_name_falls_back_to_display_name() {
        let mut s = started();
        let row = s.participant(HOST).unwrap().board.as_ref().unwrap()[0].clone();
        play(&mut s, &row);
        let marked = marks_for(&s, HOST, &row);

        let winner = s.claim_win(HOST, marked, "  ").unwrap();
        assert_eq!(winner.name, "Host");
    }

    #[test]
    fn test_claim_win_uncalled_numbers_are_rejected() {
        let mut s = started();
        // A full row, but nothing has been called.
        let mut marked = vec![vec![false; 3]; 3];
        marked[2] = vec![true; 3];

        let result = s.claim_win(GUEST, marked, "Guest");

        assert!(matches!(result, Err(RoomError::InvalidBingo(msg)) if msg.contains("has not been called")));
    }

    #[test]
    fn test_claim_win_wrong_shape_is_rejected() {
        let mut s = started();
        let result = s.claim_win(HOST, vec![vec![true; 4]; 4], "Host");
        assert!(matches!(result, Err(RoomError::InvalidBingo(_))));
    }

    #[test]
    fn test_claim_win_second_claim_is_rejected_and_winner_kept() {
        let mut s = started();
        let all: Vec<u32> = (1..=9).collect();
        play(&mut s, &all);
        let full = vec![vec![true; 3]; 3];

        s.claim_win(HOST, full.clone(), "Host").unwrap();
        let second = s.claim_win(GUEST, full, "Guest");

        assert_eq!(second, Err(RoomError::WinnerAlreadyDeclared("Host".into())));
        assert_eq!(s.winner().unwrap().id, HOST);
    }

    #[test]
    fn test_claim_win_before_start_is_rejected() {
        let mut s = lobby(3);
        assert_eq!(
            s.claim_win(HOST, vec![vec![true; 3]; 3], "Host"),
            Err(RoomError::NotStarted)
        );
    }

    #[test]
    fn test_after_winner_calls_and_acks_do_nothing() {
        let mut s = started();
        let row = s.participant(HOST).unwrap().board.as_ref().unwrap()[0].clone();
        play(&mut s, &row);
        // Leave a call pending when the win lands.
        let extra = (1..=9).find(|n| !row.contains(n)).unwrap();
        let caller = s.turn_holder().unwrap().id;
        let seq = s.call(caller, extra, NOW).unwrap().seq;

        let marked = marks_for(&s, HOST, &row);
        s.claim_win(HOST, marked, "").unwrap();
        let index = s.turn_index();

        assert_eq!(s.acknowledge(GUEST), AckOutcome::Ignored);
        assert!(!s.expire_call(seq));
        assert_eq!(s.turn_index(), index);
        let next = s.turn_holder().unwrap().id;
        assert_eq!(s.call(next, 9, NOW), Err(RoomError::GameOver));
    }

    // =====================================================================
    // roster changes
    // =====================================================================

    #[test]
    fn test_add_participant_respects_capacity() {
        let config = RoomConfig {
            max_players: 2,
            ..RoomConfig::default()
        };
        let mut s = Session::new(RoomCode::new("CAP001"), 3, HOST, "Host".into(), &config);
        s.add_participant(GUEST, "Guest".into()).unwrap();

        let result = s.add_participant(THIRD, "Third".into());

        assert_eq!(result, Err(RoomError::RoomFull(RoomCode::new("CAP001"), 2)));
        assert_eq!(s.participants().len(), 2);
    }

    #[test]
    fn test_add_participant_duplicate_is_rejected() {
        let mut s = lobby(3);
        assert!(matches!(
            s.add_participant(GUEST, "Again".into()),
            Err(RoomError::AlreadyInRoom(GUEST, _))
        ));
    }

    #[test]
    fn test_late_joiner_is_not_outstanding_for_pending_call() {
        let mut s = started();
        s.call(HOST, 5, NOW).unwrap();

        s.add_participant(THIRD, "Late".into()).unwrap();

        assert_eq!(s.acknowledged(THIRD), Some(true));
        assert_eq!(s.outstanding(), 1);
        assert_eq!(s.acknowledge(GUEST), AckOutcome::Completed);
    }

    #[test]
    fn test_remove_outstanding_player_completes_call() {
        let mut s = started();
        s.call(HOST, 5, NOW).unwrap();

        let departure = s.remove_participant(GUEST).unwrap();

        assert_eq!(departure, Departure { remaining: 1, call_completed: true });
        assert!(!s.is_turn_locked());
        assert_eq!(s.turn_index(), 0);
    }

    #[test]
    fn test_remove_turn_holder_during_call_hands_turn_to_follower() {
        let mut s = lobby(3);
        s.add_participant(THIRD, "Third".into()).unwrap();
        s.start(HOST, &mut rng()).unwrap();
        s.call(HOST, 5, NOW).unwrap();

        let departure = s.remove_participant(HOST).unwrap();
        assert!(!departure.call_completed);
        assert_eq!(s.host(), GUEST);

        s.acknowledge(GUEST);
        s.acknowledge(THIRD);
        assert_eq!(s.turn_holder().unwrap().id, GUEST);
    }

    #[test]
    fn test_remove_player_before_turn_holder_keeps_holder() {
        let mut s = lobby(3);
        s.add_participant(THIRD, "Third".into()).unwrap();
        s.start(HOST, &mut rng()).unwrap();
        play(&mut s, &[1, 2]);
        assert_eq!(s.turn_holder().unwrap().id, THIRD);

        s.remove_participant(HOST).unwrap();

        assert_eq!(s.turn_holder().unwrap().id, THIRD);
    }

    #[test]
    fn test_remove_last_seat_turn_holder_wraps_to_first() {
        let mut s = started();
        play(&mut s, &[1]);
        assert_eq!(s.turn_holder().unwrap().id, GUEST);

        s.remove_participant(GUEST).unwrap();

        assert_eq!(s.turn_index(), 0);
        assert_eq!(s.turn_holder().unwrap().id, HOST);
    }

    #[test]
    fn test_remove_everyone_leaves_empty_room() {
        let mut s = started();
        s.remove_participant(HOST).unwrap();
        let departure = s.remove_participant(GUEST).unwrap();
        assert_eq!(departure.remaining, 0);
        assert!(s.remove_participant(GUEST).is_none());
    }

    // =====================================================================
    // views
    // =====================================================================

    #[test]
    fn test_views_report_outstanding_acknowledgments() {
        let mut s = started();
        s.call(HOST, 7, NOW).unwrap();

        let turn = s.turn_view();
        assert!(turn.turn_locked);
        assert_eq!(turn.remaining, 1);
        assert_eq!(turn.pending_names, vec!["Guest".to_string()]);
        assert_eq!(turn.players.len(), 2);

        let calls = s.called_numbers_view();
        assert_eq!(calls.called_numbers, vec![7]);
        assert_eq!(calls.current_call.unwrap().number, 7);
        assert_eq!(calls.remaining, 1);

        let room = s.room_view();
        assert!(room.game_started);
        assert_eq!(room.host_id, HOST);
        assert!(room.winner.is_none());
    }
}
