//! Match State Machine
//!
//! One pairwise contest. Commitment slots are write-once; state advances
//! strictly forward through PENDING -> (PLAYER1_COMMITTED |
//! PLAYER2_COMMITTED) -> BOTH_COMMITTED -> RESOLVED -> PAID_OUT. The one
//! sanctioned reversal is a tie, which clears both slots and returns the
//! match to PENDING without ever producing a winner.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::id::{Addr, MatchId, TournamentId};
use crate::crypto::adapter::MoveHandle;
use crate::engine::error::EngineError;

/// Match lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// No commitments yet.
    Pending,
    /// Only player 1 has committed.
    Player1Committed,
    /// Only player 2 has committed.
    Player2Committed,
    /// Both slots filled, ready to resolve.
    BothCommitted,
    /// Winner recorded.
    Resolved,
    /// Winnings transferred.
    PaidOut,
}

impl MatchState {
    /// Lowercase name, used in `WrongState` errors and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchState::Pending => "pending",
            MatchState::Player1Committed => "player1_committed",
            MatchState::Player2Committed => "player2_committed",
            MatchState::BothCommitted => "both_committed",
            MatchState::Resolved => "resolved",
            MatchState::PaidOut => "paid_out",
        }
    }
}

/// Which commitment slot a participant owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerSlot {
    /// `player1`'s slot.
    One,
    /// `player2`'s slot.
    Two,
}

/// One pairwise contest inside a tournament bracket.
///
/// Commitment slots are private: once a validated handle lands in a slot
/// it cannot be read back out, replaced, or observed by snapshots beyond
/// a filled/empty flag.
#[derive(Clone, Debug)]
pub struct Match {
    /// Unique id (own namespace, independent of tournament ids).
    pub id: MatchId,
    /// Owning tournament.
    pub tournament_id: TournamentId,
    /// 1-based round this match belongs to.
    pub round: u32,
    /// First player, assigned at creation.
    pub player1: Addr,
    /// Second player, assigned at creation.
    pub player2: Addr,
    /// Winner, set exactly once by resolution.
    pub winner: Option<Addr>,
    /// Lifecycle state.
    pub state: MatchState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    move1: Option<MoveHandle>,
    move2: Option<MoveHandle>,
}

impl Match {
    /// Create a fresh PENDING match.
    pub fn new(
        id: MatchId,
        tournament_id: TournamentId,
        round: u32,
        player1: Addr,
        player2: Addr,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tournament_id,
            round,
            player1,
            player2,
            winner: None,
            state: MatchState::Pending,
            created_at,
            move1: None,
            move2: None,
        }
    }

    /// Which slot does this participant own, if any?
    pub fn slot_of(&self, player: &Addr) -> Option<PlayerSlot> {
        if player == &self.player1 {
            Some(PlayerSlot::One)
        } else if player == &self.player2 {
            Some(PlayerSlot::Two)
        } else {
            None
        }
    }

    /// Is the given slot already filled?
    pub fn slot_filled(&self, slot: PlayerSlot) -> bool {
        match slot {
            PlayerSlot::One => self.move1.is_some(),
            PlayerSlot::Two => self.move2.is_some(),
        }
    }

    /// Whether each slot holds a commitment (for snapshots - the handles
    /// themselves never leave the match).
    pub fn committed_flags(&self) -> (bool, bool) {
        (self.move1.is_some(), self.move2.is_some())
    }

    /// Store a validated commitment in `slot` and advance the state.
    ///
    /// Fails with `WrongState` outside the committing states or when the
    /// slot is already filled; the stored handle is never overwritten.
    pub fn record_commitment(
        &mut self,
        slot: PlayerSlot,
        handle: MoveHandle,
    ) -> Result<MatchState, EngineError> {
        match self.state {
            MatchState::Pending | MatchState::Player1Committed | MatchState::Player2Committed => {}
            other => return Err(EngineError::WrongState(other.as_str())),
        }
        if self.slot_filled(slot) {
            return Err(EngineError::WrongState(self.state.as_str()));
        }

        match slot {
            PlayerSlot::One => self.move1 = Some(handle),
            PlayerSlot::Two => self.move2 = Some(handle),
        }

        self.state = match (self.move1.is_some(), self.move2.is_some()) {
            (true, true) => MatchState::BothCommitted,
            (true, false) => MatchState::Player1Committed,
            (false, true) => MatchState::Player2Committed,
            (false, false) => MatchState::Pending,
        };
        Ok(self.state)
    }

    /// Both commitments, available only once BOTH_COMMITTED.
    pub fn commitments(&self) -> Option<(&MoveHandle, &MoveHandle)> {
        match (&self.move1, &self.move2) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Record a decisive result: BOTH_COMMITTED -> RESOLVED.
    pub fn resolve_with(&mut self, winner: Addr) {
        self.winner = Some(winner);
        self.state = MatchState::Resolved;
    }

    /// Tie policy: clear both slots and return to PENDING so both players
    /// can commit again. A tie never produces a winner.
    pub fn reset_for_tie(&mut self) {
        self.move1 = None;
        self.move2 = None;
        self.state = MatchState::Pending;
    }

    /// RESOLVED -> PAID_OUT.
    pub fn mark_paid(&mut self) {
        self.state = MatchState::PaidOut;
    }
}
