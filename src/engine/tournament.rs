//! Tournament State Machine
//!
//! A tournament owns an ordered roster of players and, once started, the
//! current round's matches. State transitions are strictly forward:
//! REGISTRATION -> ACTIVE -> COMPLETED, never back.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::amount::Amount;
use crate::core::id::{Addr, MatchId, TournamentId};

/// Tournament lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    /// Accepting registrations.
    Registration,
    /// Bracket in progress.
    Active,
    /// Champion decided.
    Completed,
}

impl TournamentState {
    /// Lowercase name, used in `WrongState` errors and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentState::Registration => "registration",
            TournamentState::Active => "active",
            TournamentState::Completed => "completed",
        }
    }
}

/// One elimination tournament.
///
/// `players` is append-only during REGISTRATION and frozen afterwards.
/// `prize_pool` mirrors the escrow pool for this tournament and is updated
/// in the same mutation as the transfer that changes it.
#[derive(Clone, Debug)]
pub struct Tournament {
    /// Unique id.
    pub id: TournamentId,
    /// Entry fee, immutable after creation.
    pub entry_fee: Amount,
    /// Registered players, insertion order = join order.
    pub players: Vec<Addr>,
    /// Escrowed funds attributed to this tournament.
    pub prize_pool: Amount,
    /// Lifecycle state.
    pub state: TournamentState,
    /// 0 until started, then the 1-based current round.
    pub round_number: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Current round's matches in bracket order.
    pub round_matches: Vec<MatchId>,
    /// Current round's bye survivor, if the round had an odd field.
    pub bye: Option<Addr>,
    /// Winner of the terminal match, set on completion.
    pub champion: Option<Addr>,
}

impl Tournament {
    /// Create a tournament in REGISTRATION with an empty roster.
    pub fn new(id: TournamentId, entry_fee: Amount, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            entry_fee,
            players: Vec::new(),
            prize_pool: Amount::ZERO,
            state: TournamentState::Registration,
            round_number: 0,
            created_at,
            round_matches: Vec::new(),
            bye: None,
            champion: None,
        }
    }

    /// Is this participant already registered?
    pub fn has_player(&self, player: &Addr) -> bool {
        self.players.contains(player)
    }

    /// Transition REGISTRATION -> ACTIVE with the first round's bracket.
    pub fn activate(&mut self, round_matches: Vec<MatchId>, bye: Option<Addr>) {
        self.state = TournamentState::Active;
        self.round_number = 1;
        self.round_matches = round_matches;
        self.bye = bye;
    }

    /// Install the next round's bracket.
    pub fn begin_round(&mut self, round_matches: Vec<MatchId>, bye: Option<Addr>) {
        self.round_number += 1;
        self.round_matches = round_matches;
        self.bye = bye;
    }

    /// Transition ACTIVE -> COMPLETED with the champion.
    ///
    /// The terminal round's match list is kept: the final stays
    /// recognizable as terminal so its payout can still drain the pool
    /// when advancement happens before payout.
    pub fn complete(&mut self, champion: Addr) {
        self.state = TournamentState::Completed;
        self.champion = Some(champion);
    }

    /// Whether the current round consists of the terminal match: a single
    /// pairing with no bye survivor. Its winner takes the whole pool.
    pub fn is_terminal_round(&self) -> bool {
        self.round_matches.len() == 1 && self.bye.is_none()
    }
}
