//! Lifecycle Events
//!
//! Every state transition the engine applies emits one event. The network
//! layer drains them after each operation and broadcasts to subscribers;
//! nothing in here is required for correctness of the state machines
//! themselves.

use serde::{Serialize, Deserialize};

use crate::core::amount::Amount;
use crate::core::id::{Addr, MatchId, TournamentId};
use crate::engine::matches::MatchState;

/// A lifecycle transition that observers may care about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A tournament opened for registration.
    TournamentCreated {
        tournament_id: TournamentId,
        entry_fee: Amount,
    },

    /// A player registered and escrowed the entry fee.
    PlayerJoined {
        tournament_id: TournamentId,
        player: Addr,
        player_count: usize,
        prize_pool: Amount,
    },

    /// Registration closed; first round created.
    TournamentStarted {
        tournament_id: TournamentId,
        round: u32,
        matches: Vec<MatchId>,
        bye: Option<Addr>,
    },

    /// A move commitment was accepted.
    MoveCommitted {
        match_id: MatchId,
        player: Addr,
        state: MatchState,
    },

    /// A match resolved decisively.
    MatchResolved {
        match_id: MatchId,
        winner: Addr,
    },

    /// A match tied; both slots were cleared for re-commitment.
    MatchTied {
        match_id: MatchId,
    },

    /// A match's share was paid out.
    MatchPaidOut {
        match_id: MatchId,
        winner: Addr,
        amount: Amount,
    },

    /// The bracket advanced to the next round.
    RoundAdvanced {
        tournament_id: TournamentId,
        round: u32,
        matches: Vec<MatchId>,
        bye: Option<Addr>,
    },

    /// A champion emerged; the tournament is over.
    TournamentCompleted {
        tournament_id: TournamentId,
        champion: Addr,
    },
}
