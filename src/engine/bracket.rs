//! Bracket Pairing
//!
//! Sequential pairing by roster order: the player at index 2k meets the
//! player at index 2k+1. An odd field gives the last player a bye; they
//! advance without a match. This exact policy makes brackets reproducible
//! from the join order alone, so it must not change.

use crate::core::id::Addr;

/// The pairing plan for one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundPlan {
    /// Pairings in bracket order.
    pub pairs: Vec<(Addr, Addr)>,
    /// Unpaired last player, advancing automatically.
    pub bye: Option<Addr>,
}

/// Pair a field of players for one round.
pub fn pair_players(players: &[Addr]) -> RoundPlan {
    let mut pairs = Vec::with_capacity(players.len() / 2);
    let mut chunks = players.chunks_exact(2);
    for pair in &mut chunks {
        pairs.push((pair[0], pair[1]));
    }
    let bye = chunks.remainder().first().copied();
    RoundPlan { pairs, bye }
}
