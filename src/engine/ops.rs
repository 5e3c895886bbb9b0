//! Engine Facade
//!
//! Owns every tournament and match, the id counters, the escrow ledger,
//! and the cipher suite, and applies each externally triggered operation
//! atomically: all preconditions are checked before the first mutation,
//! so an operation either fully applies or leaves every entity untouched.
//!
//! The engine is a sequential state machine. There is no blocking inside
//! it - "waiting for the opponent" is the PENDING/PLAYER*_COMMITTED state,
//! not a suspended call. Callers racing on the same entity must serialize
//! outside (the network layer holds the engine behind a write lock); the
//! race loser observes the post-state and gets the matching taxonomy
//! error instead of corrupting anything.

use std::collections::BTreeMap;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::amount::Amount;
use crate::core::id::{Addr, IdAllocator, MatchId, TournamentId};
use crate::crypto::adapter::{CipherSuite, CommitContext, CompareOutcome};
use crate::crypto::seal::{EvaluationKey, InputProof, SealedMove};
use crate::engine::bracket::{pair_players, RoundPlan};
use crate::engine::error::EngineError;
use crate::engine::events::EngineEvent;
use crate::engine::guard::OperatorGuard;
use crate::engine::matches::{Match, MatchState};
use crate::engine::tournament::{Tournament, TournamentState};
use crate::escrow::EscrowLedger;

/// Static engine configuration, fixed at initialization.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// The privileged operator identity.
    pub operator: Addr,
}

/// Result of resolving a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A decisive result; the winner is recorded.
    Decisive(Addr),
    /// Equal moves; both slots were cleared for re-commitment.
    Tie,
}

/// Result of advancing a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The next round's matches were created.
    NextRound {
        /// New 1-based round number.
        round: u32,
        /// The round's matches in bracket order.
        matches: Vec<MatchId>,
        /// Bye survivor, if the field was odd.
        bye: Option<Addr>,
    },
    /// Exactly one winner remained; the tournament is complete.
    Completed(Addr),
}

/// The tournament and match lifecycle engine.
pub struct Engine {
    guard: OperatorGuard,
    cipher: CipherSuite,
    escrow: EscrowLedger,
    tournaments: BTreeMap<TournamentId, Tournament>,
    matches: BTreeMap<MatchId, Match>,
    tournament_ids: IdAllocator,
    match_ids: IdAllocator,
    pending_events: Vec<EngineEvent>,
}

impl Engine {
    /// Create an engine with the given configuration and evaluation key.
    pub fn new(config: EngineConfig, key: EvaluationKey) -> Self {
        Self {
            guard: OperatorGuard::new(config.operator),
            cipher: CipherSuite::new(key),
            escrow: EscrowLedger::new(),
            tournaments: BTreeMap::new(),
            matches: BTreeMap::new(),
            tournament_ids: IdAllocator::new(),
            match_ids: IdAllocator::new(),
            pending_events: Vec::new(),
        }
    }

    /// The configured operator identity.
    pub fn operator(&self) -> &Addr {
        self.guard.operator()
    }

    /// Credit tokens to an address (inbound transfer stand-in).
    pub fn credit(&mut self, addr: Addr, amount: Amount) -> Result<(), EngineError> {
        self.escrow.credit(addr, amount)?;
        Ok(())
    }

    /// Record an approval toward the engine (approval stand-in).
    pub fn approve(&mut self, addr: Addr, amount: Amount) {
        self.escrow.approve(addr, amount);
    }

    /// Spendable balance of an address.
    pub fn balance_of(&self, addr: &Addr) -> Amount {
        self.escrow.balance_of(addr)
    }

    /// Escrowed pool of a tournament.
    pub fn pool_of(&self, tournament_id: TournamentId) -> Amount {
        self.escrow.pool_of(tournament_id)
    }

    /// Take the events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // =========================================================================
    // Tournament operations
    // =========================================================================

    /// Open a new tournament for registration. Operator only.
    pub fn create_tournament(
        &mut self,
        caller: Addr,
        entry_fee: Amount,
    ) -> Result<TournamentId, EngineError> {
        self.guard.require_operator(&caller)?;
        if entry_fee.is_zero() {
            return Err(EngineError::InvalidFee);
        }

        let id = TournamentId(self.tournament_ids.allocate());
        self.tournaments.insert(id, Tournament::new(id, entry_fee, Utc::now()));
        self.pending_events.push(EngineEvent::TournamentCreated {
            tournament_id: id,
            entry_fee,
        });

        info!("{} created, entry fee {}", id, entry_fee);
        Ok(id)
    }

    /// Register `caller` in a tournament, escrowing the entry fee.
    pub fn join_tournament(
        &mut self,
        caller: Addr,
        tournament_id: TournamentId,
    ) -> Result<(), EngineError> {
        let tournament = self
            .tournaments
            .get(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        if tournament.state != TournamentState::Registration {
            return Err(EngineError::WrongState(tournament.state.as_str()));
        }
        if tournament.has_player(&caller) {
            return Err(EngineError::AlreadyJoined);
        }
        let fee = tournament.entry_fee;

        // Funding-layer debit; the first (and only fallible) mutation.
        self.escrow.collect_entry_fee(caller, tournament_id, fee)?;

        let pool = self.escrow.pool_of(tournament_id);
        let tournament = self
            .tournaments
            .get_mut(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        tournament.players.push(caller);
        tournament.prize_pool = pool;
        let player_count = tournament.players.len();

        self.pending_events.push(EngineEvent::PlayerJoined {
            tournament_id,
            player: caller,
            player_count,
            prize_pool: pool,
        });

        debug!("{} joined {}, pool {}", caller.short(), tournament_id, pool);
        Ok(())
    }

    /// Close registration and create the first round. Operator only.
    pub fn start_tournament(
        &mut self,
        caller: Addr,
        tournament_id: TournamentId,
    ) -> Result<Vec<MatchId>, EngineError> {
        self.guard.require_operator(&caller)?;

        let tournament = self
            .tournaments
            .get(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        if tournament.state != TournamentState::Registration {
            return Err(EngineError::WrongState(tournament.state.as_str()));
        }
        if tournament.players.len() < 2 {
            return Err(EngineError::NotEnoughPlayers(tournament.players.len()));
        }

        let plan = pair_players(&tournament.players);
        let match_ids = self.create_round_matches(tournament_id, 1, &plan);

        let tournament = self
            .tournaments
            .get_mut(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        tournament.activate(match_ids.clone(), plan.bye);

        self.pending_events.push(EngineEvent::TournamentStarted {
            tournament_id,
            round: 1,
            matches: match_ids.clone(),
            bye: plan.bye,
        });

        info!(
            "{} started: round 1, {} matches, bye: {}",
            tournament_id,
            match_ids.len(),
            plan.bye.map(|b| b.short()).unwrap_or_else(|| "none".into()),
        );
        Ok(match_ids)
    }

    /// Advance a tournament whose current round is fully resolved.
    ///
    /// Permissionless: anyone may crank advancement once every match of
    /// the round is RESOLVED or PAID_OUT.
    pub fn advance_round(
        &mut self,
        tournament_id: TournamentId,
    ) -> Result<RoundOutcome, EngineError> {
        let tournament = self
            .tournaments
            .get(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        if tournament.state != TournamentState::Active {
            return Err(EngineError::WrongState(tournament.state.as_str()));
        }

        // Collect winners in bracket order; bye survivor last.
        let mut survivors = Vec::with_capacity(tournament.round_matches.len() + 1);
        for match_id in &tournament.round_matches {
            let m = self
                .matches
                .get(match_id)
                .ok_or(EngineError::MatchNotFound(*match_id))?;
            let winner = match (m.state, m.winner) {
                (MatchState::Resolved | MatchState::PaidOut, Some(winner)) => winner,
                _ => return Err(EngineError::RoundIncomplete),
            };
            survivors.push(winner);
        }
        if let Some(bye) = tournament.bye {
            survivors.push(bye);
        }

        if survivors.len() == 1 {
            let champion = survivors[0];
            let tournament = self
                .tournaments
                .get_mut(&tournament_id)
                .ok_or(EngineError::TournamentNotFound(tournament_id))?;
            tournament.complete(champion);

            self.pending_events.push(EngineEvent::TournamentCompleted {
                tournament_id,
                champion,
            });
            info!("{} completed, champion {}", tournament_id, champion.short());
            return Ok(RoundOutcome::Completed(champion));
        }

        let next_round = tournament.round_number + 1;
        let plan = pair_players(&survivors);
        let match_ids = self.create_round_matches(tournament_id, next_round, &plan);

        let tournament = self
            .tournaments
            .get_mut(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        tournament.begin_round(match_ids.clone(), plan.bye);

        self.pending_events.push(EngineEvent::RoundAdvanced {
            tournament_id,
            round: next_round,
            matches: match_ids.clone(),
            bye: plan.bye,
        });

        info!("{} advanced to round {}, {} matches", tournament_id, next_round, match_ids.len());
        Ok(RoundOutcome::NextRound {
            round: next_round,
            matches: match_ids,
            bye: plan.bye,
        })
    }

    // =========================================================================
    // Match operations
    // =========================================================================

    /// Accept an encrypted move commitment from `caller`.
    pub fn commit_move(
        &mut self,
        caller: Addr,
        match_id: MatchId,
        sealed: SealedMove,
        proof: InputProof,
    ) -> Result<MatchState, EngineError> {
        let m = self
            .matches
            .get(&match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        let slot = m.slot_of(&caller).ok_or(EngineError::NotAParticipant)?;
        match m.state {
            MatchState::Pending
            | MatchState::Player1Committed
            | MatchState::Player2Committed => {}
            other => return Err(EngineError::WrongState(other.as_str())),
        }
        if m.slot_filled(slot) {
            return Err(EngineError::WrongState(m.state.as_str()));
        }

        // Proof must bind the ciphertext to exactly this match and caller.
        let handle = self.cipher.validate_commitment(
            CommitContext {
                match_id,
                player: caller,
            },
            &sealed,
            &proof,
        )?;

        let m = self
            .matches
            .get_mut(&match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        let state = m.record_commitment(slot, handle)?;

        self.pending_events.push(EngineEvent::MoveCommitted {
            match_id,
            player: caller,
            state,
        });

        debug!("{} commitment by {}, now {}", match_id, caller.short(), state.as_str());
        Ok(state)
    }

    /// Resolve a fully committed match via encrypted comparison.
    ///
    /// On a tie both slots are cleared and the match returns to PENDING;
    /// on a decisive outcome the winner is recorded. Plaintext moves are
    /// never visible here - only the three-way outcome is.
    pub fn resolve_match(&mut self, match_id: MatchId) -> Result<MatchOutcome, EngineError> {
        let m = self
            .matches
            .get(&match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        if m.state != MatchState::BothCommitted {
            return Err(EngineError::WrongState(m.state.as_str()));
        }
        let (move1, move2) = m
            .commitments()
            .ok_or(EngineError::WrongState(m.state.as_str()))?;

        let outcome = self.cipher.compare(move1, move2);
        let (player1, player2) = (m.player1, m.player2);

        let m = self
            .matches
            .get_mut(&match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        match outcome {
            CompareOutcome::Tie => {
                m.reset_for_tie();
                self.pending_events.push(EngineEvent::MatchTied { match_id });
                info!("{} tied, both players must re-commit", match_id);
                Ok(MatchOutcome::Tie)
            }
            CompareOutcome::AWins | CompareOutcome::BWins => {
                let winner = if outcome == CompareOutcome::AWins {
                    player1
                } else {
                    player2
                };
                m.resolve_with(winner);
                self.pending_events.push(EngineEvent::MatchResolved { match_id, winner });
                info!("{} resolved, winner {}", match_id, winner.short());
                Ok(MatchOutcome::Decisive(winner))
            }
        }
    }

    /// Pay out a resolved match's share of the tournament pool.
    ///
    /// Winner-take-all policy: only the terminal match carries a share -
    /// the entire remaining pool. Paying out a non-terminal match moves no
    /// funds and only advances the match to PAID_OUT. Calling twice never
    /// double-spends: the second call fails `AlreadyPaid`.
    pub fn payout_match(&mut self, match_id: MatchId) -> Result<Amount, EngineError> {
        let m = self
            .matches
            .get(&match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        match m.state {
            MatchState::PaidOut => return Err(EngineError::AlreadyPaid),
            MatchState::Resolved => {}
            other => return Err(EngineError::WrongState(other.as_str())),
        }
        let winner = m.winner.ok_or(EngineError::WrongState(m.state.as_str()))?;
        let tournament_id = m.tournament_id;

        let tournament = self
            .tournaments
            .get(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        let is_terminal =
            tournament.is_terminal_round() && tournament.round_matches.contains(&match_id);
        let share = if is_terminal {
            self.escrow.pool_of(tournament_id)
        } else {
            Amount::ZERO
        };

        if !share.is_zero() {
            if let Err(err) = self.escrow.pay_out(tournament_id, winner, share) {
                warn!("{} payout hit escrow invariant: {}", match_id, err);
                return Err(err.into());
            }
        }

        let m = self
            .matches
            .get_mut(&match_id)
            .ok_or(EngineError::MatchNotFound(match_id))?;
        m.mark_paid();

        let pool = self.escrow.pool_of(tournament_id);
        let tournament = self
            .tournaments
            .get_mut(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        tournament.prize_pool = pool;

        self.pending_events.push(EngineEvent::MatchPaidOut {
            match_id,
            winner,
            amount: share,
        });

        info!("{} paid out {} to {}", match_id, share, winner.short());
        Ok(share)
    }

    // =========================================================================
    // Read-only queries (side-effect free)
    // =========================================================================

    /// Look up a tournament.
    pub fn get_tournament(&self, tournament_id: TournamentId) -> Result<&Tournament, EngineError> {
        self.tournaments
            .get(&tournament_id)
            .ok_or(EngineError::TournamentNotFound(tournament_id))
    }

    /// Look up a match.
    pub fn get_match(&self, match_id: MatchId) -> Result<&Match, EngineError> {
        self.matches
            .get(&match_id)
            .ok_or(EngineError::MatchNotFound(match_id))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Materialize one round's matches from a pairing plan.
    fn create_round_matches(
        &mut self,
        tournament_id: TournamentId,
        round: u32,
        plan: &RoundPlan,
    ) -> Vec<MatchId> {
        let now = Utc::now();
        plan.pairs
            .iter()
            .map(|&(player1, player2)| {
                let id = MatchId(self.match_ids.allocate());
                self.matches
                    .insert(id, Match::new(id, tournament_id, round, player1, player2, now));
                id
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::seal::{seal_move, Move, NONCE_LEN};

    fn addr(b: u8) -> Addr {
        Addr::new([b; 20])
    }

    fn operator() -> Addr {
        addr(0xee)
    }

    fn test_key() -> EvaluationKey {
        EvaluationKey::derive("test-backend")
    }

    fn engine() -> Engine {
        Engine::new(EngineConfig { operator: operator() }, test_key())
    }

    fn fund(e: &mut Engine, player: Addr) {
        e.credit(player, Amount::from_tokens(100)).unwrap();
        e.approve(player, Amount::from_tokens(100));
    }

    /// Create a tournament with `n` funded players and start it.
    fn started_tournament(e: &mut Engine, n: u8) -> (TournamentId, Vec<MatchId>, Vec<Addr>) {
        let id = e.create_tournament(operator(), Amount::from_tokens(10)).unwrap();
        let players: Vec<Addr> = (1..=n).map(addr).collect();
        for p in &players {
            fund(e, *p);
            e.join_tournament(*p, id).unwrap();
        }
        let matches = e.start_tournament(operator(), id).unwrap();
        (id, matches, players)
    }

    fn commit(e: &mut Engine, match_id: MatchId, player: Addr, mv: Move, nonce: u8) {
        let (sealed, proof) = seal_move(&test_key(), match_id, &player, mv, [nonce; NONCE_LEN]);
        e.commit_move(player, match_id, sealed, proof).unwrap();
    }

    /// Play out one match decisively: player1 throws paper, player2 rock.
    fn win_as_player1(e: &mut Engine, match_id: MatchId, nonce: u8) -> Addr {
        let m = e.get_match(match_id).unwrap();
        let (p1, p2) = (m.player1, m.player2);
        commit(e, match_id, p1, Move::Paper, nonce);
        commit(e, match_id, p2, Move::Rock, nonce.wrapping_add(1));
        match e.resolve_match(match_id).unwrap() {
            MatchOutcome::Decisive(w) => {
                assert_eq!(w, p1);
                w
            }
            MatchOutcome::Tie => panic!("expected decisive result"),
        }
    }

    // =========================================================================
    // Creation & registration
    // =========================================================================

    #[test]
    fn test_create_requires_operator() {
        let mut e = engine();
        assert_eq!(
            e.create_tournament(addr(1), Amount::from_tokens(10)),
            Err(EngineError::Unauthorized)
        );
    }

    #[test]
    fn test_create_rejects_zero_fee() {
        let mut e = engine();
        assert_eq!(
            e.create_tournament(operator(), Amount::ZERO),
            Err(EngineError::InvalidFee)
        );
    }

    #[test]
    fn test_tournament_ids_are_monotonic() {
        let mut e = engine();
        let a = e.create_tournament(operator(), Amount::from_tokens(1)).unwrap();
        let b = e.create_tournament(operator(), Amount::from_tokens(1)).unwrap();
        assert_eq!(a, TournamentId(0));
        assert_eq!(b, TournamentId(1));
    }

    #[test]
    fn test_join_unknown_tournament() {
        let mut e = engine();
        assert_eq!(
            e.join_tournament(addr(1), TournamentId(42)),
            Err(EngineError::TournamentNotFound(TournamentId(42)))
        );
    }

    #[test]
    fn test_prize_pool_tracks_joins_exactly() {
        let mut e = engine();
        let fee = Amount::from_tokens(10);
        let id = e.create_tournament(operator(), fee).unwrap();

        for i in 1..=4u8 {
            fund(&mut e, addr(i));
            e.join_tournament(addr(i), id).unwrap();

            let t = e.get_tournament(id).unwrap();
            let expected = fee.checked_mul(i as u64).unwrap();
            assert_eq!(t.prize_pool, expected);
            assert_eq!(e.pool_of(id), expected);
            assert_eq!(t.players.len(), i as usize);
        }
    }

    #[test]
    fn test_duplicate_join_rejected_without_double_charge() {
        let mut e = engine();
        let id = e.create_tournament(operator(), Amount::from_tokens(10)).unwrap();
        fund(&mut e, addr(1));
        e.join_tournament(addr(1), id).unwrap();

        assert_eq!(e.join_tournament(addr(1), id), Err(EngineError::AlreadyJoined));

        let t = e.get_tournament(id).unwrap();
        assert_eq!(t.players.len(), 1);
        assert_eq!(e.balance_of(&addr(1)), Amount::from_tokens(90));
    }

    #[test]
    fn test_join_without_funds_or_approval() {
        let mut e = engine();
        let id = e.create_tournament(operator(), Amount::from_tokens(10)).unwrap();

        // No balance, no approval.
        assert_eq!(
            e.join_tournament(addr(1), id),
            Err(EngineError::InsufficientFundsOrApproval)
        );

        // Balance but no approval.
        e.credit(addr(2), Amount::from_tokens(100)).unwrap();
        assert_eq!(
            e.join_tournament(addr(2), id),
            Err(EngineError::InsufficientFundsOrApproval)
        );

        // Nothing was recorded.
        assert!(e.get_tournament(id).unwrap().players.is_empty());
    }

    #[test]
    fn test_join_after_start_rejected() {
        let mut e = engine();
        let (id, _, _) = started_tournament(&mut e, 2);
        fund(&mut e, addr(9));
        assert_eq!(e.join_tournament(addr(9), id), Err(EngineError::WrongState("active")));
    }

    // =========================================================================
    // Start & pairing
    // =========================================================================

    #[test]
    fn test_start_requires_operator() {
        let mut e = engine();
        let id = e.create_tournament(operator(), Amount::from_tokens(10)).unwrap();
        assert_eq!(e.start_tournament(addr(1), id), Err(EngineError::Unauthorized));
    }

    #[test]
    fn test_start_requires_two_players() {
        let mut e = engine();
        let id = e.create_tournament(operator(), Amount::from_tokens(10)).unwrap();
        assert_eq!(e.start_tournament(operator(), id), Err(EngineError::NotEnoughPlayers(0)));

        fund(&mut e, addr(1));
        e.join_tournament(addr(1), id).unwrap();
        assert_eq!(e.start_tournament(operator(), id), Err(EngineError::NotEnoughPlayers(1)));
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut e = engine();
        let (id, _, _) = started_tournament(&mut e, 2);
        assert_eq!(
            e.start_tournament(operator(), id),
            Err(EngineError::WrongState("active"))
        );
    }

    #[test]
    fn test_five_players_pair_into_two_matches_and_a_bye() {
        let mut e = engine();
        let (id, matches, players) = started_tournament(&mut e, 5);

        assert_eq!(matches.len(), 2);
        let t = e.get_tournament(id).unwrap();
        assert_eq!(t.round_number, 1);
        assert_eq!(t.bye, Some(players[4]));

        // Sequential pairing by join order.
        let m0 = e.get_match(matches[0]).unwrap();
        assert_eq!((m0.player1, m0.player2), (players[0], players[1]));
        let m1 = e.get_match(matches[1]).unwrap();
        assert_eq!((m1.player1, m1.player2), (players[2], players[3]));
    }

    // =========================================================================
    // Commit
    // =========================================================================

    #[test]
    fn test_commit_by_non_participant() {
        let mut e = engine();
        let (_, matches, _) = started_tournament(&mut e, 2);
        let outsider = addr(9);

        let (sealed, proof) =
            seal_move(&test_key(), matches[0], &outsider, Move::Rock, [1; NONCE_LEN]);
        assert_eq!(
            e.commit_move(outsider, matches[0], sealed, proof),
            Err(EngineError::NotAParticipant)
        );
    }

    #[test]
    fn test_commit_to_unknown_match() {
        let mut e = engine();
        let (sealed, proof) =
            seal_move(&test_key(), MatchId(5), &addr(1), Move::Rock, [1; NONCE_LEN]);
        assert_eq!(
            e.commit_move(addr(1), MatchId(5), sealed, proof),
            Err(EngineError::MatchNotFound(MatchId(5)))
        );
    }

    #[test]
    fn test_double_commit_never_overwrites() {
        let mut e = engine();
        let (_, matches, players) = started_tournament(&mut e, 2);
        let mid = matches[0];

        commit(&mut e, mid, players[0], Move::Rock, 1);

        // Second attempt by the same player, different move.
        let (sealed, proof) = seal_move(&test_key(), mid, &players[0], Move::Paper, [2; NONCE_LEN]);
        let err = e.commit_move(players[0], mid, sealed, proof).unwrap_err();
        assert!(matches!(err, EngineError::WrongState(_)));

        // Opponent's scissors still loses to the original rock.
        commit(&mut e, mid, players[1], Move::Scissors, 3);
        assert_eq!(
            e.resolve_match(mid).unwrap(),
            MatchOutcome::Decisive(players[0])
        );
    }

    #[test]
    fn test_commitment_replayed_into_other_match_rejected() {
        let mut e = engine();
        let (_, matches, players) = started_tournament(&mut e, 5);

        // Seal for match 0, present to match 1 (player 1 is in match 0 only,
        // so use the proof binding directly: player 3 steals the bytes).
        let (sealed, proof) =
            seal_move(&test_key(), matches[0], &players[0], Move::Rock, [1; NONCE_LEN]);
        let err = e
            .commit_move(players[2], matches[1], sealed, proof)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidProof(_)));
    }

    #[test]
    fn test_commit_after_resolution_rejected() {
        let mut e = engine();
        let (_, matches, players) = started_tournament(&mut e, 2);
        let mid = matches[0];
        win_as_player1(&mut e, mid, 1);

        let (sealed, proof) = seal_move(&test_key(), mid, &players[1], Move::Rock, [7; NONCE_LEN]);
        assert_eq!(
            e.commit_move(players[1], mid, sealed, proof),
            Err(EngineError::WrongState("resolved"))
        );
    }

    // =========================================================================
    // Resolve
    // =========================================================================

    #[test]
    fn test_resolve_requires_both_commitments() {
        let mut e = engine();
        let (_, matches, players) = started_tournament(&mut e, 2);
        let mid = matches[0];

        assert_eq!(e.resolve_match(mid), Err(EngineError::WrongState("pending")));

        commit(&mut e, mid, players[0], Move::Rock, 1);
        assert_eq!(
            e.resolve_match(mid),
            Err(EngineError::WrongState("player1_committed"))
        );
    }

    #[test]
    fn test_double_resolve_rejected() {
        let mut e = engine();
        let (_, matches, _) = started_tournament(&mut e, 2);
        win_as_player1(&mut e, matches[0], 1);

        // The race loser observes the post-state.
        assert_eq!(
            e.resolve_match(matches[0]),
            Err(EngineError::WrongState("resolved"))
        );
    }

    #[test]
    fn test_tie_resets_match_for_recommit() {
        let mut e = engine();
        let (_, matches, players) = started_tournament(&mut e, 2);
        let mid = matches[0];

        commit(&mut e, mid, players[0], Move::Rock, 1);
        commit(&mut e, mid, players[1], Move::Rock, 2);
        assert_eq!(e.resolve_match(mid).unwrap(), MatchOutcome::Tie);

        let m = e.get_match(mid).unwrap();
        assert_eq!(m.state, MatchState::Pending);
        assert_eq!(m.committed_flags(), (false, false));
        assert!(m.winner.is_none());

        // Both players re-commit; this time decisively.
        commit(&mut e, mid, players[0], Move::Paper, 3);
        commit(&mut e, mid, players[1], Move::Scissors, 4);
        assert_eq!(
            e.resolve_match(mid).unwrap(),
            MatchOutcome::Decisive(players[1])
        );
    }

    #[test]
    fn test_winner_never_changes_once_set() {
        let mut e = engine();
        let (_, matches, players) = started_tournament(&mut e, 2);
        let winner = win_as_player1(&mut e, matches[0], 1);

        assert_eq!(e.get_match(matches[0]).unwrap().winner, Some(winner));
        let _ = e.payout_match(matches[0]).unwrap();
        assert_eq!(e.get_match(matches[0]).unwrap().winner, Some(winner));
        assert_eq!(winner, players[0]);
    }

    // =========================================================================
    // Payout
    // =========================================================================

    #[test]
    fn test_full_two_player_scenario() {
        // create(fee=10) -> join(A) -> join(B) -> start -> commit(A, ROCK)
        // -> commit(B, SCISSORS) -> resolve => A wins -> payout => +20.
        let mut e = engine();
        let fee = Amount::from_tokens(10);
        let id = e.create_tournament(operator(), fee).unwrap();
        let (a, b) = (addr(1), addr(2));
        fund(&mut e, a);
        fund(&mut e, b);
        e.join_tournament(a, id).unwrap();
        e.join_tournament(b, id).unwrap();
        let matches = e.start_tournament(operator(), id).unwrap();
        let mid = matches[0];

        commit(&mut e, mid, a, Move::Rock, 1);
        commit(&mut e, mid, b, Move::Scissors, 2);
        assert_eq!(e.resolve_match(mid).unwrap(), MatchOutcome::Decisive(a));
        assert_eq!(e.get_match(mid).unwrap().state, MatchState::Resolved);

        let paid = e.payout_match(mid).unwrap();
        assert_eq!(paid, Amount::from_tokens(20));
        assert_eq!(e.balance_of(&a), Amount::from_tokens(110));
        assert_eq!(e.pool_of(id), Amount::ZERO);
        assert_eq!(e.get_tournament(id).unwrap().prize_pool, Amount::ZERO);
        assert_eq!(e.get_match(mid).unwrap().state, MatchState::PaidOut);

        // Idempotence: a second payout never double-spends.
        assert_eq!(e.payout_match(mid), Err(EngineError::AlreadyPaid));
        assert_eq!(e.balance_of(&a), Amount::from_tokens(110));
    }

    #[test]
    fn test_payout_requires_resolution() {
        let mut e = engine();
        let (_, matches, _) = started_tournament(&mut e, 2);
        assert_eq!(e.payout_match(matches[0]), Err(EngineError::WrongState("pending")));
    }

    #[test]
    fn test_non_terminal_payout_moves_no_funds() {
        let mut e = engine();
        let (id, matches, _) = started_tournament(&mut e, 4);
        let winner = win_as_player1(&mut e, matches[0], 1);
        let before = e.balance_of(&winner);

        let paid = e.payout_match(matches[0]).unwrap();
        assert_eq!(paid, Amount::ZERO);
        assert_eq!(e.balance_of(&winner), before);
        // Pool stays intact for the final.
        assert_eq!(e.pool_of(id), Amount::from_tokens(40));
    }

    #[test]
    fn test_payout_after_completion_still_drains_pool() {
        let mut e = engine();
        let (id, matches, _) = started_tournament(&mut e, 2);
        let winner = win_as_player1(&mut e, matches[0], 1);

        // Advance first: tournament completes before payout.
        assert_eq!(
            e.advance_round(id).unwrap(),
            RoundOutcome::Completed(winner)
        );

        let paid = e.payout_match(matches[0]).unwrap();
        assert_eq!(paid, Amount::from_tokens(20));
        assert_eq!(e.pool_of(id), Amount::ZERO);
    }

    // =========================================================================
    // Round advancement & full brackets
    // =========================================================================

    #[test]
    fn test_advance_blocks_until_round_resolves() {
        let mut e = engine();
        let (id, matches, _) = started_tournament(&mut e, 4);

        assert_eq!(e.advance_round(id), Err(EngineError::RoundIncomplete));

        win_as_player1(&mut e, matches[0], 1);
        // One of two matches still open.
        assert_eq!(e.advance_round(id), Err(EngineError::RoundIncomplete));
    }

    #[test]
    fn test_advance_before_start_rejected() {
        let mut e = engine();
        let id = e.create_tournament(operator(), Amount::from_tokens(10)).unwrap();
        assert_eq!(e.advance_round(id), Err(EngineError::WrongState("registration")));
    }

    #[test]
    fn test_five_player_bracket_runs_to_completion() {
        let mut e = engine();
        let (id, round1, players) = started_tournament(&mut e, 5);
        assert_eq!(round1.len(), 2);

        // Round 1: winners of both matches; player 5 has the bye.
        let w1 = win_as_player1(&mut e, round1[0], 1);
        let w2 = win_as_player1(&mut e, round1[1], 3);

        // Round 2 pairs (w1, w2) and gives the bye survivor another bye.
        let outcome = e.advance_round(id).unwrap();
        let round2 = match outcome {
            RoundOutcome::NextRound { round, matches, bye } => {
                assert_eq!(round, 2);
                assert_eq!(matches.len(), 1);
                assert_eq!(bye, Some(players[4]));
                matches
            }
            other => panic!("unexpected outcome: {:?}", other),
        };
        let final_two = e.get_match(round2[0]).unwrap();
        assert_eq!((final_two.player1, final_two.player2), (w1, w2));

        // Round 2 resolves; round 3 is the terminal match against the bye.
        let w3 = win_as_player1(&mut e, round2[0], 5);
        let round3 = match e.advance_round(id).unwrap() {
            RoundOutcome::NextRound { round, matches, bye } => {
                assert_eq!(round, 3);
                assert_eq!(bye, None);
                matches
            }
            other => panic!("unexpected outcome: {:?}", other),
        };
        let final_match = e.get_match(round3[0]).unwrap();
        assert_eq!((final_match.player1, final_match.player2), (w3, players[4]));
        assert!(e.get_tournament(id).unwrap().is_terminal_round());

        // The champion takes the whole 50-token pool.
        let champion = win_as_player1(&mut e, round3[0], 7);
        let paid = e.payout_match(round3[0]).unwrap();
        assert_eq!(paid, Amount::from_tokens(50));

        assert_eq!(e.advance_round(id).unwrap(), RoundOutcome::Completed(champion));
        let t = e.get_tournament(id).unwrap();
        assert_eq!(t.state, TournamentState::Completed);
        assert_eq!(t.champion, Some(champion));
        assert_eq!(t.prize_pool, Amount::ZERO);
    }

    #[test]
    fn test_round_two_field_is_winner_plus_bye() {
        // 5 players -> round 1 has 2 matches + 1 bye, and round 2's field
        // is exactly the two match winners plus the bye survivor
        // (3 participants -> 1 match + bye).
        let mut e = engine();
        let (id, round1, players) = started_tournament(&mut e, 5);

        let w1 = win_as_player1(&mut e, round1[0], 1);
        let w2 = win_as_player1(&mut e, round1[1], 3);
        let outcome = e.advance_round(id).unwrap();

        match outcome {
            RoundOutcome::NextRound { matches, bye, .. } => {
                let m = e.get_match(matches[0]).unwrap();
                let mut field = vec![m.player1, m.player2];
                field.extend(bye);
                assert_eq!(field, vec![w1, w2, players[4]]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    // =========================================================================
    // Events & pools
    // =========================================================================

    #[test]
    fn test_lifecycle_emits_events() {
        let mut e = engine();
        let (id, matches, players) = started_tournament(&mut e, 2);
        commit(&mut e, matches[0], players[0], Move::Rock, 1);
        commit(&mut e, matches[0], players[1], Move::Scissors, 2);
        e.resolve_match(matches[0]).unwrap();
        e.payout_match(matches[0]).unwrap();
        e.advance_round(id).unwrap();

        let events = e.take_events();
        assert!(events.iter().any(|ev| matches!(ev, EngineEvent::TournamentCreated { .. })));
        assert!(events.iter().any(|ev| matches!(ev, EngineEvent::TournamentStarted { .. })));
        assert!(events.iter().any(|ev| matches!(ev, EngineEvent::MatchResolved { .. })));
        assert!(events.iter().any(|ev| matches!(ev, EngineEvent::MatchPaidOut { .. })));
        assert!(events.iter().any(|ev| matches!(ev, EngineEvent::TournamentCompleted { .. })));

        // Drained.
        assert!(e.take_events().is_empty());
    }

    #[test]
    fn test_concurrent_tournaments_do_not_interfere() {
        let mut e = engine();
        let (id_a, matches_a, _) = started_tournament(&mut e, 2);
        let fee_b = Amount::from_tokens(10);
        let id_b = e.create_tournament(operator(), fee_b).unwrap();
        for i in 10..12u8 {
            fund(&mut e, addr(i));
            e.join_tournament(addr(i), id_b).unwrap();
        }
        e.start_tournament(operator(), id_b).unwrap();

        // Draining tournament A's pool leaves B's untouched.
        win_as_player1(&mut e, matches_a[0], 1);
        e.payout_match(matches_a[0]).unwrap();

        assert_eq!(e.pool_of(id_a), Amount::ZERO);
        assert_eq!(e.pool_of(id_b), Amount::from_tokens(20));
    }
}
