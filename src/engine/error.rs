//! Engine Error Taxonomy
//!
//! Every rejected operation reports exactly one member of this taxonomy so
//! callers can tell "retry later" from "do not retry". No error path
//! mutates state: an operation either fully applies or leaves every entity
//! untouched.

use thiserror::Error;

use crate::core::amount::Amount;
use crate::core::id::{MatchId, TournamentId};
use crate::crypto::adapter::CryptoError;
use crate::escrow::EscrowError;

/// Errors surfaced by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Caller lacks the operator role.
    #[error("caller is not the operator")]
    Unauthorized,

    /// Unknown tournament id.
    #[error("unknown {0}")]
    TournamentNotFound(TournamentId),

    /// Unknown match id.
    #[error("unknown {0}")]
    MatchNotFound(MatchId),

    /// Operation is not valid in the entity's current lifecycle state.
    #[error("operation not valid in {0} state")]
    WrongState(&'static str),

    /// Participant is already registered in this tournament.
    #[error("already joined this tournament")]
    AlreadyJoined,

    /// Match funds were already paid out.
    #[error("match already paid out")]
    AlreadyPaid,

    /// Caller plays in neither slot of this match.
    #[error("caller is not a participant of this match")]
    NotAParticipant,

    /// Encrypted commitment failed validation.
    #[error("invalid commitment: {0}")]
    InvalidProof(#[from] CryptoError),

    /// Entry-fee debit failed at the funding layer.
    #[error("insufficient funds or approval")]
    InsufficientFundsOrApproval,

    /// Escrow accounting no longer covers a payout. Internal invariant
    /// violation - correct share accounting makes this unreachable.
    #[error("escrow invariant violated: pool {pool} cannot cover {requested}")]
    InsufficientEscrow {
        /// Pool balance at the time of the attempt.
        pool: Amount,
        /// Requested payout.
        requested: Amount,
    },

    /// Fewer than two registered players at start.
    #[error("not enough players: have {0}, need at least 2")]
    NotEnoughPlayers(usize),

    /// Some match of the current round is still unresolved.
    #[error("current round is not complete")]
    RoundIncomplete,

    /// Entry fee must be positive.
    #[error("entry fee must be positive")]
    InvalidFee,
}

impl From<EscrowError> for EngineError {
    fn from(err: EscrowError) -> Self {
        match err {
            EscrowError::InsufficientFundsOrApproval => EngineError::InsufficientFundsOrApproval,
            EscrowError::InsufficientEscrow { pool, requested } => {
                EngineError::InsufficientEscrow { pool, requested }
            }
            // Amount overflow is the same class of defect as an overdrawn
            // pool: share accounting gone wrong, not caller input.
            EscrowError::AmountOverflow => EngineError::InsufficientEscrow {
                pool: Amount::ZERO,
                requested: Amount::ZERO,
            },
        }
    }
}

impl EngineError {
    /// Whether the caller may retry the identical request once the world
    /// has moved on (a precondition can still become true), as opposed to
    /// rejections that will never succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::WrongState(_)
                | EngineError::RoundIncomplete
                | EngineError::NotEnoughPlayers(_)
                | EngineError::InsufficientFundsOrApproval
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_split() {
        assert!(EngineError::RoundIncomplete.is_retryable());
        assert!(EngineError::WrongState("pending").is_retryable());
        assert!(EngineError::InsufficientFundsOrApproval.is_retryable());

        assert!(!EngineError::AlreadyJoined.is_retryable());
        assert!(!EngineError::AlreadyPaid.is_retryable());
        assert!(!EngineError::Unauthorized.is_retryable());
        assert!(!EngineError::InvalidFee.is_retryable());
    }

    #[test]
    fn test_escrow_error_mapping() {
        assert_eq!(
            EngineError::from(EscrowError::InsufficientFundsOrApproval),
            EngineError::InsufficientFundsOrApproval
        );
        assert!(matches!(
            EngineError::from(EscrowError::InsufficientEscrow {
                pool: Amount::ZERO,
                requested: Amount::from_tokens(1),
            }),
            EngineError::InsufficientEscrow { .. }
        ));
    }
}
