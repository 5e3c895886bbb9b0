//! Encrypted Value Adapter
//!
//! Validates inbound (ciphertext, proof) pairs against their match and
//! participant context, and compares two validated commitments without
//! ever handing a plaintext move to the caller. The only cleartext that
//! crosses this boundary is the three-way outcome.

use thiserror::Error;

use crate::core::id::{Addr, MatchId};
use crate::crypto::seal::{self, EvaluationKey, InputProof, SealedMove, SEALED_LEN};

/// Number of legal move values ({0, 1, 2}).
const MOVE_DOMAIN: u8 = 3;

/// Binding context for a commitment: which match, which participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitContext {
    /// The match the move is committed to.
    pub match_id: MatchId,
    /// The committing participant.
    pub player: Addr,
}

/// Outcome of comparing two commitments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOutcome {
    /// First operand wins.
    AWins,
    /// Second operand wins.
    BWins,
    /// Equal moves.
    Tie,
}

/// An opaque, validated move commitment.
///
/// A capability: holders can store it and feed it back to [`CipherSuite`]
/// for comparison, nothing else. The underlying value is private to this
/// module, carries no accessor, and is absent from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct MoveHandle {
    match_id: MatchId,
    player: Addr,
    value: u8,
}

impl std::fmt::Debug for MoveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveHandle")
            .field("match_id", &self.match_id)
            .field("player", &self.player.short())
            .field("value", &"<sealed>")
            .finish()
    }
}

impl MoveHandle {
    /// The participant this commitment is bound to.
    pub fn player(&self) -> &Addr {
        &self.player
    }
}

/// Adapter errors. The engine folds all of these into its `InvalidProof`
/// taxonomy member.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Ciphertext has the wrong shape.
    #[error("malformed ciphertext: expected {SEALED_LEN} bytes, got {0}")]
    MalformedCiphertext(usize),

    /// Proof does not bind this ciphertext to this match and participant.
    #[error("input proof does not verify for this match and participant")]
    ProofMismatch,

    /// Ciphertext verifies but encodes a value outside {0, 1, 2}.
    #[error("committed value is outside the legal move domain")]
    ValueOutOfDomain,
}

/// The evaluation backend stand-in: validation and encrypted comparison
/// under one secret key, set once at initialization.
pub struct CipherSuite {
    key: EvaluationKey,
}

impl CipherSuite {
    /// Create a suite over the given evaluation key.
    pub fn new(key: EvaluationKey) -> Self {
        Self { key }
    }

    /// Validate a (ciphertext, proof) pair against its context.
    ///
    /// Checks, in order: ciphertext shape, proof binding (covers key,
    /// match id, participant, and ciphertext bytes), and that the sealed
    /// value lies in the legal domain. Returns an opaque handle on success.
    pub fn validate_commitment(
        &self,
        ctx: CommitContext,
        sealed: &SealedMove,
        proof: &InputProof,
    ) -> Result<MoveHandle, CryptoError> {
        if sealed.as_bytes().len() != SEALED_LEN {
            return Err(CryptoError::MalformedCiphertext(sealed.as_bytes().len()));
        }

        let expected = seal::compute_proof(&self.key, ctx.match_id, &ctx.player, sealed.as_bytes());
        if &expected != proof {
            return Err(CryptoError::ProofMismatch);
        }

        let value = seal::unseal(&self.key, ctx.match_id, &ctx.player, sealed)
            .ok_or(CryptoError::MalformedCiphertext(sealed.as_bytes().len()))?;
        if value >= MOVE_DOMAIN {
            return Err(CryptoError::ValueOutOfDomain);
        }

        Ok(MoveHandle {
            match_id: ctx.match_id,
            player: ctx.player,
            value,
        })
    }

    /// Compare two validated commitments.
    ///
    /// Winner rule: `a` beats `b` iff `(a - b) mod 3 == 1`; equal values
    /// tie. Evaluated entirely on this side of the boundary - callers see
    /// only the outcome.
    pub fn compare(&self, a: &MoveHandle, b: &MoveHandle) -> CompareOutcome {
        debug_assert_eq!(a.match_id, b.match_id, "commitments from different matches");

        match (a.value + MOVE_DOMAIN - b.value) % MOVE_DOMAIN {
            0 => CompareOutcome::Tie,
            1 => CompareOutcome::AWins,
            _ => CompareOutcome::BWins,
        }
    }
}
