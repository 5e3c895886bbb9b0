//! Sealed Move Format
//!
//! Client-side sealing of a rock-paper-scissors move into an opaque
//! ciphertext plus an input proof bound to one match and one participant.
//! The engine never produces these - the sealing helper here stands in for
//! the external encryption client at its interface boundary, and is what
//! the binary and the tests use.
//!
//! Wire layout of a sealed move: `nonce[16] || masked_value[1]`.
//! The input proof is a 32-byte binding over (key, match, participant,
//! ciphertext) - a ciphertext cannot be replayed into a different match or
//! under a different participant without failing validation.

use sha2::{Sha256, Digest};
use serde::{Serialize, Deserialize};

use crate::core::id::{Addr, MatchId};

/// Domain separator for the masking keystream.
const SEAL_DOMAIN: &[u8] = b"VEILED_ARENA_SEAL_V1";

/// Domain separator for input proofs.
const PROOF_DOMAIN: &[u8] = b"VEILED_ARENA_PROOF_V1";

/// Nonce length prepended to every sealed move.
pub const NONCE_LEN: usize = 16;

/// Total sealed-move length: nonce plus one masked byte.
pub const SEALED_LEN: usize = NONCE_LEN + 1;

/// A rock-paper-scissors move. Exists in cleartext only on the client side
/// and inside the evaluation backend - never in the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Move {
    /// Rock (0)
    Rock = 0,
    /// Paper (1)
    Paper = 1,
    /// Scissors (2)
    Scissors = 2,
}

impl Move {
    /// Get move from index (0-2).
    pub fn from_index(index: u8) -> Option<Move> {
        match index {
            0 => Some(Move::Rock),
            1 => Some(Move::Paper),
            2 => Some(Move::Scissors),
            _ => None,
        }
    }
}

/// Secret key of the evaluation backend, set once at initialization.
///
/// The stand-in for the external homomorphic key material. Participants
/// seal against it through the client helper; the adapter validates and
/// compares under it. It never crosses the network layer.
#[derive(Clone)]
pub struct EvaluationKey([u8; 32]);

impl EvaluationKey {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Some(Self(arr))
    }

    /// Derive a key from a passphrase. Intended for development setups
    /// where no key is provisioned.
    pub fn derive(passphrase: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"VEILED_ARENA_KEY_V1");
        hasher.update(passphrase.as_bytes());
        Self(hasher.finalize().into())
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for EvaluationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EvaluationKey(<sealed>)")
    }
}

/// An opaque sealed move as it travels over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMove {
    bytes: Vec<u8>,
}

impl SealedMove {
    /// Wrap raw ciphertext bytes received from a client.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Raw ciphertext bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex form for transport.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parse from hex transport form.
    pub fn from_hex(s: &str) -> Option<Self> {
        hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .ok()
            .map(|bytes| Self { bytes })
    }
}

/// The 32-byte input proof accompanying a sealed move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof(pub [u8; 32]);

impl InputProof {
    /// Hex form for transport.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex transport form.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Some(Self(arr))
    }
}

/// Keystream byte masking the move value for one (match, participant, nonce).
fn mask_byte(key: &EvaluationKey, match_id: MatchId, player: &Addr, nonce: &[u8; NONCE_LEN]) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(SEAL_DOMAIN);
    hasher.update(key.as_bytes());
    hasher.update(match_id.0.to_le_bytes());
    hasher.update(player.as_bytes());
    hasher.update(nonce);
    hasher.finalize()[0]
}

/// Compute the input proof binding a ciphertext to its context.
pub(crate) fn compute_proof(
    key: &EvaluationKey,
    match_id: MatchId,
    player: &Addr,
    ciphertext: &[u8],
) -> InputProof {
    let mut hasher = Sha256::new();
    hasher.update(PROOF_DOMAIN);
    hasher.update(key.as_bytes());
    hasher.update(match_id.0.to_le_bytes());
    hasher.update(player.as_bytes());
    hasher.update(ciphertext);
    InputProof(hasher.finalize().into())
}

/// Seal an arbitrary byte. Split out so validation tests can produce
/// ciphertexts whose underlying value is outside the legal domain.
pub(crate) fn seal_raw(
    key: &EvaluationKey,
    match_id: MatchId,
    player: &Addr,
    value: u8,
    nonce: [u8; NONCE_LEN],
) -> (SealedMove, InputProof) {
    let mut bytes = Vec::with_capacity(SEALED_LEN);
    bytes.extend_from_slice(&nonce);
    bytes.push(value ^ mask_byte(key, match_id, player, &nonce));

    let proof = compute_proof(key, match_id, player, &bytes);
    (SealedMove { bytes }, proof)
}

/// Seal a move for one match and one participant.
///
/// The nonce must be fresh per sealing; the caller supplies it so that
/// sealing stays deterministic under test.
pub fn seal_move(
    key: &EvaluationKey,
    match_id: MatchId,
    player: &Addr,
    mv: Move,
    nonce: [u8; NONCE_LEN],
) -> (SealedMove, InputProof) {
    seal_raw(key, match_id, player, mv as u8, nonce)
}

/// Recover the masked value. Only the adapter calls this, behind proof
/// validation - the engine has no path to it.
pub(crate) fn unseal(
    key: &EvaluationKey,
    match_id: MatchId,
    player: &Addr,
    sealed: &SealedMove,
) -> Option<u8> {
    if sealed.bytes.len() != SEALED_LEN {
        return None;
    }
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&sealed.bytes[..NONCE_LEN]);
    Some(sealed.bytes[NONCE_LEN] ^ mask_byte(key, match_id, player, &nonce))
}
