//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket. One
//! strongly-typed request per engine operation, one typed response or
//! error back, plus a broadcast stream of lifecycle events. All messages
//! are serialized as JSON for debugging ease, with optional binary
//! (bincode) for production.
//!
//! Snapshots expose commitment slots as booleans only - ciphertext bytes
//! never appear in any server-to-client message.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::amount::Amount;
use crate::core::id::{Addr, MatchId, TournamentId};
use crate::engine::error::EngineError;
use crate::engine::events::EngineEvent;
use crate::engine::matches::{Match, MatchState};
use crate::engine::tournament::{Tournament, TournamentState};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with the server.
    Auth(AuthRequest),

    /// Open a new tournament (operator only).
    CreateTournament {
        /// Entry fee per player.
        entry_fee: Amount,
    },

    /// Register in a tournament, escrowing the entry fee.
    JoinTournament {
        /// Target tournament.
        tournament_id: TournamentId,
    },

    /// Close registration and create round 1 (operator only).
    StartTournament {
        /// Target tournament.
        tournament_id: TournamentId,
    },

    /// Advance a fully resolved round.
    AdvanceRound {
        /// Target tournament.
        tournament_id: TournamentId,
    },

    /// Submit an encrypted move commitment.
    CommitMove(CommitMoveRequest),

    /// Resolve a fully committed match.
    ResolveMatch {
        /// Target match.
        match_id: MatchId,
    },

    /// Pay out a resolved match.
    PayoutMatch {
        /// Target match.
        match_id: MatchId,
    },

    /// Fetch a tournament snapshot (side-effect free).
    GetTournament {
        /// Target tournament.
        tournament_id: TournamentId,
    },

    /// Fetch a match snapshot (side-effect free).
    GetMatch {
        /// Target match.
        match_id: MatchId,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

/// Authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Bearer token from the auth provider fronting the wallet layer.
    pub token: String,
    /// Client version for compatibility check.
    pub client_version: String,
}

/// An encrypted move commitment as submitted by the encryption client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitMoveRequest {
    /// Target match.
    pub match_id: MatchId,
    /// Sealed move, hex encoded.
    pub ciphertext: String,
    /// Input proof binding the ciphertext to (match, participant), hex.
    pub input_proof: String,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// A tournament was created by this caller.
    TournamentCreated {
        /// The new tournament's id.
        tournament_id: TournamentId,
    },

    /// Tournament snapshot (response to join/start/advance/get).
    Tournament(TournamentSnapshot),

    /// Match snapshot (response to commit/resolve/get).
    Match(MatchSnapshot),

    /// Payout result.
    Payout(PayoutInfo),

    /// Lifecycle event broadcast.
    Event(EngineEvent),

    /// Rejected operation.
    Error(ServerError),

    /// Pong response.
    Pong {
        /// Echo of the client timestamp.
        timestamp: u64,
        /// Server wall-clock milliseconds.
        server_time: u64,
    },

    /// Server is shutting down.
    Shutdown {
        /// Human-readable reason.
        reason: String,
    },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Participant address the engine will trust, if successful.
    pub address: Option<Addr>,
    /// Connection session id, if successful.
    pub session_id: Option<String>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Full tournament state as exposed to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentSnapshot {
    /// Tournament id.
    pub tournament_id: TournamentId,
    /// Entry fee per player.
    pub entry_fee: Amount,
    /// Registered players in join order.
    pub players: Vec<Addr>,
    /// Escrowed pool.
    pub prize_pool: Amount,
    /// Lifecycle state.
    pub state: TournamentState,
    /// Current round (0 during registration).
    pub round_number: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Current round's matches in bracket order.
    pub round_matches: Vec<MatchId>,
    /// Current round's bye survivor.
    pub bye: Option<Addr>,
    /// Champion, once completed.
    pub champion: Option<Addr>,
}

impl From<&Tournament> for TournamentSnapshot {
    fn from(t: &Tournament) -> Self {
        Self {
            tournament_id: t.id,
            entry_fee: t.entry_fee,
            players: t.players.clone(),
            prize_pool: t.prize_pool,
            state: t.state,
            round_number: t.round_number,
            created_at: t.created_at,
            round_matches: t.round_matches.clone(),
            bye: t.bye,
            champion: t.champion,
        }
    }
}

/// Full match state as exposed to observers.
///
/// Commitments appear as filled/empty flags only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Match id.
    pub match_id: MatchId,
    /// Owning tournament.
    pub tournament_id: TournamentId,
    /// 1-based round.
    pub round: u32,
    /// First player.
    pub player1: Addr,
    /// Second player.
    pub player2: Addr,
    /// Whether player 1 has committed.
    pub player1_committed: bool,
    /// Whether player 2 has committed.
    pub player2_committed: bool,
    /// Winner, once resolved.
    pub winner: Option<Addr>,
    /// Lifecycle state.
    pub state: MatchState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&Match> for MatchSnapshot {
    fn from(m: &Match) -> Self {
        let (player1_committed, player2_committed) = m.committed_flags();
        Self {
            match_id: m.id,
            tournament_id: m.tournament_id,
            round: m.round,
            player1: m.player1,
            player2: m.player2,
            player1_committed,
            player2_committed,
            winner: m.winner,
            state: m.state,
            created_at: m.created_at,
        }
    }
}

/// Payout result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutInfo {
    /// The paid-out match.
    pub match_id: MatchId,
    /// Recipient.
    pub winner: Addr,
    /// Transferred amount (zero on non-terminal matches).
    pub amount: Amount,
}

/// Rejected operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Whether the identical request can succeed later.
    pub retryable: bool,
}

impl ServerError {
    /// Build the wire error for an engine rejection.
    pub fn from_engine(err: &EngineError) -> Self {
        Self {
            code: ErrorCode::from(err),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    /// Build a protocol-level error (not from the engine taxonomy).
    pub fn protocol(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: false,
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// Malformed or unparsable request.
    InvalidInput,
    /// Caller lacks the operator role.
    Unauthorized,
    /// Unknown tournament or match id.
    NotFound,
    /// Operation invalid for the current lifecycle state.
    WrongState,
    /// Already registered in this tournament.
    AlreadyJoined,
    /// Match already paid out.
    AlreadyPaid,
    /// Caller is not a participant of this match.
    NotAParticipant,
    /// Encrypted commitment failed validation.
    InvalidProof,
    /// Funding-layer debit failed.
    InsufficientFundsOrApproval,
    /// Escrow invariant violation.
    InsufficientEscrow,
    /// Too few players to start.
    NotEnoughPlayers,
    /// Current round still has open matches.
    RoundIncomplete,
    /// Entry fee must be positive.
    InvalidFee,
    /// Internal error.
    InternalError,
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::Unauthorized => ErrorCode::Unauthorized,
            EngineError::TournamentNotFound(_) | EngineError::MatchNotFound(_) => {
                ErrorCode::NotFound
            }
            EngineError::WrongState(_) => ErrorCode::WrongState,
            EngineError::AlreadyJoined => ErrorCode::AlreadyJoined,
            EngineError::AlreadyPaid => ErrorCode::AlreadyPaid,
            EngineError::NotAParticipant => ErrorCode::NotAParticipant,
            EngineError::InvalidProof(_) => ErrorCode::InvalidProof,
            EngineError::InsufficientFundsOrApproval => ErrorCode::InsufficientFundsOrApproval,
            EngineError::InsufficientEscrow { .. } => ErrorCode::InsufficientEscrow,
            EngineError::NotEnoughPlayers(_) => ErrorCode::NotEnoughPlayers,
            EngineError::RoundIncomplete => ErrorCode::RoundIncomplete,
            EngineError::InvalidFee => ErrorCode::InvalidFee,
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl MatchSnapshot {
    /// Serialize to binary (flat struct, bincode-safe).
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
