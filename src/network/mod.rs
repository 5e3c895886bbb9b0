//! Network Layer
//!
//! WebSocket front for the engine. This layer is **non-deterministic** -
//! all lifecycle logic runs through `engine/`; nothing here mutates an
//! entity except by calling an engine operation.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{derive_address, validate_token, AuthConfig, AuthError, TokenClaims};
pub use protocol::{
    ClientMessage, CommitMoveRequest, ErrorCode, MatchSnapshot, PayoutInfo, ServerError,
    ServerMessage, TournamentSnapshot,
};
pub use server::{ArenaServer, ArenaServerError, ServerConfig};
