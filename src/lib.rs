//! # Veiled Arena Server
//!
//! Confidential rock-paper-scissors tournament engine: single-elimination
//! brackets, encrypted move commitments, homomorphic winner determination,
//! and escrowed entry-fee payouts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   VEILED ARENA SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── amount.rs   - Decimal fixed-point token amounts         │
//! │  └── id.rs       - Entity ids, monotonic counters, addresses │
//! │                                                              │
//! │  engine/         - Lifecycle state machines (sequential)     │
//! │  ├── tournament.rs - Registration, rounds, completion        │
//! │  ├── matches.rs  - Commitment slots, resolution, payout      │
//! │  ├── bracket.rs  - Sequential pairing + bye policy           │
//! │  ├── guard.rs    - Operator access control                   │
//! │  ├── events.rs   - Lifecycle events                          │
//! │  ├── error.rs    - Error taxonomy                            │
//! │  └── ops.rs      - Atomic operation facade                   │
//! │                                                              │
//! │  crypto/         - Confidential move boundary                │
//! │  ├── seal.rs     - Sealed-move format + client-side sealing  │
//! │  └── adapter.rs  - Proof validation, encrypted comparison    │
//! │                                                              │
//! │  escrow/         - Per-tournament fund pools                 │
//! │                                                              │
//! │  network/        - WebSocket service (non-deterministic)     │
//! │  ├── auth.rs     - JWT validation -> participant address     │
//! │  ├── protocol.rs - Typed request/response messages           │
//! │  └── server.rs   - Connection handling and dispatch          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Confidentiality Guarantee
//!
//! Plaintext moves exist only on the client side and inside the crypto
//! adapter. The engine stores opaque handles, snapshots expose slots as
//! booleans, and the only cleartext that ever leaves the adapter is the
//! three-way comparison outcome.
//!
//! ## Atomicity Guarantee
//!
//! Every engine operation checks all preconditions before its first
//! mutation: it fully applies or leaves every entity unchanged, and a
//! caller losing a race observes the post-state taxonomy error.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod crypto;
pub mod engine;
pub mod escrow;
pub mod network;

// Re-export commonly used types
pub use core::amount::Amount;
pub use core::id::{Addr, MatchId, TournamentId};
pub use crypto::{seal_move, CipherSuite, EvaluationKey, InputProof, Move, SealedMove};
pub use engine::{Engine, EngineConfig, EngineError, EngineEvent, MatchState, TournamentState};
pub use escrow::EscrowLedger;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
