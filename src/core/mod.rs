//! Core primitives.
//!
//! Integer-only money math and engine-owned identity allocation. Everything
//! here is deterministic and free of ambient state.

pub mod amount;
pub mod id;

// Re-export core types
pub use amount::{Amount, MICROS_PER_TOKEN};
pub use id::{Addr, IdAllocator, MatchId, TournamentId};
