//! Confidential Move Handling
//!
//! The engine-facing adapter over the (external) homomorphic evaluation
//! backend, plus the sealed wire format clients submit.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CRYPTO BOUNDARY                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  seal.rs    - sealed-move wire format + client-side sealing │
//! │  adapter.rs - proof validation, opaque handles, comparison  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Plaintext moves exist on the client side and inside `adapter.rs`,
//! nowhere else. The engine stores [`MoveHandle`]s and learns only the
//! three-way [`CompareOutcome`].

pub mod adapter;
pub mod seal;

// Re-export key types
pub use adapter::{CipherSuite, CommitContext, CompareOutcome, CryptoError, MoveHandle};
pub use seal::{seal_move, EvaluationKey, InputProof, Move, SealedMove, NONCE_LEN, SEALED_LEN};
