//! Decimal Fixed-Point Token Amounts
//!
//! All fee and pool accounting uses integer micro-units with 6 fractional
//! decimal digits (the escrowed token has 6 decimals). No floats anywhere
//! in fund math - every operation is checked integer arithmetic.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  1 token  = 1_000_000 micro-units                           │
//! │  10.5     = 10_500_000                                      │
//! │  Backing: u64 (max ~18.4 trillion tokens)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Overflow never wraps: `checked_*` everywhere, and the engine maps a
//! `None` to an invariant failure rather than minting or burning funds.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Micro-units per whole token (10^6).
pub const MICROS_PER_TOKEN: u64 = 1_000_000;

/// A non-negative token amount in micro-units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Construct from raw micro-units.
    pub const fn from_micros(micros: u64) -> Self {
        Amount(micros)
    }

    /// Construct from whole tokens.
    pub const fn from_tokens(tokens: u64) -> Self {
        Amount(tokens * MICROS_PER_TOKEN)
    }

    /// Raw micro-units.
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Is this the zero amount?
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction. `None` when `other > self`.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Checked multiplication by a count (e.g. fee x player count).
    pub fn checked_mul(self, count: u64) -> Option<Amount> {
        self.0.checked_mul(count).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICROS_PER_TOKEN;
        let frac = self.0 % MICROS_PER_TOKEN;
        write!(f, "{}.{:06}", whole, frac)
    }
}
