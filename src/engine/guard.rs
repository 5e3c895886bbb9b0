//! Access Control Guard
//!
//! One privileged identity - the operator - is configured at system
//! initialization and never changes afterwards. Tournament creation and
//! round start require it; everything else is open to any authenticated
//! participant.

use crate::core::id::Addr;
use crate::engine::error::EngineError;

/// Restricts privileged operations to the configured operator.
#[derive(Clone, Debug)]
pub struct OperatorGuard {
    operator: Addr,
}

impl OperatorGuard {
    /// Create a guard for the given operator identity.
    pub fn new(operator: Addr) -> Self {
        Self { operator }
    }

    /// The configured operator.
    pub fn operator(&self) -> &Addr {
        &self.operator
    }

    /// Fail with `Unauthorized` unless `caller` is the operator.
    pub fn require_operator(&self, caller: &Addr) -> Result<(), EngineError> {
        if caller == &self.operator {
            Ok(())
        } else {
            Err(EngineError::Unauthorized)
        }
    }
}
