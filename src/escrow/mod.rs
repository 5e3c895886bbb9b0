//! Escrow Ledger
//!
//! Holds entry-fee deposits and pays winners. Balances and allowances
//! model the external token primitive at its interface boundary (the
//! approval transaction itself happens outside the engine; the ledger
//! records its effect). Each tournament's pool is tracked under its own
//! id and never commingled with another's.
//!
//! Every operation checks all preconditions before touching state, so a
//! failure leaves the ledger exactly as it was.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::amount::Amount;
use crate::core::id::{Addr, TournamentId};

/// Per-address token state: spendable balance plus the allowance granted
/// to the engine for entry-fee collection.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Account {
    /// Spendable balance.
    pub balance: Amount,
    /// Remaining allowance toward the engine.
    pub allowance: Amount,
}

/// Ledger errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// Payer lacks balance or has not approved enough.
    #[error("insufficient funds or approval")]
    InsufficientFundsOrApproval,

    /// A payout exceeds the tournament's tracked pool. If share accounting
    /// is correct this cannot happen; its occurrence is an internal
    /// invariant violation, not a user error.
    #[error("escrow pool holds {pool}, cannot pay {requested}")]
    InsufficientEscrow {
        /// Current pool balance.
        pool: Amount,
        /// Requested payout amount.
        requested: Amount,
    },

    /// An addition overflowed the amount range.
    #[error("amount overflow")]
    AmountOverflow,
}

/// Fungible escrow across all tournaments, partitioned per tournament id.
#[derive(Clone, Debug, Default)]
pub struct EscrowLedger {
    accounts: BTreeMap<Addr, Account>,
    pools: BTreeMap<TournamentId, Amount>,
}

impl EscrowLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit tokens to an address. Stand-in for an inbound transfer from
    /// the external token primitive (used by the binary's faucet and by
    /// tests).
    pub fn credit(&mut self, addr: Addr, amount: Amount) -> Result<(), EscrowError> {
        let account = self.accounts.entry(addr).or_default();
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(EscrowError::AmountOverflow)?;
        Ok(())
    }

    /// Record an approval of `amount` toward the engine. Stand-in for the
    /// external approval transaction that precedes a join.
    pub fn approve(&mut self, addr: Addr, amount: Amount) {
        self.accounts.entry(addr).or_default().allowance = amount;
    }

    /// Debit one entry fee from `payer` into the tournament's pool.
    ///
    /// Requires both balance and allowance to cover the fee; consumes
    /// allowance as it spends.
    pub fn collect_entry_fee(
        &mut self,
        payer: Addr,
        tournament: TournamentId,
        fee: Amount,
    ) -> Result<(), EscrowError> {
        let account = self.accounts.get(&payer).copied().unwrap_or_default();

        let new_balance = account
            .balance
            .checked_sub(fee)
            .ok_or(EscrowError::InsufficientFundsOrApproval)?;
        let new_allowance = account
            .allowance
            .checked_sub(fee)
            .ok_or(EscrowError::InsufficientFundsOrApproval)?;
        let new_pool = self
            .pool_of(tournament)
            .checked_add(fee)
            .ok_or(EscrowError::AmountOverflow)?;

        // All checks passed; apply.
        let account = self.accounts.entry(payer).or_default();
        account.balance = new_balance;
        account.allowance = new_allowance;
        self.pools.insert(tournament, new_pool);
        Ok(())
    }

    /// Move `amount` from the tournament's pool to `payee`.
    pub fn pay_out(
        &mut self,
        tournament: TournamentId,
        payee: Addr,
        amount: Amount,
    ) -> Result<(), EscrowError> {
        let pool = self.pool_of(tournament);
        let new_pool = pool.checked_sub(amount).ok_or(EscrowError::InsufficientEscrow {
            pool,
            requested: amount,
        })?;
        let new_balance = self
            .accounts
            .get(&payee)
            .copied()
            .unwrap_or_default()
            .balance
            .checked_add(amount)
            .ok_or(EscrowError::AmountOverflow)?;

        self.pools.insert(tournament, new_pool);
        self.accounts.entry(payee).or_default().balance = new_balance;
        Ok(())
    }

    /// Spendable balance of an address.
    pub fn balance_of(&self, addr: &Addr) -> Amount {
        self.accounts.get(addr).map(|a| a.balance).unwrap_or(Amount::ZERO)
    }

    /// Remaining allowance of an address.
    pub fn allowance_of(&self, addr: &Addr) -> Amount {
        self.accounts.get(addr).map(|a| a.allowance).unwrap_or(Amount::ZERO)
    }

    /// Current pool of a tournament.
    pub fn pool_of(&self, tournament: TournamentId) -> Amount {
        self.pools.get(&tournament).copied().unwrap_or(Amount::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Addr {
        Addr::new([b; 20])
    }

    fn funded_ledger(payer: Addr, tokens: u64) -> EscrowLedger {
        let mut ledger = EscrowLedger::new();
        ledger.credit(payer, Amount::from_tokens(tokens)).unwrap();
        ledger.approve(payer, Amount::from_tokens(tokens));
        ledger
    }

    #[test]
    fn test_entry_fee_moves_into_pool() {
        let payer = addr(1);
        let mut ledger = funded_ledger(payer, 100);
        let fee = Amount::from_tokens(10);

        ledger.collect_entry_fee(payer, TournamentId(0), fee).unwrap();

        assert_eq!(ledger.balance_of(&payer), Amount::from_tokens(90));
        assert_eq!(ledger.allowance_of(&payer), Amount::from_tokens(90));
        assert_eq!(ledger.pool_of(TournamentId(0)), fee);
    }

    #[test]
    fn test_fee_without_balance_fails() {
        let payer = addr(1);
        let mut ledger = EscrowLedger::new();
        ledger.approve(payer, Amount::from_tokens(100));

        let result = ledger.collect_entry_fee(payer, TournamentId(0), Amount::from_tokens(10));
        assert_eq!(result, Err(EscrowError::InsufficientFundsOrApproval));
        assert_eq!(ledger.pool_of(TournamentId(0)), Amount::ZERO);
    }

    #[test]
    fn test_fee_without_approval_fails() {
        let payer = addr(1);
        let mut ledger = EscrowLedger::new();
        ledger.credit(payer, Amount::from_tokens(100)).unwrap();

        let result = ledger.collect_entry_fee(payer, TournamentId(0), Amount::from_tokens(10));
        assert_eq!(result, Err(EscrowError::InsufficientFundsOrApproval));
        // Balance untouched on failure.
        assert_eq!(ledger.balance_of(&payer), Amount::from_tokens(100));
    }

    #[test]
    fn test_pools_are_partitioned() {
        let payer = addr(1);
        let mut ledger = funded_ledger(payer, 100);
        let fee = Amount::from_tokens(10);

        ledger.collect_entry_fee(payer, TournamentId(0), fee).unwrap();
        ledger.collect_entry_fee(payer, TournamentId(1), fee).unwrap();

        ledger.pay_out(TournamentId(0), addr(2), fee).unwrap();

        assert_eq!(ledger.pool_of(TournamentId(0)), Amount::ZERO);
        assert_eq!(ledger.pool_of(TournamentId(1)), fee);
        assert_eq!(ledger.balance_of(&addr(2)), fee);
    }

    #[test]
    fn test_overdrawn_payout_is_invariant_violation() {
        let mut ledger = EscrowLedger::new();
        let result = ledger.pay_out(TournamentId(0), addr(2), Amount::from_tokens(1));
        assert!(matches!(result, Err(EscrowError::InsufficientEscrow { .. })));
    }

    #[test]
    fn test_zero_payout_is_a_noop() {
        let mut ledger = EscrowLedger::new();
        ledger.pay_out(TournamentId(0), addr(2), Amount::ZERO).unwrap();
        assert_eq!(ledger.balance_of(&addr(2)), Amount::ZERO);
    }
}
