//! Accounts and the account table.

use ember_types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An account's committed state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: Amount,
    /// Nonce of the last applied transaction from this account.
    /// `None` means the account has never sent — the first transaction must
    /// carry nonce 0.
    pub nonce: Option<u64>,
}

impl Account {
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            nonce: None,
        }
    }

    /// The nonce the next transaction from this account must carry.
    pub fn expected_nonce(&self) -> u64 {
        self.nonce.map_or(0, |n| n + 1)
    }
}

/// Address → account, ordered byte-lexicographically by address.
///
/// A `BTreeMap` so that serializing the table yields the sorted canonical
/// form the state root hashes.
pub type AccountTable = BTreeMap<Address, Account>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_account_expects_nonce_zero() {
        assert_eq!(Account::with_balance(Amount::new(10)).expected_nonce(), 0);
    }

    #[test]
    fn nonce_advances_by_one() {
        let acct = Account {
            balance: Amount::new(10),
            nonce: Some(4),
        };
        assert_eq!(acct.expected_nonce(), 5);
    }

    #[test]
    fn never_sent_serializes_as_null() {
        let acct = Account::with_balance(Amount::new(7));
        assert_eq!(
            serde_json::to_string(&acct).unwrap(),
            r#"{"balance":7,"nonce":null}"#
        );
    }
}
