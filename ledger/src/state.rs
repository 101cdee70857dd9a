//! The deterministic state engine.
//!
//! Applies ordered transaction lists to the account table. Every rule
//! failure is fatal to the surrounding operation; a block either applies in
//! full or leaves the state untouched (callers apply to a copy and commit).

use crate::account::{Account, AccountTable};
use crate::error::LedgerError;
use crate::transaction::Transaction;
use ember_types::{Address, Amount, Digest};

/// The account table plus its transition rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct State {
    accounts: AccountTable,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: AccountTable) -> Self {
        Self { accounts }
    }

    pub fn accounts(&self) -> &AccountTable {
        &self.accounts
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.accounts
            .get(address)
            .map_or(Amount::ZERO, |a| a.balance)
    }

    /// Seed an account with a balance, creating or topping it up.
    ///
    /// This is the faucet/test hook, not a consensus operation: it mutates
    /// committed state directly, so clusters must only use it through the
    /// shared genesis allocation.
    pub fn create_account(&mut self, address: Address, balance: Amount) {
        let entry = self.accounts.entry(address).or_default();
        entry.balance = entry.balance.checked_add(balance).unwrap_or(entry.balance);
    }

    /// Run admission rules 1–4 against the current table without mutating it.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<(), LedgerError> {
        // 1. Signature and key-to-address binding.
        if !tx.verify_signature() {
            return Err(LedgerError::InvalidSignature);
        }

        // 2. Strict nonce succession.
        let expected = self
            .accounts
            .get(&tx.from)
            .map_or(0, Account::expected_nonce);
        if tx.nonce != expected {
            return Err(LedgerError::BadNonce {
                expected,
                got: tx.nonce,
            });
        }

        // 3. The sender covers amount + gas.
        let needed = tx
            .amount
            .checked_add(tx.gas_price)
            .ok_or_else(|| LedgerError::MalformedTransaction("amount overflow".into()))?;
        let available = self.balance(&tx.from);
        if available < needed {
            return Err(LedgerError::InsufficientBalance { needed, available });
        }

        // 4. Shape checks and id integrity.
        if tx.amount.is_zero() {
            return Err(LedgerError::MalformedTransaction(
                "amount must be positive".into(),
            ));
        }
        if tx.from.is_empty() || tx.to.is_empty() {
            return Err(LedgerError::MalformedTransaction("empty address".into()));
        }
        if tx.from == tx.to {
            return Err(LedgerError::MalformedTransaction("self transfer".into()));
        }
        if tx.id != tx.compute_id() {
            return Err(LedgerError::InvalidSignature);
        }

        Ok(())
    }

    /// Validate and apply a single transaction.
    ///
    /// Debits `amount + gas_price` from the sender (the gas portion is
    /// burned), credits `amount` to the recipient, and advances the sender's
    /// nonce. The table is only touched after every check has passed.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        self.validate_transaction(tx)?;

        let debit = tx
            .amount
            .checked_add(tx.gas_price)
            .expect("checked in validate_transaction");
        let sender_balance = self
            .balance(&tx.from)
            .checked_sub(debit)
            .expect("checked in validate_transaction");
        let recipient_balance = self
            .balance(&tx.to)
            .checked_add(tx.amount)
            .ok_or_else(|| LedgerError::MalformedTransaction("recipient balance overflow".into()))?;

        let sender = self.accounts.entry(tx.from.clone()).or_default();
        sender.balance = sender_balance;
        sender.nonce = Some(tx.nonce);

        let recipient = self.accounts.entry(tx.to.clone()).or_default();
        recipient.balance = recipient_balance;

        Ok(())
    }

    /// Apply an ordered transaction list; the first failure aborts.
    ///
    /// Callers wanting all-or-nothing semantics run this on a clone and
    /// commit the clone on success — that is what the chain store does.
    pub fn apply_all(&mut self, transactions: &[Transaction]) -> Result<(), LedgerError> {
        for tx in transactions {
            self.apply_transaction(tx)?;
        }
        Ok(())
    }

    /// Flat commitment to the whole table: the SHA-256 digest of the sorted
    /// canonical JSON encoding of `address -> {balance, nonce}`.
    pub fn state_root(&self) -> Digest {
        let encoded =
            serde_json::to_vec(&self.accounts).expect("account table serialization is infallible");
        ember_crypto::sha256(&encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_crypto::{derive_address, keypair_from_seed, KeyPair};
    use ember_types::Timestamp;

    fn funded(seed: u8, balance: u64) -> (KeyPair, Address, State) {
        let kp = keypair_from_seed(&[seed; 32]);
        let addr = derive_address(&kp.public);
        let mut state = State::new();
        state.create_account(addr.clone(), Amount::new(balance));
        (kp, addr, state)
    }

    fn transfer(kp: &KeyPair, to: &str, amount: u64, gas: u64, nonce: u64) -> Transaction {
        Transaction::new_signed(
            kp,
            Address::new(to),
            Amount::new(amount),
            Amount::new(gas),
            nonce,
            Timestamp::from_epoch_secs(1_704_067_200),
        )
    }

    #[test]
    fn transfer_moves_value_and_burns_gas() {
        let (kp, sender, mut state) = funded(1, 1000);
        let tx = transfer(&kp, "0xb", 100, 1, 0);
        state.apply_transaction(&tx).unwrap();

        assert_eq!(state.balance(&sender), Amount::new(899));
        assert_eq!(state.balance(&Address::new("0xb")), Amount::new(100));
        assert_eq!(state.account(&sender).unwrap().nonce, Some(0));
        // Recipient was created on first credit and has never sent.
        assert_eq!(state.account(&Address::new("0xb")).unwrap().nonce, None);
    }

    #[test]
    fn replay_is_rejected_with_bad_nonce() {
        let (kp, sender, mut state) = funded(1, 1000);
        let tx = transfer(&kp, "0xb", 100, 1, 0);
        state.apply_transaction(&tx).unwrap();

        let err = state.apply_transaction(&tx).unwrap_err();
        assert_eq!(err, LedgerError::BadNonce { expected: 1, got: 0 });
        assert_eq!(state.balance(&sender), Amount::new(899));
    }

    #[test]
    fn nonce_gap_is_rejected() {
        let (kp, _, mut state) = funded(1, 1000);
        let tx = transfer(&kp, "0xb", 10, 0, 2);
        assert_eq!(
            state.apply_transaction(&tx).unwrap_err(),
            LedgerError::BadNonce { expected: 0, got: 2 }
        );
    }

    #[test]
    fn insufficient_balance_leaves_state_unchanged() {
        let (kp, sender, mut state) = funded(1, 50);
        let tx = transfer(&kp, "0xb", 100, 1, 0);
        let err = state.apply_transaction(&tx).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                needed: Amount::new(101),
                available: Amount::new(50),
            }
        );
        assert_eq!(state.balance(&sender), Amount::new(50));
        assert_eq!(state.account(&sender).unwrap().nonce, None);
    }

    #[test]
    fn zero_amount_is_malformed() {
        let (kp, _, mut state) = funded(1, 100);
        let tx = transfer(&kp, "0xb", 0, 0, 0);
        assert!(matches!(
            state.apply_transaction(&tx).unwrap_err(),
            LedgerError::MalformedTransaction(_)
        ));
    }

    #[test]
    fn self_transfer_is_malformed() {
        let kp = keypair_from_seed(&[1u8; 32]);
        let addr = derive_address(&kp.public);
        let mut state = State::new();
        state.create_account(addr.clone(), Amount::new(100));
        let tx = Transaction::new_signed(
            &kp,
            addr,
            Amount::new(10),
            Amount::ZERO,
            0,
            Timestamp::from_epoch_secs(1_704_067_200),
        );
        assert!(matches!(
            state.apply_transaction(&tx).unwrap_err(),
            LedgerError::MalformedTransaction(_)
        ));
    }

    #[test]
    fn unsigned_transaction_is_rejected() {
        let (kp, _, mut state) = funded(1, 100);
        let mut tx = transfer(&kp, "0xb", 10, 0, 0);
        tx.signature = String::new();
        assert_eq!(
            state.apply_transaction(&tx).unwrap_err(),
            LedgerError::InvalidSignature
        );
    }

    #[test]
    fn state_root_is_deterministic_and_order_insensitive() {
        let (kp_a, _, mut state_a) = funded(1, 500);
        let (kp_b, _, _) = funded(2, 0);
        // Seed the same accounts into a second state in a different order.
        let mut state_b = State::new();
        state_b.create_account(derive_address(&kp_b.public), Amount::ZERO);
        state_b.create_account(derive_address(&kp_a.public), Amount::new(500));
        state_a.create_account(derive_address(&kp_b.public), Amount::ZERO);
        assert_eq!(state_a.state_root(), state_b.state_root());
    }

    #[test]
    fn identical_histories_produce_identical_roots() {
        let (kp, _, mut one) = funded(1, 1000);
        let mut two = one.clone();
        let txs = vec![transfer(&kp, "0xb", 100, 1, 0), transfer(&kp, "0xc", 50, 2, 1)];
        one.apply_all(&txs).unwrap();
        two.apply_all(&txs).unwrap();
        assert_eq!(one, two);
        assert_eq!(one.state_root(), two.state_root());
    }
}
