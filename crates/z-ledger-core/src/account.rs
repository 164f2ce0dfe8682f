//! Credit account types for z-ledger.
//!
//! A [`CreditAccount`] holds the balance and running totals for one user. The
//! only way to change it is [`CreditAccount::apply`], which stores call while
//! holding the account's lock, so the ledger row and the new balance are
//! computed from the same read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credits::{CreditTransaction, LedgerEntry, TransactionType};
use crate::error::{LedgerError, Result};
use crate::UserId;

/// A user's credit balance and lifetime totals.
///
/// Invariant: `balance = total_purchased + total_received + Σbonus − total_spent − total_gifted`.
/// Bonus is not stored here; it is reconstructed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    /// The user ID.
    pub user_id: UserId,

    /// Current spendable credits. Never negative.
    pub balance: i64,

    /// Lifetime credits purchased.
    pub total_purchased: i64,

    /// Lifetime credits spent, net of refunds.
    pub total_spent: i64,

    /// Lifetime credits gifted away.
    pub total_gifted: i64,

    /// Lifetime credits received as gifts.
    pub total_received: i64,

    /// Number of ledger rows. The next row's position in the user's ledger.
    pub transaction_count: u64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: 0,
            total_purchased: 0,
            total_spent: 0,
            total_gifted: 0,
            total_received: 0,
            transaction_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account can cover a debit of `credits`.
    #[must_use]
    pub fn has_sufficient_credits(&self, credits: i64) -> bool {
        self.balance >= credits
    }

    /// Apply one ledger entry, returning the committed row.
    ///
    /// On error the account is left untouched.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidAmount` if the entry's sign is wrong, it is for a
    ///   different user, or a refund exceeds what was spent.
    /// - `LedgerError::InsufficientCredits` if a debit would go below zero.
    pub fn apply(&mut self, entry: LedgerEntry, now: DateTime<Utc>) -> Result<CreditTransaction> {
        entry.validate()?;
        if entry.user_id != self.user_id {
            return Err(LedgerError::InvalidAmount(format!(
                "entry for {} applied to account {}",
                entry.user_id, self.user_id
            )));
        }

        let balance_before = self.balance;
        let balance_after = balance_before
            .checked_add(entry.amount)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".into()))?;

        if entry.transaction_type.is_debit() && balance_after < 0 {
            return Err(LedgerError::InsufficientCredits {
                balance: balance_before,
                required: -entry.amount,
            });
        }

        let mut next = self.clone();
        match entry.transaction_type {
            TransactionType::Purchase => {
                next.total_purchased =
                    checked_total(next.total_purchased.checked_add(entry.amount))?;
            }
            TransactionType::Spend => {
                next.total_spent = checked_total(next.total_spent.checked_sub(entry.amount))?;
            }
            TransactionType::GiftSent => {
                next.total_gifted = checked_total(next.total_gifted.checked_sub(entry.amount))?;
            }
            TransactionType::GiftReceived => {
                next.total_received =
                    checked_total(next.total_received.checked_add(entry.amount))?;
            }
            TransactionType::Refund => {
                if entry.amount > next.total_spent {
                    return Err(LedgerError::InvalidAmount(format!(
                        "refund of {} exceeds total spent {}",
                        entry.amount, next.total_spent
                    )));
                }
                next.total_spent -= entry.amount;
            }
            TransactionType::Bonus => {}
        }
        next.balance = balance_after;
        next.transaction_count = next
            .transaction_count
            .checked_add(1)
            .ok_or_else(|| LedgerError::InvalidAmount("transaction count overflow".into()))?;
        next.updated_at = now;

        *self = next;
        Ok(entry.into_transaction(balance_before, balance_after, now))
    }
}

fn checked_total(total: Option<i64>) -> Result<i64> {
    total.ok_or_else(|| LedgerError::InvalidAmount("total overflow".into()))
}

/// Per-type sums over a user's ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Number of rows.
    pub transactions: u64,
    /// Sum of purchases.
    pub purchased: i64,
    /// Sum of spends, net of refunds.
    pub spent: i64,
    /// Sum of gifts sent.
    pub gifted: i64,
    /// Sum of gifts received.
    pub received: i64,
    /// Sum of bonuses.
    pub bonus: i64,
    /// Balance after the last row.
    pub closing_balance: i64,
}

/// Check an account against its full ledger (oldest row first).
///
/// # Errors
///
/// Returns `LedgerError::AccountInconsistent` describing the first mismatch.
pub fn reconcile(account: &CreditAccount, ledger: &[CreditTransaction]) -> Result<LedgerTotals> {
    let fail = |detail: String| LedgerError::AccountInconsistent {
        user_id: account.user_id,
        detail,
    };

    let mut totals = LedgerTotals::default();
    let mut by_type: HashMap<TransactionType, i64> = HashMap::new();
    let mut running = 0i64;

    for tx in ledger {
        if tx.user_id != account.user_id {
            return Err(fail(format!("transaction {} belongs to {}", tx.id, tx.user_id)));
        }
        if !tx.is_balanced() {
            return Err(fail(format!(
                "transaction {} does not balance: {} + {} != {}",
                tx.id, tx.balance_before, tx.amount, tx.balance_after
            )));
        }
        if tx.balance_before != running {
            return Err(fail(format!(
                "transaction {} starts at {} but previous balance was {}",
                tx.id, tx.balance_before, running
            )));
        }
        running = tx.balance_after;
        let sum = by_type.entry(tx.transaction_type).or_default();
        *sum = sum
            .checked_add(tx.amount)
            .ok_or_else(|| fail(format!("{} total overflows", tx.transaction_type)))?;
        totals.transactions += 1;
    }

    let sum = |t: TransactionType| by_type.get(&t).copied().unwrap_or(0);
    let overflow = |what: &str| fail(format!("{what} total overflows"));
    totals.purchased = sum(TransactionType::Purchase);
    totals.spent = 0i64
        .checked_sub(sum(TransactionType::Spend))
        .and_then(|spent| spent.checked_sub(sum(TransactionType::Refund)))
        .ok_or_else(|| overflow("spent"))?;
    totals.gifted = 0i64
        .checked_sub(sum(TransactionType::GiftSent))
        .ok_or_else(|| overflow("gifted"))?;
    totals.received = sum(TransactionType::GiftReceived);
    totals.bonus = sum(TransactionType::Bonus);
    totals.closing_balance = running;

    if totals.transactions != account.transaction_count {
        return Err(fail(format!(
            "account records {} transactions but ledger has {}",
            account.transaction_count, totals.transactions
        )));
    }

    if running != account.balance {
        return Err(fail(format!(
            "ledger closes at {running} but balance is {}",
            account.balance
        )));
    }

    let expected = [
        ("total_purchased", totals.purchased, account.total_purchased),
        ("total_spent", totals.spent, account.total_spent),
        ("total_gifted", totals.gifted, account.total_gifted),
        ("total_received", totals.received, account.total_received),
    ];
    for (field, from_ledger, stored) in expected {
        if from_ledger != stored {
            return Err(fail(format!("{field} is {stored} but ledger sums to {from_ledger}")));
        }
    }

    let identity = account
        .total_purchased
        .checked_add(account.total_received)
        .and_then(|sum| sum.checked_add(totals.bonus))
        .and_then(|sum| sum.checked_sub(account.total_spent))
        .and_then(|sum| sum.checked_sub(account.total_gifted))
        .ok_or_else(|| overflow("balance identity"))?;
    if identity != account.balance {
        return Err(fail(format!(
            "totals imply balance {identity} but balance is {}",
            account.balance
        )));
    }

    Ok(totals)
}
