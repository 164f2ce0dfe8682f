//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in column families.

use z_ledger_core::{BoostId, BoostSubject, Feature, TransactionId, UserId};

/// Create an account key from a user ID.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-ledger index key.
///
/// Format: `user_id (16 bytes) || seq (8 bytes, big-endian)`
///
/// `seq` is the row's position in the user's ledger, so keys sort in commit
/// order even when several rows share a millisecond.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Create a prefix for iterating all transactions for a user.
#[must_use]
pub fn user_transactions_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a counter key.
///
/// Format: `user_id (16 bytes) || feature code (1 byte)`
#[must_use]
pub fn counter_key(user_id: &UserId, feature: Feature) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.extend_from_slice(user_id.as_bytes());
    key.push(feature.code());
    key
}

/// Create a boost key from a boost ID.
#[must_use]
pub fn boost_key(boost_id: &BoostId) -> Vec<u8> {
    boost_id.to_bytes().to_vec()
}

/// Create a subject index key.
#[must_use]
pub fn subject_key(subject: &BoostSubject) -> Vec<u8> {
    subject.key().to_vec()
}

/// Create a processed-event key from an external event ID.
#[must_use]
pub fn event_key(event_id: &str) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

/// Decode a 16-byte ULID stored as an index value.
///
/// Returns `None` if the value has the wrong length.
#[must_use]
pub fn decode_ulid_bytes(value: &[u8]) -> Option<[u8; 16]> {
    value.try_into().ok()
}
