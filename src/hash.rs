//! The rolling transaction digest, per spec §4.1. Accumulates the
//! cryptographic identity of a transaction's work so the server can verify
//! the client and server saw the same sequence of statements and
//! parameters.
//!
//! No teacher analogue exists for this module (Spanner has no client-side
//! commit digest); the algorithm below follows spec §4.1 exactly and is
//! unit-tested against the commutativity property spec §8 requires.

use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];

/// `SHA-256(bytes)`.
pub fn hash_of(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Combines two digests into one under the canonical order spec §4.1
/// describes: treat each as a big-endian 256-bit integer (equivalently, a
/// signed lexicographic byte compare) and hash the smaller-first
/// concatenation. This ordering makes `dot` commutative.
pub fn dot(a: Hash, b: Hash) -> Hash {
    let (lo, hi) = if signed_cmp(&a, &b) == std::cmp::Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    };
    let mut hasher = Sha256::new();
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

/// Pairwise byte compare, treating each byte as a signed `i8` (matches the
/// server's comparator — see spec §9).
fn signed_cmp(a: &Hash, b: &Hash) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as i8, *y as i8);
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            ord => return ord,
        }
    }
    std::cmp::Ordering::Equal
}

/// The rolling digest state for one transaction: `H(txn_id) . H(stmt_1) .
/// H(stmt_2) . ...` where each `H(stmt_i)` folds in the statement text and
/// every parameter in declared order.
#[derive(Clone, Copy, Debug)]
pub struct RollingHash {
    state: Hash,
}

impl RollingHash {
    /// Starts a new rolling hash seeded with the transaction id.
    pub fn new(transaction_id: &str) -> Self {
        Self {
            state: hash_of(transaction_id.as_bytes()),
        }
    }

    /// Folds one executed statement (text plus parameters, in declared
    /// order) into the rolling state.
    pub fn fold_statement<'a>(&mut self, statement_text: &str, params: impl IntoIterator<Item = &'a [u8]>) {
        let mut stmt_hash = hash_of(statement_text.as_bytes());
        for param in params {
            stmt_hash = dot(stmt_hash, hash_of(param));
        }
        self.state = dot(self.state, stmt_hash);
    }

    /// The current digest, suitable for sending as the commit digest.
    pub fn current(&self) -> Hash {
        self.state
    }
}
