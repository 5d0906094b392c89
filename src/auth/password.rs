//! bcrypt helpers. All of these are CPU-bound; call them from a blocking task.

use bcrypt::BcryptError;

pub fn hash(raw: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(raw, cost)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify(raw: &str, hash: &str) -> bool {
    bcrypt::verify(raw, hash).unwrap_or(false)
}

/// Spend the same work as a real verification when there is no account to
/// check against.
pub fn burn(raw: &str, cost: u32) {
    let _ = bcrypt::hash(raw, cost);
}
