//! Password hashing. bcrypt with the library default cost.

use anyhow::Context;

use crate::error::ApiResult;

pub fn hash_password(plain: &str) -> ApiResult<String> {
    let hashed = bcrypt::hash(plain, bcrypt::DEFAULT_COST).context("bcrypt hash failed")?;
    Ok(hashed)
}

/// Verification failures and malformed hashes both count as a mismatch.
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    bcrypt::verify(plain, hashed).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        // low cost to keep the test fast
        let hashed = bcrypt::hash("hunter2", 4).unwrap();
        assert!(verify_password("hunter2", &hashed));
        assert!(!verify_password("hunter3", &hashed));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("hunter2", "not-a-bcrypt-hash"));
    }
}
