use crate::error::AuthError;
use bcrypt::{hash, verify, DEFAULT_COST};

pub trait HashingService: Send + Sync {
    fn hash_password(&self, value: &str) -> Result<String, AuthError>;
    /// Malformed hashes verify as false.
    fn verify(&self, value: &str, password_hash: &str) -> bool;
}

#[derive(Clone)]
pub struct BcryptHashingService {
    cost: u32,
}

impl BcryptHashingService {
    pub fn new(cost: u32) -> Self {
        BcryptHashingService { cost }
    }
}

impl Default for BcryptHashingService {
    fn default() -> Self {
        BcryptHashingService { cost: DEFAULT_COST }
    }
}

impl HashingService for BcryptHashingService {
    fn hash_password(&self, value: &str) -> Result<String, AuthError> {
        hash(value, self.cost).map_err(|e| AuthError::InternalError(e.to_string()))
    }

    fn verify(&self, value: &str, password_hash: &str) -> bool {
        verify(value, password_hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> BcryptHashingService {
        BcryptHashingService::new(4)
    }

    #[test]
    fn test_verify_matching_password() {
        let hasher = hasher();
        let hashed = hasher.hash_password("pw123").unwrap();
        assert!(hasher.verify("pw123", &hashed));
        assert!(!hasher.verify("pw124", &hashed));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = hasher();
        let first = hasher.hash_password("pw123").unwrap();
        let second = hasher.hash_password("pw123").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify("pw123", &second));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = hasher();
        assert!(!hasher.verify("pw123", ""));
        assert!(!hasher.verify("pw123", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("pw123", "$2b$04$short"));
    }

    #[test]
    fn test_out_of_range_cost_is_an_error() {
        let hasher = BcryptHashingService::new(99);
        assert!(matches!(
            hasher.hash_password("pw123"),
            Err(AuthError::InternalError(_))
        ));
    }
}
