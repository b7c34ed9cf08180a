//! Password hashing and credential checks.

use crate::error::{ChirpError, Result};
use crate::model::{Role, User};
use crate::storage::Storage;
use tracing::debug;

/// Hash a password using bcrypt
///
/// # Errors
///
/// Returns [`ChirpError::PasswordHash`] if `cost` is out of range.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Verify a password against a hash
///
/// # Errors
///
/// Returns [`ChirpError::PasswordHash`] if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    Ok(bcrypt::verify(password, hash)?)
}

/// Check an account/password pair against the accounts holding `role`.
///
/// Regular users and admins sign in through separate paths, so an admin
/// account is unknown to a `Role::User` sign-in and vice versa. Unknown
/// accounts and wrong passwords both yield [`ChirpError::InvalidCredentials`].
///
/// # Errors
///
/// Returns [`ChirpError::InvalidCredentials`] on mismatch, or a storage error.
pub fn authenticate(
    storage: &Storage,
    account: &str,
    password: &str,
    role: Role,
) -> Result<User> {
    let Some(user) = storage.find_user_by_account(account, role)? else {
        debug!(account, %role, "Sign-in for unknown account");
        return Err(ChirpError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        debug!(account, %role, "Sign-in with wrong password");
        return Err(ChirpError::InvalidCredentials);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewUser;
    use chrono::Utc;

    // Minimum bcrypt cost keeps the tests fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter2", TEST_COST).unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn test_invalid_cost() {
        assert!(matches!(
            hash_password("pw", 2),
            Err(ChirpError::PasswordHash(_))
        ));
    }

    #[test]
    fn test_authenticate() {
        let storage = Storage::open_memory().unwrap();
        let new = NewUser {
            account: "alice".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: hash_password("secret", TEST_COST).unwrap(),
            role: Role::User,
        };
        let alice = storage.create_user(&new, Utc::now()).unwrap();

        let found = authenticate(&storage, "alice", "secret", Role::User).unwrap();
        assert_eq!(found.id, alice.id);
        assert!(matches!(
            authenticate(&storage, "alice", "wrong", Role::User),
            Err(ChirpError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&storage, "nobody", "secret", Role::User),
            Err(ChirpError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_authenticate_admin_only_through_admin_path() {
        let storage = Storage::open_memory().unwrap();
        let new = NewUser {
            account: "root".to_string(),
            name: "Root".to_string(),
            email: "root@example.com".to_string(),
            password_hash: hash_password("pw", TEST_COST).unwrap(),
            role: Role::Admin,
        };
        let root = storage.create_user(&new, Utc::now()).unwrap();

        let admin = authenticate(&storage, "root", "pw", Role::Admin).unwrap();
        assert_eq!(admin.id, root.id);
        assert_eq!(admin.role, Role::Admin);
        assert!(matches!(
            authenticate(&storage, "root", "pw", Role::User),
            Err(ChirpError::InvalidCredentials)
        ));
    }
}
