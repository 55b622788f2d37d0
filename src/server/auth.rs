//! In-memory account store and bearer-token sessions.
//!
//! Accounts exist for one reason: to produce the *owner identity* the
//! supervisor authorizes against. Passwords are stored as salted SHA-256
//! digests; a successful login mints a random hex bearer token that maps
//! back to the username for the lifetime of the process.
//!
//! Not a durable user database: state lives in memory and dies with the
//! daemon, same as the rest of the runtime. Sessions have no expiry; a
//! token stays valid until `logout` revokes it or the daemon restarts.

use std::collections::HashMap;
use std::sync::RwLock;

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Account/session failures surfaced by the API layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Registration with a username that already exists.
    #[error("username already taken")]
    UserExists,

    /// Login with an unknown username or a wrong password.
    #[error("invalid username or password")]
    BadCredentials,
}

impl AuthError {
    /// Stable snake_case label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            AuthError::UserExists => "user_exists",
            AuthError::BadCredentials => "bad_credentials",
        }
    }
}

struct Account {
    salt: [u8; 16],
    digest: [u8; 32],
}

/// Username/password registry plus the bearer-token session table.
#[derive(Default)]
pub struct AuthService {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<String, String>>,
}

impl AuthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an account. Usernames are unique and case-sensitive.
    pub fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let mut accounts = self.accounts.write().expect("auth lock poisoned");
        if accounts.contains_key(username) {
            return Err(AuthError::UserExists);
        }

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = hash_password(&salt, password);
        accounts.insert(username.to_string(), Account { salt, digest });
        Ok(())
    }

    /// Verifies credentials and mints a bearer token for the session.
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        {
            let accounts = self.accounts.read().expect("auth lock poisoned");
            let account = accounts.get(username).ok_or(AuthError::BadCredentials)?;
            if hash_password(&account.salt, password) != account.digest {
                return Err(AuthError::BadCredentials);
            }
        }

        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);
        self.sessions
            .write()
            .expect("auth lock poisoned")
            .insert(token.clone(), username.to_string());
        Ok(token)
    }

    /// Revokes a session token. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) {
        self.sessions
            .write()
            .expect("auth lock poisoned")
            .remove(token);
    }

    /// Resolves a bearer token to its owner identity, if the session exists.
    pub fn verify(&self, token: &str) -> Option<String> {
        self.sessions
            .read()
            .expect("auth lock poisoned")
            .get(token)
            .cloned()
    }
}

fn hash_password(salt: &[u8; 16], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_login_verify_round() {
        let auth = AuthService::new();
        auth.register("alice", "hunter2").unwrap();

        let token = auth.login("alice", "hunter2").unwrap();
        assert_eq!(auth.verify(&token).as_deref(), Some("alice"));
        assert_eq!(auth.verify("not-a-token"), None);
    }

    #[test]
    fn logout_revokes_the_session() {
        let auth = AuthService::new();
        auth.register("alice", "hunter2").unwrap();
        let token = auth.login("alice", "hunter2").unwrap();
        assert!(auth.verify(&token).is_some());

        auth.logout(&token);
        assert_eq!(auth.verify(&token), None);
        assert!(auth.sessions.read().unwrap().is_empty());

        // Other sessions are untouched.
        let second = auth.login("alice", "hunter2").unwrap();
        auth.logout("not-a-token");
        assert!(auth.verify(&second).is_some());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let auth = AuthService::new();
        auth.register("alice", "one").unwrap();
        assert!(matches!(
            auth.register("alice", "two"),
            Err(AuthError::UserExists)
        ));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let auth = AuthService::new();
        auth.register("alice", "hunter2").unwrap();
        assert!(matches!(
            auth.login("alice", "wrong"),
            Err(AuthError::BadCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "hunter2"),
            Err(AuthError::BadCredentials)
        ));
    }

    #[test]
    fn equal_passwords_get_distinct_digests() {
        let auth = AuthService::new();
        auth.register("alice", "same").unwrap();
        auth.register("bob", "same").unwrap();
        let accounts = auth.accounts.read().unwrap();
        assert_ne!(accounts["alice"].digest, accounts["bob"].digest);
    }
}
