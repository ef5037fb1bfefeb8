//! User authentication providers
//!
//! Providers are ranked; [`AuthChain::select`] probes them in order and
//! settles on the first one that is reachable.

mod file;
mod http;

pub use file::FileUserStore;
pub use http::HttpUsersApi;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

/// Default role for new users
pub const DEFAULT_ROLE: &str = "user";

const HASH_SCHEME: &str = "sha256";

/// Errors raised by an authentication provider
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User '{0}' is inactive")]
    Inactive(String),

    #[error("User '{0}' already exists")]
    DuplicateEmail(String),

    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("{provider} is unavailable: {message}")]
    Unavailable {
        provider: &'static str,
        message: String,
    },

    #[error("No authentication provider is available")]
    NoProvider,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A user account as returned by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub active: bool,
    /// Milliseconds since the Unix epoch; 0 when never logged in
    #[serde(default)]
    pub last_login_at: i64,
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

/// Fields supplied when creating a user
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub active: bool,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::MissingField("name"));
        }
        if self.email.trim().is_empty() {
            return Err(AuthError::MissingField("email"));
        }
        Ok(())
    }

    pub fn role_or_default(&self) -> String {
        if self.role.trim().is_empty() {
            default_role()
        } else {
            self.role.trim().to_string()
        }
    }
}

/// A source of user accounts
pub trait AuthProvider {
    fn name(&self) -> &'static str;

    /// Cheap reachability check used when selecting a provider
    fn probe(&self) -> Result<(), AuthError>;

    fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError>;

    fn fetch_users(&self) -> Result<Vec<User>, AuthError>;

    fn create_user(&self, user: NewUser) -> Result<User, AuthError>;
}

/// Ranked list of providers
#[derive(Default)]
pub struct AuthChain {
    providers: Vec<Box<dyn AuthProvider>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, provider: impl AuthProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// The first provider whose probe succeeds
    pub fn select(&self) -> Result<&dyn AuthProvider, AuthError> {
        for provider in &self.providers {
            match provider.probe() {
                Ok(()) => {
                    info!(provider = provider.name(), "auth provider selected");
                    return Ok(provider.as_ref());
                }
                Err(e) => debug!(provider = provider.name(), error = %e, "auth provider skipped"),
            }
        }
        Err(AuthError::NoProvider)
    }
}

impl std::fmt::Debug for AuthChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthChain")
            .field("providers", &self.names())
            .finish()
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Salted SHA-256 in the form `sha256$<salt>$<hex>`
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let salt: String = salt.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}${}${}", HASH_SCHEME, salt, digest(&salt, password))
}

/// Check `password` against a stored value; unhashed legacy values compare verbatim
pub fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt), Some(hex)) => digest(salt, password) == hex,
        _ => !stored.is_empty() && stored == password,
    }
}

/// Shared credential check for providers that hand back full user rows
pub(crate) fn check_credentials(
    users: Vec<User>,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let email = email.trim();
    let user = users
        .into_iter()
        .find(|u| u.email.eq_ignore_ascii_case(email))
        .ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(&user.password, password) {
        return Err(AuthError::InvalidCredentials);
    }
    if !user.active {
        return Err(AuthError::Inactive(user.email));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fake {
        name: &'static str,
        up: bool,
        probes: Cell<u32>,
    }

    impl AuthProvider for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn probe(&self) -> Result<(), AuthError> {
            self.probes.set(self.probes.get() + 1);
            if self.up {
                Ok(())
            } else {
                Err(AuthError::Unavailable {
                    provider: self.name,
                    message: "down".to_string(),
                })
            }
        }

        fn authenticate(&self, _: &str, _: &str) -> Result<User, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        fn fetch_users(&self) -> Result<Vec<User>, AuthError> {
            Ok(Vec::new())
        }

        fn create_user(&self, _: NewUser) -> Result<User, AuthError> {
            Err(AuthError::NoProvider)
        }
    }

    fn fake(name: &'static str, up: bool) -> Fake {
        Fake {
            name,
            up,
            probes: Cell::new(0),
        }
    }

    #[test]
    fn test_chain_selects_first_reachable() {
        let chain = AuthChain::new()
            .with(fake("api", false))
            .with(fake("file", true))
            .with(fake("spare", true));
        assert_eq!(chain.select().unwrap().name(), "file");
    }

    #[test]
    fn test_chain_with_nothing_reachable() {
        let chain = AuthChain::new().with(fake("api", false));
        assert!(matches!(chain.select(), Err(AuthError::NoProvider)));
        assert!(matches!(AuthChain::new().select(), Err(AuthError::NoProvider)));
    }

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("s3cret");
        assert!(stored.starts_with("sha256$"));
        assert!(verify_password(&stored, "s3cret"));
        assert!(!verify_password(&stored, "S3cret"));
        assert_ne!(hash_password("s3cret"), stored);
    }

    #[test]
    fn test_legacy_plaintext() {
        assert!(verify_password("hunter2", "hunter2"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn test_user_json_hides_password() {
        let user = User {
            id: "1".to_string(),
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            password: "secret".to_string(),
            role: DEFAULT_ROLE.to_string(),
            active: true,
            last_login_at: 0,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("lastLoginAt"));
    }
}
