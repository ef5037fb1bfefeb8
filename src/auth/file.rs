//! Pipe-delimited user file: `id|name|email|password|role|active|lastLoginAt`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{check_credentials, hash_password, AuthError, AuthProvider, NewUser, User};

#[derive(Debug, Clone)]
pub struct FileUserStore {
    path: PathBuf,
}

impl FileUserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(line: &str) -> Option<User> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 6 {
            return None;
        }
        let role = if parts[4].is_empty() {
            super::DEFAULT_ROLE.to_string()
        } else {
            parts[4].to_string()
        };
        Some(User {
            id: parts[0].to_string(),
            name: parts[1].to_string(),
            email: parts[2].to_string(),
            password: parts[3].to_string(),
            role,
            active: parts[5] == "true",
            last_login_at: parts.get(6).and_then(|s| s.trim().parse().ok()).unwrap_or(0),
        })
    }

    fn to_line(user: &User) -> String {
        [
            user.id.as_str(),
            user.name.as_str(),
            user.email.as_str(),
            user.password.as_str(),
            user.role.as_str(),
            if user.active { "true" } else { "false" },
            &user.last_login_at.to_string(),
        ]
        .join("|")
    }

    fn read_users(&self) -> Result<Vec<User>, AuthError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(Self::parse_line)
            .collect())
    }

    fn write_users(&self, users: &[User]) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content: String = users
            .iter()
            .map(|u| Self::to_line(u) + "\n")
            .collect();
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl AuthProvider for FileUserStore {
    fn name(&self) -> &'static str {
        "user file"
    }

    fn probe(&self) -> Result<(), AuthError> {
        let dir_exists = self
            .path
            .parent()
            .map(|p| p.as_os_str().is_empty() || p.is_dir())
            .unwrap_or(true);
        if self.path.is_file() || dir_exists {
            Ok(())
        } else {
            Err(AuthError::Unavailable {
                provider: self.name(),
                message: format!("{} is not reachable", self.path.display()),
            })
        }
    }

    /// Verify the password and stamp the login time
    fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let mut users = self.read_users()?;
        let mut user = check_credentials(users.clone(), email, password)?;
        user.last_login_at = chrono::Utc::now().timestamp_millis();
        if let Some(stored) = users.iter_mut().find(|u| u.id == user.id) {
            stored.last_login_at = user.last_login_at;
        }
        self.write_users(&users)?;
        debug!(email = %user.email, "user authenticated");
        Ok(user)
    }

    fn fetch_users(&self) -> Result<Vec<User>, AuthError> {
        self.read_users()
    }

    fn create_user(&self, input: NewUser) -> Result<User, AuthError> {
        input.validate()?;
        let mut users = self.read_users()?;
        let email = input.email.trim();
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AuthError::DuplicateEmail(email.to_string()));
        }

        let password = if input.password.is_empty() {
            String::new()
        } else {
            hash_password(&input.password)
        };
        let user = User {
            id: ulid::Ulid::new().to_string(),
            name: input.name.trim().to_string(),
            email: email.to_string(),
            password,
            role: input.role_or_default(),
            active: input.active,
            last_login_at: 0,
        };
        users.push(user.clone());
        self.write_users(&users)?;
        info!(email = %user.email, "user created");
        Ok(user)
    }
}
