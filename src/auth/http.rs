use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

use super::{check_credentials, hash_password, AuthError, AuthProvider, NewUser, User};

/// The local users JSON API (`GET`/`POST {base}/api/users`)
#[derive(Debug, Clone)]
pub struct HttpUsersApi {
    base: String,
    client: Client,
}

impl HttpUsersApi {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn users_url(&self) -> String {
        format!("{}/api/users", self.base.trim_end_matches('/'))
    }

    fn unavailable(&self, message: impl Into<String>) -> AuthError {
        AuthError::Unavailable {
            provider: self.name(),
            message: message.into(),
        }
    }

    fn check(&self, response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(self.unavailable(api_error(status, &body)))
    }
}

/// The `error` string of a JSON error body, else the status reason
fn api_error(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

impl AuthProvider for HttpUsersApi {
    fn name(&self) -> &'static str {
        "users API"
    }

    fn probe(&self) -> Result<(), AuthError> {
        let response = self
            .client
            .get(self.users_url())
            .send()
            .map_err(|e| self.unavailable(e.to_string()))?;
        self.check(response).map(|_| ())
    }

    fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = check_credentials(self.fetch_users()?, email, password)?;
        debug!(email = %user.email, "user authenticated");
        Ok(user)
    }

    fn fetch_users(&self) -> Result<Vec<User>, AuthError> {
        let response = self.client.get(self.users_url()).send()?;
        Ok(self.check(response)?.json()?)
    }

    fn create_user(&self, input: NewUser) -> Result<User, AuthError> {
        input.validate()?;
        let email = input.email.trim().to_string();
        let body = NewUser {
            name: input.name.trim().to_string(),
            email: email.clone(),
            password: if input.password.is_empty() {
                String::new()
            } else {
                hash_password(&input.password)
            },
            role: input.role_or_default(),
            active: input.active,
        };

        let response = self.client.post(self.users_url()).json(&body).send()?;
        if response.status() == StatusCode::CONFLICT {
            return Err(AuthError::DuplicateEmail(email));
        }
        let user: User = self.check(response)?.json()?;
        info!(email = %user.email, "user created");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_url() {
        assert_eq!(
            HttpUsersApi::new("http://localhost:3000/").users_url(),
            "http://localhost:3000/api/users"
        );
    }

    #[test]
    fn test_api_error() {
        assert_eq!(
            api_error(StatusCode::BAD_REQUEST, r#"{"error":"Missing name or email"}"#),
            "Missing name or email"
        );
        assert_eq!(
            api_error(StatusCode::METHOD_NOT_ALLOWED, ""),
            "Method Not Allowed"
        );
    }

    #[test]
    fn test_probe_unreachable() {
        let api = HttpUsersApi::new("http://127.0.0.1:9");
        assert!(matches!(
            api.probe(),
            Err(AuthError::Unavailable { .. })
        ));
    }
}
