//! Authentication provider client
//!
//! HTTP client for the hosted authentication service. The provider's
//! protocol is not ours to define; this module wraps its endpoints and
//! surfaces its rejection messages verbatim as [`AuthError::Failure`].
//!
//! Credentials are normalized before they leave the process: emails are
//! trimmed and lowercased, and smart-quote/dash punctuation in passwords is
//! mapped to plain ASCII. Mobile keyboards autocorrect straight quotes into
//! curly ones, so without this a password typed on a phone never matches
//! the one typed on a laptop.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Replace smart quotes and typographic dashes with ASCII equivalents
pub fn normalize_password(password: &str) -> String {
    password
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect()
}

/// Configuration for the auth provider client
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the auth service
    pub base_url: String,
    /// Service API key sent with every request
    pub api_key: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9999".to_string(),
            api_key: String::new(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Errors from the auth collaborator
#[derive(Error, Debug)]
pub enum AuthError {
    /// Credential or token rejection, message verbatim from the provider
    #[error("authentication failed: {0}")]
    Failure(String),

    /// Provider did not answer in time
    #[error("auth service timed out")]
    Timeout,

    /// Provider is unreachable
    #[error("auth service unavailable")]
    Unavailable,

    /// Transport-level error
    #[error("auth request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// An authenticated user as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

/// A provider session: token plus the user it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

#[derive(Serialize)]
struct CredentialsBody {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct EmailBody {
    email: String,
}

#[derive(Serialize)]
struct VerifyBody {
    token: String,
    #[serde(rename = "type")]
    token_type: String,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(alias = "error_description", alias = "msg", alias = "message")]
    error: Option<String>,
}

/// HTTP client for the auth provider
pub struct AuthClient {
    client: Client,
    config: AuthConfig,
}

impl AuthClient {
    /// Create a client with the given configuration
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = CredentialsBody {
            email: normalize_email(email),
            password: normalize_password(password),
        };
        self.post_json("/token?grant_type=password", &body, None)
            .await
    }

    /// Create a new account
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = CredentialsBody {
            email: normalize_email(email),
            password: normalize_password(password),
        };
        self.post_json("/signup", &body, None).await
    }

    /// Invalidate a session token
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/logout", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(classify)?;
        self.check(response).await?;
        Ok(())
    }

    /// Fetch the user behind a session token
    pub async fn session(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let url = format!("{}/user", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(classify)?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    /// Ask the provider to email a password-reset link
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let body = EmailBody {
            email: normalize_email(email),
        };
        let url = format!("{}/recover", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify)?;
        self.check(response).await?;
        Ok(())
    }

    /// Exchange a one-time recovery token for a session
    pub async fn verify_recovery_token(&self, token: &str) -> Result<AuthSession, AuthError> {
        let body = VerifyBody {
            token: token.trim().to_string(),
            token_type: "recovery".to_string(),
        };
        self.post_json("/verify", &body, None).await
    }

    /// Admin: invite a user by email
    pub async fn invite_user(
        &self,
        email: &str,
        service_token: &str,
    ) -> Result<AuthUser, AuthError> {
        let body = EmailBody {
            email: normalize_email(email),
        };
        let url = format!("{}/invite", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(service_token)
            .json(&body)
            .send()
            .await
            .map_err(classify)?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    /// Admin: list registered users
    pub async fn list_users(&self, service_token: &str) -> Result<Vec<AuthUser>, AuthError> {
        let url = format!("{}/admin/users", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(service_token)
            .send()
            .await
            .map_err(classify)?;
        let response = self.check(response).await?;

        #[derive(Deserialize)]
        struct UserList {
            users: Vec<AuthUser>,
        }
        let list: UserList = response.json().await?;
        Ok(list.users)
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<T, AuthError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut request = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(classify)?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    /// Turn a non-success response into a verbatim provider failure
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = response
            .json::<ProviderError>()
            .await
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| format!("auth provider returned {}", status));
        Err(AuthError::Failure(message))
    }
}

fn classify(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else if e.is_connect() {
        AuthError::Unavailable
    } else {
        AuthError::Request(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_normalize_password_maps_smart_punctuation() {
        assert_eq!(normalize_password("it\u{2019}s"), "it's");
        assert_eq!(normalize_password("\u{201C}quoted\u{201D}"), "\"quoted\"");
        assert_eq!(normalize_password("a\u{2013}b\u{2014}c"), "a-b-c");
        // Plain ASCII passes through untouched
        assert_eq!(normalize_password("pa55-w'ord"), "pa55-w'ord");
    }

    #[test]
    fn test_password_whitespace_is_preserved() {
        // Only punctuation is normalized; a leading space may be deliberate
        assert_eq!(normalize_password(" secret "), " secret ");
    }
}
