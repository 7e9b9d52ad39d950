//! Access tokens for joining a room.
//!
//! The token backend answers `GET {endpoint}?room=..&name=..` with either
//! `{"url": .., "token": ..}` or `{"error": ..}`. The body decides the
//! outcome; the HTTP status is only used for the message when the body is
//! unreadable.

use async_trait::async_trait;
use log::{debug, info, warn};
use rand::Rng;
use reqwest::Client;
use room_core::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Refused { error: String },
    Granted { url: Option<String>, token: String },
}

/// Decode a token backend reply.
pub fn parse_token_response(body: &str) -> Result<Credentials, Error> {
    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| Error::Token(format!("unreadable token response: {}", e)))?;

    match response {
        TokenResponse::Refused { error } => Err(Error::Token(error)),
        TokenResponse::Granted { url, token } => {
            let url = url
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| Error::Token("token response has no server url".to_string()))?;
            if token.is_empty() {
                return Err(Error::Token("token response has an empty token".to_string()));
            }
            Ok(Credentials { url, token })
        }
    }
}

/// Name used when the user has not picked one: `user-` plus four hex digits.
pub fn random_participant_name() -> String {
    let suffix: u16 = rand::thread_rng().gen();
    format!("user-{:04x}", suffix)
}

#[cfg_attr(any(test, feature = "test_utils"), mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch(&self, room: &str, identity: &str) -> Result<Credentials, Error>;
}

#[async_trait]
impl<T: TokenProvider + ?Sized> TokenProvider for Box<T> {
    async fn fetch(&self, room: &str, identity: &str) -> Result<Credentials, Error> {
        (**self).fetch(room, identity).await
    }
}

/// Token backend reached over HTTP.
#[derive(Clone)]
pub struct HttpTokenProvider {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTokenProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch(&self, room: &str, identity: &str) -> Result<Credentials, Error> {
        debug!("Requesting token for {} in room {}", identity, room);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("room", room), ("name", identity)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Token(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Token(format!("failed to read token response: {}", e)))?;

        match parse_token_response(&body) {
            Ok(credentials) => {
                info!("Received token for {} (server {})", identity, credentials.url);
                Ok(credentials)
            }
            Err(e) if status.is_success() => Err(e),
            Err(Error::Token(detail)) if detail.starts_with("unreadable") => {
                warn!("Token backend returned {} with an unreadable body", status);
                Err(Error::Token(format!("token backend returned {}", status)))
            }
            Err(e) => Err(e),
        }
    }
}

/// Fixed credentials, for offline and simulated sessions.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    credentials: Credentials,
}

impl StaticTokenProvider {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            credentials: Credentials {
                url: url.into(),
                token: token.into(),
            },
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch(&self, room: &str, identity: &str) -> Result<Credentials, Error> {
        debug!("Using static credentials for {} in room {}", identity, room);
        Ok(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granted_response() {
        let credentials =
            parse_token_response(r#"{"token": "abc.def", "url": "wss://media.example"}"#).unwrap();
        assert_eq!(credentials.url, "wss://media.example");
        assert_eq!(credentials.token, "abc.def");
    }

    #[test]
    fn error_response_becomes_token_error() {
        let err = parse_token_response(r#"{"error": "quota exceeded"}"#).unwrap_err();
        match err {
            Error::Token(detail) => assert_eq!(detail, "quota exceeded"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn missing_url_is_rejected() {
        assert!(matches!(
            parse_token_response(r#"{"token": "abc", "url": null}"#),
            Err(Error::Token(_))
        ));
        assert!(matches!(
            parse_token_response(r#"{"token": "abc"}"#),
            Err(Error::Token(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_token_response("<html>502</html>"),
            Err(Error::Token(_))
        ));
    }

    #[test]
    fn random_names_look_generated() {
        let name = random_participant_name();
        assert!(name.starts_with("user-"));
        assert_eq!(name.len(), 9);
        assert!(name[5..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn static_provider_returns_its_credentials() {
        let provider = StaticTokenProvider::new("sim://local", "t0k3n");
        let credentials = provider.fetch("room", "me").await.unwrap();
        assert_eq!(credentials.url, "sim://local");
        assert_eq!(credentials.token, "t0k3n");
    }

    #[tokio::test]
    async fn boxed_provider_delegates() {
        let provider: Box<dyn TokenProvider> =
            Box::new(StaticTokenProvider::new("sim://local", "abc"));
        assert_eq!(provider.fetch("room", "me").await.unwrap().token, "abc");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_token_error() {
        let provider =
            HttpTokenProvider::new("http://127.0.0.1:9/token").with_timeout(Duration::from_secs(2));
        let err = provider.fetch("room", "me").await.unwrap_err();
        assert!(matches!(err, Error::Token(_)));
    }
}
