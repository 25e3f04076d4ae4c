//! Registry credentials and the per-call authentication token
//!
//! The container engine expects credentials as a base64url encoded JSON record in the
//! `X-Registry-Auth` header. Tokens are rebuilt for every push or pull so a credential
//! change is always picked up.

use crate::error::Result;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use serde::Serialize;
use std::fmt;

/// Registry credentials, held in memory only
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub server: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server: server.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

#[derive(Serialize)]
struct AuthPayload<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    serveraddress: &'a str,
}

fn is_blank(value: &&str) -> bool {
    value.is_empty()
}

/// Opaque, transport-safe credential blob
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// The empty token; the only way to request anonymous access
    pub fn anonymous() -> Self {
        Self(String::new())
    }

    /// Encode credentials into a token
    pub fn encode(credentials: &Credentials) -> Result<Self> {
        if credentials.is_anonymous() {
            return Ok(Self::anonymous());
        }
        let payload = AuthPayload {
            username: &credentials.username,
            password: &credentials.password,
            serveraddress: &credentials.server,
        };
        let json = serde_json::to_vec(&payload)?;
        Ok(Self(URL_SAFE.encode(json)))
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            write!(f, "AuthToken(anonymous)")
        } else {
            write!(f, "AuthToken(<{} chars>)", self.0.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(token: &AuthToken) -> serde_json::Value {
        let bytes = URL_SAFE.decode(token.as_str()).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_token_carries_all_fields() {
        let creds = Credentials::new("alice", "s3cr3t", "registry.example.com");
        let token = AuthToken::encode(&creds).unwrap();
        let value = decode(&token);

        assert_eq!(value["username"], "alice");
        assert_eq!(value["password"], "s3cr3t");
        assert_eq!(value["serveraddress"], "registry.example.com");
    }

    #[test]
    fn test_token_is_url_safe() {
        // Characters that produce '+' and '/' in standard base64
        let creds = Credentials::new("user>>>", "???~~~", "docker.io");
        let token = AuthToken::encode(&creds).unwrap();
        assert!(!token.as_str().contains('+'));
        assert!(!token.as_str().contains('/'));
    }

    #[test]
    fn test_empty_server_is_omitted() {
        let creds = Credentials::new("alice", "pw", "");
        let value = decode(&AuthToken::encode(&creds).unwrap());
        assert!(value.get("serveraddress").is_none());
    }

    #[test]
    fn test_anonymous_only_for_empty_credentials() {
        let anon = AuthToken::encode(&Credentials::default()).unwrap();
        assert!(anon.is_anonymous());
        assert_eq!(anon, AuthToken::anonymous());

        let named = AuthToken::encode(&Credentials::new("alice", "", "")).unwrap();
        assert!(!named.is_anonymous());
    }

    #[test]
    fn test_token_tracks_credential_changes() {
        let mut creds = Credentials::new("alice", "old", "docker.io");
        let first = AuthToken::encode(&creds).unwrap();
        creds.password = "new".to_string();
        let second = AuthToken::encode(&creds).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("alice", "s3cr3t", "docker.io");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("s3cr3t"));

        let token = AuthToken::encode(&creds).unwrap();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
