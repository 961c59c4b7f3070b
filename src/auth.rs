//! Login credentials and bearer tokens.
//!
//! Credentials live behind [`CredentialVerifier`] so a real secret store can
//! replace the in-process table without touching the handlers. Tokens are
//! HS256 JSON Web Tokens signed with the server secret.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Malformed token")]
    MalformedToken,
    #[error("Token signature mismatch")]
    BadSignature,
    #[error("Token has expired")]
    Expired,
    #[error("Signing key rejected")]
    InvalidKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, secret: &str) -> Result<Principal, AuthError>;
}

struct StoredSecret {
    salt: [u8; SALT_LEN],
    digest: [u8; 32],
}

/// Fixed username/password table, each password kept only as a salted SHA-256 digest.
pub struct StaticCredentials {
    users: HashMap<String, StoredSecret>,
}

impl StaticCredentials {
    pub fn from_pairs<I, U, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: AsRef<str>,
    {
        let mut rng = rand::thread_rng();
        let users = pairs
            .into_iter()
            .map(|(user, password)| {
                let mut salt = [0u8; SALT_LEN];
                rng.fill_bytes(&mut salt);
                let digest = salted_digest(&salt, password.as_ref());
                (user.into(), StoredSecret { salt, digest })
            })
            .collect();
        Self { users }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, secret: &str) -> Result<Principal, AuthError> {
        let stored = self
            .users
            .get(username)
            .ok_or(AuthError::InvalidCredentials)?;
        let candidate = salted_digest(&stored.salt, secret);
        if constant_time_eq(&candidate, &stored.digest) {
            Ok(Principal {
                username: username.to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenIssuer {
    mac: HmacSha256,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, AuthError> {
        let mac = HmacSha256::new_from_slice(secret.as_ref()).map_err(|_| AuthError::InvalidKey)?;
        Ok(Self { mac, ttl })
    }

    pub fn issue(&self, principal: &Principal, now: DateTime<Utc>) -> String {
        let claims = Claims {
            sub: principal.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        // Serializing a struct of strings and integers cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(JWT_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));
        format!("{signing_input}.{signature}")
    }

    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::MalformedToken)?;
        let mut mac = self.mac.clone();
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::MalformedToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::MalformedToken)?;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn table() -> StaticCredentials {
        StaticCredentials::from_pairs([("driver1", "password123"), ("admin", "admin2025")])
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn known_user_with_right_password_verifies() {
        let principal = table().verify("driver1", "password123").unwrap();
        assert_eq!(principal.username, "driver1");
        assert!(table().verify("admin", "admin2025").is_ok());
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() {
        let creds = table();
        assert_eq!(
            creds.verify("driver1", "password124"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            creds.verify("nobody", "password123"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(creds.verify("driver1", ""), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let creds = StaticCredentials::from_pairs([("a", "same"), ("b", "same")]);
        let a = &creds.users["a"];
        let b = &creds.users["b"];
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn issued_token_round_trips_until_expiry() {
        let issuer = TokenIssuer::new("test-secret", Duration::seconds(900)).unwrap();
        let principal = Principal {
            username: "driver1".to_string(),
        };
        let token = issuer.issue(&principal, at(1_000));
        assert_eq!(token.split('.').count(), 3);

        let claims = issuer.validate(&token, at(1_899)).unwrap();
        assert_eq!(claims.sub, "driver1");
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_900);

        assert_eq!(issuer.validate(&token, at(1_900)), Err(AuthError::Expired));
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let issuer = TokenIssuer::new("test-secret", Duration::seconds(900)).unwrap();
        let principal = Principal {
            username: "driver1".to_string(),
        };
        let token = issuer.issue(&principal, at(1_000));

        let other = TokenIssuer::new("another-secret", Duration::seconds(900)).unwrap();
        assert_eq!(other.validate(&token, at(1_001)), Err(AuthError::BadSignature));

        let forged_claims = URL_SAFE_NO_PAD.encode(r#"{"sub":"admin","iat":1000,"exp":99999}"#);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert_eq!(issuer.validate(&forged, at(1_001)), Err(AuthError::BadSignature));

        assert_eq!(issuer.validate("abc", at(1_001)), Err(AuthError::MalformedToken));
        assert_eq!(
            issuer.validate("a.b.c.d", at(1_001)),
            Err(AuthError::MalformedToken)
        );
        assert_eq!(
            issuer.validate("a.b.!!!", at(1_001)),
            Err(AuthError::MalformedToken)
        );
    }
}
