//! Registration, login and bearer-token verification.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::{JoinError, spawn_blocking};
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::users::{validate_password, validate_username};

const HASH_SCHEME: &str = "sha256";
const HASH_ROUNDS: usize = 10_000;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("username already taken")]
    UsernameTaken,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token could not be issued: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing task failed: {0}")]
    Hashing(#[from] JoinError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for AuthError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { .. } => AuthError::UsernameTaken,
            other => AuthError::Repo(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iss: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

/// A user plus a freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    config: Arc<TokenConfig>,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>, config: TokenConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            users,
            config: Arc::new(config),
            encoding,
            decoding,
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        validate_username(username)?;
        validate_password(password)?;

        let password = password.to_string();
        let password_hash = spawn_blocking(move || hash_password(&password)).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username: username.to_string(),
                password_hash,
            })
            .await?;

        info!(
            target = "listings::auth",
            user_id = %user.id,
            username = %user.username,
            "User registered"
        );

        let token = self.issue_token(&user)?;
        Ok(AuthSession { user, token })
    }

    /// Unknown usernames and wrong passwords fail identically.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password = password.to_string();
        let encoded = user.password_hash.clone();
        if !spawn_blocking(move || verify_password(&password, &encoded)).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(&user)?;
        Ok(AuthSession { user, token })
    }

    /// Resolve a bearer token to the caller's user id.
    pub fn verify_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| AuthError::InvalidToken)?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken)
    }

    fn issue_token(&self, user: &UserRecord) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = i64::try_from(self.config.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iss: self.config.issuer.clone(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }
}

/// `sha256$<salt hex>$<digest hex>` with a per-user random salt.
///
/// CPU-bound; async callers run it on the blocking pool.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().into_bytes();
    let digest = stretch(&salt, password);
    format!("{HASH_SCHEME}${}${}", hex::encode(salt), hex::encode(digest))
}

pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };

    let actual = stretch(&salt, password);
    actual.ct_eq(&expected).unwrap_u8() == 1
}

fn stretch(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize().to_vec();
    for _ in 1..HASH_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(&digest);
        hasher.update(salt);
        digest = hasher.finalize().to_vec();
    }
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemoryRepositories;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(InMemoryRepositories::new()),
            TokenConfig {
                secret: "unit-test-secret".to_string(),
                issuer: "listings".to_string(),
                ttl: Duration::from_secs(60),
            },
        )
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_and_login_hash_on_the_blocking_pool() {
        let auth = service();
        let session = auth
            .register("alice", "correct horse")
            .await
            .expect("register");

        let login = auth.login("alice", "correct horse").await.expect("login");
        assert_eq!(login.user.id, session.user.id);
        assert_eq!(
            auth.verify_token(&login.token).expect("token verifies"),
            session.user.id
        );

        assert!(matches!(
            auth.login("alice", "wrong horse").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "correct horse").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn password_round_trip_verifies() {
        let encoded = hash_password("correct horse");
        assert!(encoded.starts_with("sha256$"));
        assert!(verify_password("correct horse", &encoded));
        assert!(!verify_password("wrong horse", &encoded));
    }

    #[test]
    fn same_password_hashes_differently() {
        assert_ne!(hash_password("correct horse"), hash_password("correct horse"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "md5$00$00"));
        assert!(!verify_password("anything", "sha256$zz$zz"));
    }
}
