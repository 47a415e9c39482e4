//! Registration, password login and cookie sessions.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::forms::{
    FormErrors, LoginSubmission, NON_FIELD, REQUIRED, SignupSubmission,
};
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::users;

pub const SESSION_COOKIE: &str = "yatube_session";
const TOKEN_PREFIX: &str = "sid";
const MIN_SECRET_LEN: usize = 32;

pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

/// The authenticated user attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
}

impl From<&UserRecord> for CurrentUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
        }
    }
}

/// A freshly created session; `token` is only ever shown to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub user: CurrentUser,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("submitted form is invalid")]
    Invalid(FormErrors),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub async fn signup(&self, form: &SignupSubmission) -> Result<UserRecord, AccountError> {
        let mut errors = FormErrors::new();
        let username = form.username.trim();
        let email = form.email.trim();

        if let Err(err) = users::validate_username(username) {
            errors.add_domain(err);
        } else if self.users.find_by_username(username).await?.is_some() {
            errors.add("username", DUPLICATE_USERNAME);
        }
        if let Err(err) = users::validate_email(email) {
            errors.add_domain(err);
        }

        if form.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if form.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if form.password1 != form.password2 {
            errors.add("password2", PASSWORD_MISMATCH);
        } else if let Err(err) = users::validate_password(&form.password1) {
            errors.add_domain(err);
        }

        if !errors.is_empty() {
            return Err(AccountError::Invalid(errors));
        }

        let password_hash = hash_password(form.password1.clone()).await?;
        let params = CreateUserParams {
            username: username.to_string(),
            email: email.to_string(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            password_hash,
        };

        match self.users.create_user(params).await {
            Ok(user) => {
                info!(
                    target = "yatube::accounts",
                    user_id = %user.id,
                    username = %user.username,
                    "user registered"
                );
                Ok(user)
            }
            Err(RepoError::Duplicate { .. }) => {
                let mut errors = FormErrors::new();
                errors.add("username", DUPLICATE_USERNAME);
                Err(AccountError::Invalid(errors))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn login(&self, form: &LoginSubmission) -> Result<IssuedSession, AccountError> {
        let mut errors = FormErrors::new();
        let username = form.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        }
        if form.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        if !errors.is_empty() {
            return Err(AccountError::Invalid(errors));
        }

        let Some(user) = self.users.find_by_username(username).await? else {
            // Spend the same Argon2 work as a real verification.
            let _ = hash_password(form.password.clone()).await;
            return Err(AccountError::InvalidCredentials);
        };

        if !verify_password(form.password.clone(), user.password_hash.clone()).await? {
            return Err(AccountError::InvalidCredentials);
        }

        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            if let Err(err) = sessions.delete_expired(OffsetDateTime::now_utc()).await {
                warn!(target = "yatube::accounts", error = %err, "failed to prune expired sessions");
            }
        });

        self.start_session(&user).await
    }

    /// Issue a session for `user` without checking a password.
    pub async fn start_session(&self, user: &UserRecord) -> Result<IssuedSession, AccountError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix: prefix.clone(),
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        Ok(IssuedSession {
            token: format!("{TOKEN_PREFIX}_{prefix}_{secret}"),
            expires_at,
            user: CurrentUser::from(user),
        })
    }

    /// Resolve a cookie token to its user. Unknown, expired or forged tokens
    /// resolve to `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<CurrentUser>, AccountError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(None);
        };
        let Some(record) = self.sessions.find_by_prefix(&parsed.prefix).await? else {
            return Ok(None);
        };

        if record.expires_at <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        let hashed_input = hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Ok(None);
        }

        let user = self.users.find_by_id(record.user_id).await?;
        Ok(user.as_ref().map(CurrentUser::from))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_by_prefix(&parsed.prefix).await?;
        }
        Ok(())
    }
}

impl AccountError {
    /// Field errors to show when the login form is re-rendered.
    pub fn login_errors(&self) -> Option<FormErrors> {
        match self {
            AccountError::Invalid(errors) => Some(errors.clone()),
            AccountError::InvalidCredentials => {
                let mut errors = FormErrors::new();
                errors.add(NON_FIELD, INVALID_LOGIN);
                Some(errors)
            }
            _ => None,
        }
    }
}

async fn hash_password(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AccountError::Hashing(err.to_string()))
    })
    .await
    .map_err(|err| AccountError::Hashing(err.to_string()))?
}

async fn verify_password(password: String, password_hash: String) -> Result<bool, AccountError> {
    // Accounts created without a password carry an unusable marker.
    if password_hash.starts_with('!') {
        return Ok(false);
    }

    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|err| AccountError::Hashing(err.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AccountError::Hashing(err.to_string())),
        }
    })
    .await
    .map_err(|err| AccountError::Hashing(err.to_string()))?
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip_through_parser() {
        let token = format!("sid_{}_{}", generate_prefix(), generate_secret());
        let parsed = parse_token(&token).expect("parses");
        assert_eq!(parsed.prefix.len(), 12);
        assert_eq!(parsed.secret.len(), 64);
    }

    #[test]
    fn malformed_tokens_are_ignored() {
        assert!(parse_token("").is_none());
        assert!(parse_token("sid_abc").is_none());
        assert!(parse_token("key_abc_0123456789abcdef0123456789abcdef").is_none());
        assert!(parse_token("sid_abc_short").is_none());
    }

    #[tokio::test]
    async fn passwords_hash_and_verify() {
        let hash = hash_password("!QAZ2wsx".to_string()).await.expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(
            verify_password("!QAZ2wsx".to_string(), hash.clone())
                .await
                .expect("verify")
        );
        assert!(
            !verify_password("wrong-password".to_string(), hash)
                .await
                .expect("verify")
        );
    }

    #[tokio::test]
    async fn unusable_hash_never_verifies() {
        assert!(
            !verify_password("anything".to_string(), "!".to_string())
                .await
                .expect("verify")
        );
    }
}
