use crate::config::AuthConfig;
use crate::database::models::{SessionRecord, UserRecord};
use crate::database::repositories::{SessionRepository, UserRepository};
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::now_utc;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 150;
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone)]
pub struct UserService {
    database: Database,
    auth: AuthConfig,
}

impl UserService {
    pub fn new(database: Database, auth: AuthConfig) -> Self {
        Self { database, auth }
    }

    pub fn register(&self, input: RegisterInput) -> ServiceResult<UserView> {
        let username = input.username.trim().to_string();
        validate_username(&username)?;
        if input.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ServiceError::validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        if input.password != input.password_confirmation {
            return Err(ServiceError::validation("passwords do not match"));
        }
        let email = input
            .email
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());
        if let Some(email) = email.as_deref() {
            if !email.contains('@') {
                return Err(ServiceError::validation("email address is malformed"));
            }
        }

        let password_hash =
            bcrypt::hash(&input.password, self.auth.bcrypt_cost).context("failed to hash password")?;
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            created_at: now_utc(),
        };

        self.database.with_transaction(|repos| {
            if repos.users().get_by_username(&record.username)?.is_some() {
                anyhow::bail!(ServiceError::Conflict(format!(
                    "username {} is already taken",
                    record.username
                )));
            }
            repos.users().create(&record)
        })?;

        tracing::info!(user_id = %record.id, username = %record.username, "account created");
        Ok(UserView::from_record(record))
    }

    /// Checks credentials and opens a new session.
    pub fn login(&self, input: LoginInput) -> ServiceResult<SessionView> {
        let user = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(input.username.trim()))?;
        let Some(user) = user else {
            return Err(ServiceError::Unauthorized);
        };
        let valid = bcrypt::verify(&input.password, &user.password_hash)
            .context("failed to verify password hash")?;
        if !valid {
            tracing::debug!(username = %user.username, "rejected login with wrong password");
            return Err(ServiceError::Unauthorized);
        }

        let created_at = now_utc();
        let session = SessionRecord {
            token: Uuid::new_v4().simple().to_string(),
            user_id: user.id.clone(),
            created_at,
            expires_at: created_at + Duration::hours(self.auth.session_ttl_hours),
        };
        self.database.with_repositories(|repos| {
            let purged = repos.sessions().delete_expired(created_at)?;
            if purged > 0 {
                tracing::debug!(purged, "removed expired sessions");
            }
            repos.sessions().create(&session)
        })?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(SessionView {
            token: session.token,
            expires_at: session.expires_at,
            user: UserView::from_record(user),
        })
    }

    pub fn logout(&self, token: &str) -> ServiceResult<()> {
        let removed = self
            .database
            .with_repositories(|repos| repos.sessions().delete(token))?;
        if removed {
            tracing::info!("session closed");
        }
        Ok(())
    }

    /// Resolves a session token to its user.
    pub fn authenticate(&self, token: &str) -> ServiceResult<UserView> {
        let now = now_utc();
        let user = self.database.with_repositories(|repos| {
            let Some(session) = repos.sessions().get(token)? else {
                return Ok(None);
            };
            if session.expires_at <= now {
                repos.sessions().delete(token)?;
                return Ok(None);
            }
            repos.users().get(&session.user_id)
        })?;
        user.map(UserView::from_record)
            .ok_or(ServiceError::Unauthorized)
    }
}

fn validate_username(username: &str) -> ServiceResult<()> {
    let length = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&length) {
        return Err(ServiceError::validation(format!(
            "username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !username.chars().all(allowed) {
        return Err(ServiceError::validation(
            "username may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Public view of an account; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserView {
    pub(crate) fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}
