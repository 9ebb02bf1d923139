use crate::database::models::ProfileRecord;
use crate::database::repositories::{ProfileRepository, SqliteRepositories, UserRepository};
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::now_utc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_DISPLAY_NAME_LENGTH: usize = 100;
const MAX_BIO_LENGTH: usize = 500;

#[derive(Clone)]
pub struct ProfileService {
    database: Database,
}

impl ProfileService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Returns the profile for `user_id`, inserting an empty one if the user
    /// has never saved theirs.
    pub fn get_or_create(&self, user_id: &str) -> ServiceResult<ProfileView> {
        self.database.with_repositories(|repos| {
            let Some(user) = repos.users().get(user_id)? else {
                anyhow::bail!(ServiceError::not_found(format!("user {user_id}")));
            };
            let profile = load_or_insert(&repos, &user.id)?;
            Ok(ProfileView::from_record(user.username, profile))
        })
        .map_err(ServiceError::from)
    }

    /// Loads a user's profile by username, creating an empty one on first
    /// access.
    pub fn view_profile(&self, username: &str) -> ServiceResult<ProfileView> {
        self.database.with_repositories(|repos| {
            let Some(user) = repos.users().get_by_username(username)? else {
                anyhow::bail!(ServiceError::not_found(format!("user {username}")));
            };
            let profile = load_or_insert(&repos, &user.id)?;
            Ok(ProfileView::from_record(user.username, profile))
        })
        .map_err(ServiceError::from)
    }

    pub fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> ServiceResult<ProfileView> {
        let display_name = normalize(input.display_name);
        let bio = normalize(input.bio);
        if display_name
            .as_deref()
            .is_some_and(|name| name.chars().count() > MAX_DISPLAY_NAME_LENGTH)
        {
            return Err(ServiceError::validation(format!(
                "display name may not exceed {MAX_DISPLAY_NAME_LENGTH} characters"
            )));
        }
        if bio
            .as_deref()
            .is_some_and(|bio| bio.chars().count() > MAX_BIO_LENGTH)
        {
            return Err(ServiceError::validation(format!(
                "bio may not exceed {MAX_BIO_LENGTH} characters"
            )));
        }

        let view = self.database.with_repositories(|repos| {
            let Some(user) = repos.users().get(user_id)? else {
                anyhow::bail!(ServiceError::not_found(format!("user {user_id}")));
            };
            let record = ProfileRecord {
                user_id: user.id.clone(),
                display_name,
                bio,
                updated_at: Some(now_utc()),
            };
            repos.profiles().upsert(&record)?;
            Ok(ProfileView::from_record(user.username, record))
        })?;
        tracing::info!(user_id, "profile updated");
        Ok(view)
    }
}

fn load_or_insert(repos: &SqliteRepositories<'_>, user_id: &str) -> anyhow::Result<ProfileRecord> {
    if let Some(profile) = repos.profiles().get(user_id)? {
        return Ok(profile);
    }
    let profile = ProfileRecord {
        user_id: user_id.to_string(),
        display_name: None,
        bio: None,
        updated_at: None,
    };
    repos.profiles().upsert(&profile)?;
    Ok(profile)
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileInput {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileView {
    fn from_record(username: String, record: ProfileRecord) -> Self {
        Self {
            user_id: record.user_id,
            username,
            display_name: record.display_name,
            bio: record.bio,
            updated_at: record.updated_at,
        }
    }
}
