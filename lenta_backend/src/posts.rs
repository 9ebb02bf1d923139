use crate::comments::{CommentNode, CommentService};
use crate::database::models::{FavoriteRecord, LikeRecord, PostListingRecord, PostRecord};
use crate::database::repositories::{
    FavoriteRepository, LikeRepository, PostRepository, SqliteRepositories,
    UserRepository,
};
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::now_utc;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_TITLE_LENGTH: usize = 200;

#[derive(Clone)]
pub struct PostService {
    database: Database,
}

impl PostService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Home feed: every post, newest first.
    pub fn list_all(&self) -> ServiceResult<Vec<PostView>> {
        let listings = self
            .database
            .with_repositories(|repos| repos.posts().list_recent())?;
        Ok(listings.into_iter().map(PostView::from_listing).collect())
    }

    pub fn list_by_author(&self, author_id: &str) -> ServiceResult<Vec<PostView>> {
        let listings = self
            .database
            .with_repositories(|repos| repos.posts().list_by_author(author_id))?;
        Ok(listings.into_iter().map(PostView::from_listing).collect())
    }

    /// Posts the user favorited, most recently favorited first.
    pub fn list_favorites(&self, user_id: &str) -> ServiceResult<Vec<PostView>> {
        let listings = self
            .database
            .with_repositories(|repos| repos.posts().list_favorited_by(user_id))?;
        Ok(listings.into_iter().map(PostView::from_listing).collect())
    }

    pub fn create(&self, author_id: &str, input: PostInput) -> ServiceResult<PostView> {
        let (title, body) = validate_post(input)?;
        let record = PostRecord {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            title,
            body,
            created_at: now_utc(),
            updated_at: None,
        };

        let listing = self.database.with_repositories(|repos| {
            if repos.users().get(author_id)?.is_none() {
                anyhow::bail!(ServiceError::not_found(format!("user {author_id}")));
            }
            repos.posts().create(&record)?;
            repos
                .posts()
                .get_listing(&record.id)?
                .context("post creation lost newly inserted record")
        })?;

        tracing::info!(post_id = %record.id, author_id, "post created");
        Ok(PostView::from_listing(listing))
    }

    /// A single post with its reply tree. `viewer`, when given, fills in
    /// the `liked` and `favorited` flags.
    pub fn detail(&self, post_id: &str, viewer: Option<&str>) -> ServiceResult<PostDetails> {
        let (listing, liked, favorited) = self.database.with_repositories(|repos| {
            let Some(listing) = repos.posts().get_listing(post_id)? else {
                anyhow::bail!(ServiceError::not_found(format!("post {post_id}")));
            };
            let (liked, favorited) = match viewer {
                Some(user_id) => (
                    repos.likes().exists(user_id, post_id)?,
                    repos.favorites().exists(user_id, post_id)?,
                ),
                None => (false, false),
            };
            Ok((listing, liked, favorited))
        })?;

        let comments = CommentService::new(self.database.clone()).comment_tree(post_id)?;
        Ok(PostDetails {
            post: PostView::from_listing(listing),
            liked,
            favorited,
            comments,
        })
    }

    pub fn edit(&self, user_id: &str, post_id: &str, input: PostInput) -> ServiceResult<PostView> {
        let (title, body) = validate_post(input)?;
        let listing = self.database.with_repositories(|repos| {
            let mut record = load_owned_post(&repos, user_id, post_id, "edit")?;
            record.title = title;
            record.body = body;
            record.updated_at = Some(now_utc());
            repos.posts().update(&record)?;
            repos
                .posts()
                .get_listing(post_id)?
                .context("edited post disappeared")
        })?;
        tracing::info!(post_id, "post updated");
        Ok(PostView::from_listing(listing))
    }

    pub fn delete(&self, user_id: &str, post_id: &str) -> ServiceResult<()> {
        self.database.with_repositories(|repos| {
            let record = load_owned_post(&repos, user_id, post_id, "delete")?;
            repos.posts().delete(&record.id)?;
            Ok(())
        })?;
        tracing::info!(post_id, "post deleted");
        Ok(())
    }

    /// Likes the post, or removes the like if it already exists.
    pub fn toggle_like(&self, user_id: &str, post_id: &str) -> ServiceResult<ToggleOutcome> {
        let outcome = self.database.with_transaction(|repos| {
            if repos.posts().get(post_id)?.is_none() {
                anyhow::bail!(ServiceError::not_found(format!("post {post_id}")));
            }
            let active = if repos.likes().remove(user_id, post_id)? {
                false
            } else {
                repos.likes().add(&LikeRecord {
                    user_id: user_id.to_string(),
                    post_id: post_id.to_string(),
                    created_at: now_utc(),
                })?
            };
            let count = repos.likes().count_for_post(post_id)?;
            Ok(ToggleOutcome { active, count })
        })?;
        tracing::info!(post_id, user_id, liked = outcome.active, "like toggled");
        Ok(outcome)
    }

    /// Favorites the post, or unfavorites it. Authors cannot favorite their
    /// own posts.
    pub fn toggle_favorite(&self, user_id: &str, post_id: &str) -> ServiceResult<ToggleOutcome> {
        let outcome = self.database.with_transaction(|repos| {
            let Some(post) = repos.posts().get(post_id)? else {
                anyhow::bail!(ServiceError::not_found(format!("post {post_id}")));
            };
            if post.author_id == user_id {
                anyhow::bail!(ServiceError::forbidden("cannot favorite your own post"));
            }
            let active = if repos.favorites().remove(user_id, post_id)? {
                false
            } else {
                repos.favorites().add(&FavoriteRecord {
                    user_id: user_id.to_string(),
                    post_id: post_id.to_string(),
                    created_at: now_utc(),
                })?
            };
            let count = repos.favorites().count_for_post(post_id)?;
            Ok(ToggleOutcome { active, count })
        })?;
        tracing::info!(post_id, user_id, favorited = outcome.active, "favorite toggled");
        Ok(outcome)
    }
}

fn validate_post(input: PostInput) -> ServiceResult<(String, String)> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::validation("post title may not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ServiceError::validation(format!(
            "post title may not exceed {MAX_TITLE_LENGTH} characters"
        )));
    }
    if input.body.trim().is_empty() {
        return Err(ServiceError::validation("post body may not be empty"));
    }
    Ok((title, input.body))
}

fn load_owned_post(
    repos: &SqliteRepositories<'_>,
    user_id: &str,
    post_id: &str,
    action: &str,
) -> anyhow::Result<PostRecord> {
    let Some(record) = repos.posts().get(post_id)? else {
        anyhow::bail!(ServiceError::not_found(format!("post {post_id}")));
    };
    if record.author_id != user_id {
        anyhow::bail!(ServiceError::forbidden(format!(
            "only the author may {action} this post"
        )));
    }
    Ok(record)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub like_count: u64,
    pub comment_count: u64,
}

impl PostView {
    fn from_listing(listing: PostListingRecord) -> Self {
        let PostListingRecord {
            post,
            author_username,
            like_count,
            comment_count,
        } = listing;
        Self {
            id: post.id,
            author_id: post.author_id,
            author_username,
            title: post.title,
            body: post.body,
            created_at: post.created_at,
            updated_at: post.updated_at,
            like_count: like_count.max(0) as u64,
            comment_count: comment_count.max(0) as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetails {
    pub post: PostView,
    pub liked: bool,
    pub favorited: bool,
    pub comments: Vec<CommentNode>,
}

/// Result of a like or favorite toggle: whether the caller's mark is now set,
/// and how many users hold that mark on the post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub active: bool,
    pub count: usize,
}
