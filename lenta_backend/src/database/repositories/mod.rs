mod comments;
mod favorites;
mod likes;
mod messages;
mod posts;
mod profiles;
mod sessions;
mod users;

use super::models::{
    CommentRecord, CommentWithAuthorRecord, FavoriteRecord, LikeRecord, MessageRecord,
    PostListingRecord, PostRecord, ProfileRecord, SessionRecord, UserRecord,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
}

pub trait SessionRepository {
    fn create(&self, record: &SessionRecord) -> Result<()>;
    fn get(&self, token: &str) -> Result<Option<SessionRecord>>;
    fn delete(&self, token: &str) -> Result<bool>;
    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

pub trait ProfileRepository {
    fn get(&self, user_id: &str) -> Result<Option<ProfileRecord>>;
    fn upsert(&self, record: &ProfileRecord) -> Result<()>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    fn update(&self, record: &PostRecord) -> Result<()>;
    fn delete(&self, id: &str) -> Result<bool>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    fn get_listing(&self, id: &str) -> Result<Option<PostListingRecord>>;
    /// Every post, newest first.
    fn list_recent(&self) -> Result<Vec<PostListingRecord>>;
    fn list_by_author(&self, author_id: &str) -> Result<Vec<PostListingRecord>>;
    fn list_favorited_by(&self, user_id: &str) -> Result<Vec<PostListingRecord>>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<CommentRecord>>;
    /// Number of comments from `id` up to its root, inclusive, counting at
    /// most `limit`. Zero when `id` does not exist.
    fn chain_length(&self, id: &str, limit: usize) -> Result<usize>;
    /// Comments joined with their author, oldest first.
    fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentWithAuthorRecord>>;
}

pub trait LikeRepository {
    /// Returns false when the like already existed.
    fn add(&self, record: &LikeRecord) -> Result<bool>;
    fn remove(&self, user_id: &str, post_id: &str) -> Result<bool>;
    fn exists(&self, user_id: &str, post_id: &str) -> Result<bool>;
    fn count_for_post(&self, post_id: &str) -> Result<usize>;
}

pub trait FavoriteRepository {
    /// Returns false when the favorite already existed.
    fn add(&self, record: &FavoriteRecord) -> Result<bool>;
    fn remove(&self, user_id: &str, post_id: &str) -> Result<bool>;
    fn exists(&self, user_id: &str, post_id: &str) -> Result<bool>;
    fn count_for_post(&self, post_id: &str) -> Result<usize>;
}

pub trait MessageRepository {
    fn create(&self, record: &MessageRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<MessageRecord>>;
    /// Every message the user sent or received, oldest first.
    fn list_involving(&self, user_id: &str) -> Result<Vec<MessageRecord>>;
    /// Messages exchanged between two users in either direction, oldest first.
    fn list_between(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRecord>>;
    /// Flags the given messages read. Already-read rows are left alone and
    /// are not counted in the returned total.
    fn mark_read(&self, ids: &[String]) -> Result<usize>;
    fn count_unread(&self, recipient_id: &str) -> Result<usize>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn sessions(&self) -> impl SessionRepository + '_ {
        sessions::SqliteSessionRepository { conn: self.conn }
    }

    pub fn profiles(&self) -> impl ProfileRepository + '_ {
        profiles::SqliteProfileRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn likes(&self) -> impl LikeRepository + '_ {
        likes::SqliteLikeRepository { conn: self.conn }
    }

    pub fn favorites(&self) -> impl FavoriteRepository + '_ {
        favorites::SqliteFavoriteRepository { conn: self.conn }
    }

    pub fn messages(&self) -> impl MessageRepository + '_ {
        messages::SqliteMessageRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MIGRATIONS;
    use chrono::TimeZone;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("migrations");
        conn
    }

    fn at(offset_secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
    }

    fn user(id: &str, username: &str) -> UserRecord {
        UserRecord {
            id: id.into(),
            username: username.into(),
            email: None,
            password_hash: "hash".into(),
            created_at: at(0),
        }
    }

    fn post(id: &str, author_id: &str, offset_secs: i64) -> PostRecord {
        PostRecord {
            id: id.into(),
            author_id: author_id.into(),
            title: format!("title {id}"),
            body: "body".into(),
            created_at: at(offset_secs),
            updated_at: None,
        }
    }

    fn message(id: &str, from: &str, to: &str, offset_secs: i64) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            sender_id: from.into(),
            recipient_id: to.into(),
            body: format!("msg {id}"),
            created_at: at(offset_secs),
            is_read: false,
        }
    }

    #[test]
    fn user_and_session_repositories_work() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);

        repos.users().create(&user("u1", "alice")).unwrap();
        let fetched = repos.users().get_by_username("alice").unwrap().unwrap();
        assert_eq!(fetched.id, "u1");
        assert!(repos.users().get_by_username("bob").unwrap().is_none());

        let session = SessionRecord {
            token: "tok".into(),
            user_id: "u1".into(),
            created_at: at(0),
            expires_at: at(60),
        };
        repos.sessions().create(&session).unwrap();
        assert_eq!(repos.sessions().get("tok").unwrap().unwrap().user_id, "u1");
        assert_eq!(repos.sessions().delete_expired(at(30)).unwrap(), 0);
        assert_eq!(repos.sessions().delete_expired(at(61)).unwrap(), 1);
        assert!(!repos.sessions().delete("tok").unwrap());
    }

    #[test]
    fn post_listings_carry_counts() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice")).unwrap();
        repos.users().create(&user("u2", "bob")).unwrap();
        repos.posts().create(&post("p1", "u1", 1)).unwrap();
        repos.posts().create(&post("p2", "u1", 2)).unwrap();

        assert!(repos
            .likes()
            .add(&LikeRecord {
                user_id: "u2".into(),
                post_id: "p1".into(),
                created_at: at(3),
            })
            .unwrap());
        repos
            .comments()
            .create(&CommentRecord {
                id: "c1".into(),
                post_id: "p1".into(),
                parent_id: None,
                author_id: "u2".into(),
                body: "nice".into(),
                created_at: at(4),
            })
            .unwrap();

        let recent = repos.posts().list_recent().unwrap();
        assert_eq!(
            recent.iter().map(|l| l.post.id.as_str()).collect::<Vec<_>>(),
            vec!["p2", "p1"]
        );
        let p1 = repos.posts().get_listing("p1").unwrap().unwrap();
        assert_eq!(p1.author_username, "alice");
        assert_eq!(p1.like_count, 1);
        assert_eq!(p1.comment_count, 1);
    }

    #[test]
    fn deleting_post_cascades_to_comments_and_likes() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice")).unwrap();
        repos.posts().create(&post("p1", "u1", 1)).unwrap();
        repos
            .favorites()
            .add(&FavoriteRecord {
                user_id: "u1".into(),
                post_id: "p1".into(),
                created_at: at(2),
            })
            .unwrap();
        assert!(repos.favorites().exists("u1", "p1").unwrap());

        assert!(repos.posts().delete("p1").unwrap());
        assert!(!repos.favorites().exists("u1", "p1").unwrap());
        assert!(repos.posts().get("p1").unwrap().is_none());
    }

    #[test]
    fn comments_are_listed_oldest_first_with_author() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice")).unwrap();
        repos.posts().create(&post("p1", "u1", 0)).unwrap();
        for (id, offset) in [("c2", 20), ("c1", 10), ("c3", 30)] {
            repos
                .comments()
                .create(&CommentRecord {
                    id: id.into(),
                    post_id: "p1".into(),
                    parent_id: None,
                    author_id: "u1".into(),
                    body: id.into(),
                    created_at: at(offset),
                })
                .unwrap();
        }

        let listed = repos.comments().list_for_post("p1").unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.comment.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(listed[0].author_username, "alice");
    }

    #[test]
    fn chain_length_walks_parents_up_to_limit() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice")).unwrap();
        repos.posts().create(&post("p1", "u1", 0)).unwrap();
        let mut parent: Option<String> = None;
        for depth in 0..5 {
            let id = format!("c{depth}");
            repos
                .comments()
                .create(&CommentRecord {
                    id: id.clone(),
                    post_id: "p1".into(),
                    parent_id: parent.clone(),
                    author_id: "u1".into(),
                    body: "x".into(),
                    created_at: at(depth),
                })
                .unwrap();
            parent = Some(id);
        }

        assert_eq!(repos.comments().chain_length("c0", 10).unwrap(), 1);
        assert_eq!(repos.comments().chain_length("c4", 10).unwrap(), 5);
        assert_eq!(repos.comments().chain_length("c4", 3).unwrap(), 3);
        assert_eq!(repos.comments().chain_length("missing", 10).unwrap(), 0);
    }

    #[test]
    fn message_queries_filter_by_participants() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
            repos.users().create(&user(id, name)).unwrap();
        }
        repos.messages().create(&message("m1", "u1", "u2", 1)).unwrap();
        repos.messages().create(&message("m2", "u2", "u1", 2)).unwrap();
        repos.messages().create(&message("m3", "u3", "u1", 3)).unwrap();
        repos.messages().create(&message("m4", "u2", "u3", 4)).unwrap();

        assert_eq!(repos.messages().list_involving("u1").unwrap().len(), 3);
        let between = repos.messages().list_between("u2", "u1").unwrap();
        assert_eq!(
            between.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["m1", "m2"]
        );

        assert_eq!(repos.messages().count_unread("u1").unwrap(), 2);
        let marked = repos
            .messages()
            .mark_read(&["m2".to_string(), "m3".to_string()])
            .unwrap();
        assert_eq!(marked, 2);
        assert_eq!(repos.messages().mark_read(&["m2".to_string()]).unwrap(), 0);
        assert_eq!(repos.messages().count_unread("u1").unwrap(), 0);
        assert!(repos.messages().get("m2").unwrap().unwrap().is_read);
    }
}
