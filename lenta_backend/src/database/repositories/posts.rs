use crate::database::models::{PostListingRecord, PostRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const LISTING_COLUMNS: &str = r#"
    SELECT p.id, p.author_id, p.title, p.body, p.created_at, p.updated_at,
           u.username,
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id)
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
"#;

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn map_listing(row: &Row<'_>) -> rusqlite::Result<PostListingRecord> {
    Ok(PostListingRecord {
        post: map_post(row)?,
        author_username: row.get(6)?,
        like_count: row.get(7)?,
        comment_count: row.get(8)?,
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    fn query_listings<P: Params>(&self, tail: &str, params: P) -> Result<Vec<PostListingRecord>> {
        let sql = format!("{LISTING_COLUMNS} {tail}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params, map_listing)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, author_id, title, body, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.author_id,
                record.title,
                record.body,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn update(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE posts
            SET title = ?2, body = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
            params![record.id, record.title, record.body, record.updated_at],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, author_id, title, body, created_at, updated_at
                FROM posts
                WHERE id = ?1
                "#,
                params![id],
                map_post,
            )
            .optional()?)
    }

    fn get_listing(&self, id: &str) -> Result<Option<PostListingRecord>> {
        let sql = format!("{LISTING_COLUMNS} WHERE p.id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], map_listing)
            .optional()?)
    }

    fn list_recent(&self) -> Result<Vec<PostListingRecord>> {
        self.query_listings("ORDER BY p.created_at DESC, p.rowid DESC", [])
    }

    fn list_by_author(&self, author_id: &str) -> Result<Vec<PostListingRecord>> {
        self.query_listings(
            "WHERE p.author_id = ?1 ORDER BY p.created_at DESC, p.rowid DESC",
            params![author_id],
        )
    }

    fn list_favorited_by(&self, user_id: &str) -> Result<Vec<PostListingRecord>> {
        self.query_listings(
            r#"
            INNER JOIN favorites f ON f.post_id = p.id
            WHERE f.user_id = ?1
            ORDER BY f.created_at DESC
            "#,
            params![user_id],
        )
    }
}
