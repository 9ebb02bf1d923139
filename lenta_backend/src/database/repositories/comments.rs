use crate::database::models::{CommentRecord, CommentWithAuthorRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_id: row.get(2)?,
        author_id: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, post_id, parent_id, author_id, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.post_id,
                record.parent_id,
                record.author_id,
                record.body,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, post_id, parent_id, author_id, body, created_at
                FROM comments
                WHERE id = ?1
                "#,
                params![id],
                map_comment,
            )
            .optional()?)
    }

    fn chain_length(&self, id: &str, limit: usize) -> Result<usize> {
        let length: Option<i64> = self.conn.query_row(
            r#"
            WITH RECURSIVE chain(id, parent_id, depth) AS (
                SELECT id, parent_id, 1 FROM comments WHERE id = ?1
                UNION ALL
                SELECT c.id, c.parent_id, chain.depth + 1
                FROM comments c
                INNER JOIN chain ON c.id = chain.parent_id
                WHERE chain.depth < ?2
            )
            SELECT MAX(depth) FROM chain
            "#,
            params![id, limit as i64],
            |row| row.get(0),
        )?;
        Ok(length.unwrap_or(0).max(0) as usize)
    }

    fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentWithAuthorRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.post_id, c.parent_id, c.author_id, c.body, c.created_at, u.username
            FROM comments c
            INNER JOIN users u ON u.id = c.author_id
            WHERE c.post_id = ?1
            ORDER BY c.created_at ASC, c.rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| {
            Ok(CommentWithAuthorRecord {
                comment: map_comment(row)?,
                author_username: row.get(6)?,
            })
        })?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}
