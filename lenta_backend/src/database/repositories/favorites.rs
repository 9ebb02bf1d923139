use crate::database::models::FavoriteRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteFavoriteRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::FavoriteRepository for SqliteFavoriteRepository<'conn> {
    fn add(&self, record: &FavoriteRecord) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO favorites (user_id, post_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![record.user_id, record.post_id, record.created_at],
        )?;
        Ok(inserted > 0)
    }

    fn remove(&self, user_id: &str, post_id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
        )?;
        Ok(removed > 0)
    }

    fn exists(&self, user_id: &str, post_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM favorites WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn count_for_post(&self, post_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM favorites WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
