use crate::database::models::SessionRecord;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteSessionRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::SessionRepository for SqliteSessionRepository<'conn> {
    fn create(&self, record: &SessionRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.token,
                record.user_id,
                record.created_at,
                record.expires_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, token: &str) -> Result<Option<SessionRecord>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT token, user_id, created_at, expires_at
                FROM sessions
                WHERE token = ?1
                "#,
                params![token],
                |row| {
                    Ok(SessionRecord {
                        token: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    fn delete(&self, token: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(removed > 0)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
        Ok(removed)
    }
}
