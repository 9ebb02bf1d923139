use crate::database::models::UserRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &UserRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.username,
                record.email,
                record.password_hash,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, username, email, password_hash, created_at
                FROM users
                WHERE id = ?1
                "#,
                params![id],
                map_user,
            )
            .optional()?)
    }

    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, username, email, password_hash, created_at
                FROM users
                WHERE username = ?1
                "#,
                params![username],
                map_user,
            )
            .optional()?)
    }
}
