use crate::database::models::ProfileRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteProfileRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ProfileRepository for SqliteProfileRepository<'conn> {
    fn get(&self, user_id: &str) -> Result<Option<ProfileRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT user_id, display_name, bio, updated_at
                FROM profiles
                WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok(ProfileRecord {
                        user_id: row.get(0)?,
                        display_name: row.get(1)?,
                        bio: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn upsert(&self, record: &ProfileRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO profiles (user_id, display_name, bio, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                bio = excluded.bio,
                updated_at = excluded.updated_at
            "#,
            params![
                record.user_id,
                record.display_name,
                record.bio,
                record.updated_at
            ],
        )?;
        Ok(())
    }
}
