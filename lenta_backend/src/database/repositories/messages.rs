use crate::database::models::MessageRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteMessageRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        is_read: row.get(5)?,
    })
}

impl<'conn> super::MessageRepository for SqliteMessageRepository<'conn> {
    fn create(&self, record: &MessageRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO messages (id, sender_id, recipient_id, body, created_at, is_read)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.sender_id,
                record.recipient_id,
                record.body,
                record.created_at,
                record.is_read
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<MessageRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, sender_id, recipient_id, body, created_at, is_read
                FROM messages
                WHERE id = ?1
                "#,
                params![id],
                map_message,
            )
            .optional()?)
    }

    fn list_involving(&self, user_id: &str) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, sender_id, recipient_id, body, created_at, is_read
            FROM messages
            WHERE sender_id = ?1 OR recipient_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], map_message)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn list_between(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, sender_id, recipient_id, body, created_at, is_read
            FROM messages
            WHERE (sender_id = ?1 AND recipient_id = ?2)
               OR (sender_id = ?2 AND recipient_id = ?1)
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_a, user_b], map_message)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn mark_read(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut stmt = self.conn.prepare(
            r#"
            UPDATE messages
            SET is_read = 1
            WHERE id = ?1 AND is_read = 0
            "#,
        )?;
        let mut updated = 0;
        for id in ids {
            updated += stmt.execute(params![id])?;
        }
        Ok(updated)
    }

    fn count_unread(&self, recipient_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE recipient_id = ?1 AND is_read = 0
            "#,
            params![recipient_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
