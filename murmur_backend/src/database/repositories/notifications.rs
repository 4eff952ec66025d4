use crate::database::models::NotificationGroupRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteNotificationGroupRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationGroupRecord> {
    Ok(NotificationGroupRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        kind: row.get(3)?,
        count: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl<'conn> super::NotificationGroupRepository for SqliteNotificationGroupRepository<'conn> {
    fn increment(
        &self,
        id: &str,
        post_id: &str,
        user_id: &str,
        kind: &str,
        created_at: &str,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO notification_groups (id, post_id, user_id, kind, count, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            ON CONFLICT(post_id, kind) DO UPDATE SET count = count + 1, created_at = ?5
            "#,
            params![id, post_id, user_id, kind, created_at],
        )?;
        Ok(())
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<NotificationGroupRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, post_id, user_id, kind, count, created_at
            FROM notification_groups
            WHERE user_id = ?1
            ORDER BY datetime(created_at) DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], group_from_row)?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    fn get_for_post(&self, post_id: &str, kind: &str) -> Result<Option<NotificationGroupRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, post_id, user_id, kind, count, created_at
                FROM notification_groups
                WHERE post_id = ?1 AND kind = ?2
                "#,
                params![post_id, kind],
                group_from_row,
            )
            .optional()?)
    }
}
