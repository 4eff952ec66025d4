use crate::database::models::{UserRecord, UserStatsRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        balance: row.get(3)?,
        reputation: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &UserRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, username, display_name, balance, reputation, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.username,
                record.display_name,
                record.balance,
                record.reputation,
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
                SELECT id, username, display_name, balance, reputation, created_at
                FROM users
                WHERE id = ?1
                "#,
                params![id],
                user_from_row,
            )
            .optional()?)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, username, display_name, balance, reputation, created_at
                FROM users
                WHERE username = ?1 COLLATE NOCASE
                "#,
                params![username],
                user_from_row,
            )
            .optional()?)
    }

    fn adjust_balance(&self, id: &str, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET balance = balance + ?2 WHERE id = ?1",
            params![id, delta],
        )?;
        Ok(())
    }

    fn stats(&self, id: &str) -> Result<UserStatsRecord> {
        let stats = self.conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM posts WHERE user_id = ?1),
                (SELECT COUNT(*) FROM post_bookmarks WHERE user_id = ?1),
                (SELECT COUNT(*) FROM post_votes WHERE user_id = ?1 AND vote = 1),
                (SELECT COUNT(*) FROM post_votes WHERE user_id = ?1 AND vote = -1),
                (SELECT COALESCE(SUM(count), 0) FROM post_tips WHERE user_id = ?1)
            "#,
            params![id],
            |row| {
                Ok(UserStatsRecord {
                    total_posts: row.get(0)?,
                    bookmarks_count: row.get(1)?,
                    upvotes_count: row.get(2)?,
                    downvotes_count: row.get(3)?,
                    tips_count: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }
}
