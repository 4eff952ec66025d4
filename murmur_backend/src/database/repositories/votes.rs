use crate::database::models::{PostVoteRecord, TipRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteVoteRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::VoteRepository for SqliteVoteRepository<'conn> {
    fn vote_of(&self, post_id: &str, user_id: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT vote FROM post_votes WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?)
    }

    fn set_vote(&self, post_id: &str, user_id: &str, vote: i64, created_at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO post_votes (post_id, user_id, vote, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(post_id, user_id) DO UPDATE SET vote = ?3, created_at = ?4
            "#,
            params![post_id, user_id, vote, created_at],
        )?;
        Ok(())
    }

    fn votes_for_post(&self, post_id: &str) -> Result<Vec<PostVoteRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT post_id, user_id, vote, created_at
            FROM post_votes
            WHERE post_id = ?1
            ORDER BY datetime(created_at) ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| {
            Ok(PostVoteRecord {
                post_id: row.get(0)?,
                user_id: row.get(1)?,
                vote: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let mut votes = Vec::new();
        for row in rows {
            votes.push(row?);
        }
        Ok(votes)
    }

    fn increment_tip(&self, post_id: &str, user_id: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO post_tips (post_id, user_id, count)
            VALUES (?1, ?2, 1)
            ON CONFLICT(post_id, user_id) DO UPDATE SET count = count + 1
            "#,
            params![post_id, user_id],
        )?;
        Ok(())
    }

    fn tips_for_post(&self, post_id: &str) -> Result<Vec<TipRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT post_id, user_id, count
            FROM post_tips
            WHERE post_id = ?1
            ORDER BY user_id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| {
            Ok(TipRecord {
                post_id: row.get(0)?,
                user_id: row.get(1)?,
                count: row.get(2)?,
            })
        })?;
        let mut tips = Vec::new();
        for row in rows {
            tips.push(row?);
        }
        Ok(tips)
    }

    fn is_bookmarked(&self, post_id: &str, user_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM post_bookmarks WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn add_bookmark(&self, post_id: &str, user_id: &str, created_at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO post_bookmarks (post_id, user_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![post_id, user_id, created_at],
        )?;
        Ok(())
    }

    fn remove_bookmark(&self, post_id: &str, user_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM post_bookmarks WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(())
    }

    fn bookmarkers_for_post(&self, post_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id FROM post_bookmarks
            WHERE post_id = ?1
            ORDER BY datetime(created_at) ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| row.get::<_, String>(0))?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}
