use crate::database::models::PostRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        replied_to: row.get(2)?,
        title: row.get(3)?,
        text: row.get(4)?,
        preview_id: row.get(5)?,
        total_votes: row.get(6)?,
        reputation: row.get(7)?,
        last_upvotes_weight: row.get(8)?,
        last_downvotes_weight: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    fn query_posts(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, post_from_row)?;
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
            INSERT INTO posts (
                id, user_id, replied_to, title, text, preview_id,
                total_votes, reputation, last_upvotes_weight, last_downvotes_weight,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.id,
                record.user_id,
                record.replied_to,
                record.title,
                record.text,
                record.preview_id,
                record.total_votes,
                record.reputation,
                record.last_upvotes_weight,
                record.last_downvotes_weight,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, user_id, replied_to, title, text, preview_id,
                       total_votes, reputation, last_upvotes_weight, last_downvotes_weight,
                       created_at, updated_at
                FROM posts
                WHERE id = ?1
                "#,
                params![id],
                post_from_row,
            )
            .optional()?)
    }

    fn update_content(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE posts
            SET title = ?2, text = ?3, preview_id = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.title,
                record.text,
                record.preview_id,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn delete_tree(&self, root_id: &str) -> Result<usize> {
        let removed = self.conn.execute(
            r#"
            WITH RECURSIVE tree(id) AS (
                SELECT id FROM posts WHERE id = ?1
                UNION ALL
                SELECT p.id FROM posts p JOIN tree t ON p.replied_to = t.id
            )
            DELETE FROM posts WHERE id IN (SELECT id FROM tree)
            "#,
            params![root_id],
        )?;
        Ok(removed)
    }

    fn tree_with_previews(&self, root_id: &str) -> Result<Vec<(String, Option<String>)>> {
        let mut stmt = self.conn.prepare(
            r#"
            WITH RECURSIVE tree(id) AS (
                SELECT id FROM posts WHERE id = ?1
                UNION ALL
                SELECT p.id FROM posts p JOIN tree t ON p.replied_to = t.id
            )
            SELECT p.id, p.preview_id
            FROM posts p
            WHERE p.id IN (SELECT id FROM tree)
            ORDER BY datetime(p.created_at) ASC
            "#,
        )?;
        let rows = stmt.query_map(params![root_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }

    fn reply_ids(&self, post_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id FROM posts
            WHERE replied_to = ?1
            ORDER BY datetime(created_at) ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn list_replies(&self, post_id: &str, limit: usize, offset: usize) -> Result<Vec<PostRecord>> {
        self.query_posts(
            r#"
            SELECT id, user_id, replied_to, title, text, preview_id,
                   total_votes, reputation, last_upvotes_weight, last_downvotes_weight,
                   created_at, updated_at
            FROM posts
            WHERE replied_to = ?1
            ORDER BY datetime(created_at) ASC
            LIMIT ?2 OFFSET ?3
            "#,
            &[&post_id, &limit, &offset],
        )
    }

    fn explore(&self, limit: usize, offset: usize) -> Result<Vec<PostRecord>> {
        self.query_posts(
            r#"
            SELECT id, user_id, replied_to, title, text, preview_id,
                   total_votes, reputation, last_upvotes_weight, last_downvotes_weight,
                   created_at, updated_at
            FROM posts
            WHERE replied_to IS NULL
            ORDER BY datetime(created_at) DESC
            LIMIT ?1 OFFSET ?2
            "#,
            &[&limit, &offset],
        )
    }

    fn trending(&self, limit: usize, offset: usize) -> Result<Vec<PostRecord>> {
        self.query_posts(
            r#"
            SELECT id, user_id, replied_to, title, text, preview_id,
                   total_votes, reputation, last_upvotes_weight, last_downvotes_weight,
                   created_at, updated_at
            FROM posts
            WHERE replied_to IS NULL AND reputation >= 0
            ORDER BY reputation DESC, total_votes DESC
            LIMIT ?1 OFFSET ?2
            "#,
            &[&limit, &offset],
        )
    }

    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<PostRecord>> {
        self.query_posts(
            r#"
            SELECT id, user_id, replied_to, title, text, preview_id,
                   total_votes, reputation, last_upvotes_weight, last_downvotes_weight,
                   created_at, updated_at
            FROM posts
            WHERE title LIKE '%' || ?1 || '%' OR text LIKE '%' || ?1 || '%'
            ORDER BY datetime(created_at) DESC
            LIMIT ?2 OFFSET ?3
            "#,
            &[&query, &limit, &offset],
        )
    }

    fn by_tag(
        &self,
        tag: &str,
        since: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostRecord>> {
        self.query_posts(
            r#"
            SELECT p.id, p.user_id, p.replied_to, p.title, p.text, p.preview_id,
                   p.total_votes, p.reputation, p.last_upvotes_weight, p.last_downvotes_weight,
                   p.created_at, p.updated_at
            FROM posts p
            JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag = ?1 COLLATE NOCASE
              AND p.replied_to IS NULL
              AND (?2 IS NULL OR datetime(p.created_at) >= datetime(?2))
            ORDER BY p.reputation DESC, p.total_votes DESC
            LIMIT ?3 OFFSET ?4
            "#,
            &[&tag, &since, &limit, &offset],
        )
    }

    fn by_author(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<PostRecord>> {
        self.query_posts(
            r#"
            SELECT id, user_id, replied_to, title, text, preview_id,
                   total_votes, reputation, last_upvotes_weight, last_downvotes_weight,
                   created_at, updated_at
            FROM posts
            WHERE user_id = ?1
            ORDER BY datetime(created_at) DESC
            LIMIT ?2 OFFSET ?3
            "#,
            &[&user_id, &limit, &offset],
        )
    }

    fn voted_by(
        &self,
        user_id: &str,
        vote: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostRecord>> {
        self.query_posts(
            r#"
            SELECT p.id, p.user_id, p.replied_to, p.title, p.text, p.preview_id,
                   p.total_votes, p.reputation, p.last_upvotes_weight, p.last_downvotes_weight,
                   p.created_at, p.updated_at
            FROM posts p
            JOIN post_votes v ON v.post_id = p.id
            WHERE v.user_id = ?1 AND v.vote = ?2
            ORDER BY datetime(v.created_at) DESC
            LIMIT ?3 OFFSET ?4
            "#,
            &[&user_id, &vote, &limit, &offset],
        )
    }

    fn bookmarked_by(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostRecord>> {
        self.query_posts(
            r#"
            SELECT p.id, p.user_id, p.replied_to, p.title, p.text, p.preview_id,
                   p.total_votes, p.reputation, p.last_upvotes_weight, p.last_downvotes_weight,
                   p.created_at, p.updated_at
            FROM posts p
            JOIN post_bookmarks b ON b.post_id = p.id
            WHERE b.user_id = ?1
            ORDER BY datetime(b.created_at) DESC
            LIMIT ?2 OFFSET ?3
            "#,
            &[&user_id, &limit, &offset],
        )
    }

    fn set_tags(&self, post_id: &str, tags: &[String]) -> Result<()> {
        self.conn
            .execute("DELETE FROM post_tags WHERE post_id = ?1", params![post_id])?;
        let mut stmt = self
            .conn
            .prepare("INSERT OR IGNORE INTO post_tags (post_id, tag) VALUES (?1, ?2)")?;
        for tag in tags {
            let trimmed = tag.trim();
            if trimmed.is_empty() {
                continue;
            }
            stmt.execute(params![post_id, trimmed])?;
        }
        Ok(())
    }

    fn tags_for(&self, post_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM post_tags WHERE post_id = ?1 ORDER BY tag ASC")?;
        let rows = stmt.query_map(params![post_id], |row| row.get::<_, String>(0))?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    fn set_images(&self, post_id: &str, images: &[String]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM post_images WHERE post_id = ?1",
            params![post_id],
        )?;
        let mut stmt = self
            .conn
            .prepare("INSERT INTO post_images (post_id, position, url) VALUES (?1, ?2, ?3)")?;
        for (position, url) in images.iter().enumerate() {
            stmt.execute(params![post_id, position as i64, url])?;
        }
        Ok(())
    }

    fn images_for(&self, post_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM post_images WHERE post_id = ?1 ORDER BY position ASC")?;
        let rows = stmt.query_map(params![post_id], |row| row.get::<_, String>(0))?;
        let mut images = Vec::new();
        for row in rows {
            images.push(row?);
        }
        Ok(images)
    }

    fn popular_tags(&self, limit: usize) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT tag, COUNT(*) AS posts
            FROM post_tags
            GROUP BY tag
            ORDER BY posts DESC, tag ASC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    fn all_tags(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT tag FROM post_tags ORDER BY tag ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    fn apply_vote_deltas(
        &self,
        post_id: &str,
        total_delta: i64,
        up_weight_delta: f64,
        down_weight_delta: f64,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE posts
            SET total_votes = total_votes + ?2,
                last_upvotes_weight = last_upvotes_weight + ?3,
                last_downvotes_weight = last_downvotes_weight + ?4
            WHERE id = ?1
            "#,
            params![post_id, total_delta, up_weight_delta, down_weight_delta],
        )?;
        Ok(())
    }

    fn decay_all_reputation(&self) -> Result<usize> {
        let updated = self.conn.execute(
            r#"
            UPDATE posts
            SET reputation = CASE
                    WHEN reputation >= 0.1
                        THEN 0.98 * reputation + 0.9 * (last_upvotes_weight - last_downvotes_weight)
                    ELSE 0
                END,
                last_upvotes_weight = 0,
                last_downvotes_weight = 0
            "#,
            [],
        )?;
        Ok(updated)
    }
}
