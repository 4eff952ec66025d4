use crate::database::models::PreviewRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePreviewRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn preview_from_row(row: &Row<'_>) -> rusqlite::Result<PreviewRecord> {
    Ok(PreviewRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        site_name: row.get(4)?,
        favicon: row.get(5)?,
        image: row.get(6)?,
        youtube_id: row.get(7)?,
        source_post_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl<'conn> super::PreviewRepository for SqlitePreviewRepository<'conn> {
    fn create(&self, record: &PreviewRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO previews (
                id, url, title, description, site_name, favicon, image,
                youtube_id, source_post_id, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.id,
                record.url,
                record.title,
                record.description,
                record.site_name,
                record.favicon,
                record.image,
                record.youtube_id,
                record.source_post_id,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PreviewRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, url, title, description, site_name, favicon, image,
                       youtube_id, source_post_id, created_at
                FROM previews
                WHERE id = ?1
                "#,
                params![id],
                preview_from_row,
            )
            .optional()?)
    }

    fn find_by_url_or_alias(&self, url: &str) -> Result<Option<PreviewRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT p.id, p.url, p.title, p.description, p.site_name, p.favicon, p.image,
                       p.youtube_id, p.source_post_id, p.created_at
                FROM previews p
                WHERE p.url = ?1
                   OR EXISTS (
                        SELECT 1 FROM preview_aliases a
                        WHERE a.preview_id = p.id AND a.url = ?1
                   )
                LIMIT 1
                "#,
                params![url],
                preview_from_row,
            )
            .optional()?)
    }

    fn add_alias(&self, preview_id: &str, url: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO preview_aliases (preview_id, url)
            VALUES (?1, ?2)
            "#,
            params![preview_id, url],
        )?;
        Ok(())
    }

    fn aliases_for(&self, preview_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM preview_aliases WHERE preview_id = ?1 ORDER BY url ASC",
        )?;
        let rows = stmt.query_map(params![preview_id], |row| row.get::<_, String>(0))?;
        let mut aliases = Vec::new();
        for row in rows {
            aliases.push(row?);
        }
        Ok(aliases)
    }

    fn set_source_post(&self, preview_id: &str, post_id: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE previews SET source_post_id = ?2 WHERE id = ?1",
            params![preview_id, post_id],
        )?;
        Ok(())
    }

    fn oldest_referencing_post(
        &self,
        preview_id: &str,
        exclude_post_id: Option<&str>,
    ) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id FROM posts
                WHERE preview_id = ?1 AND (?2 IS NULL OR id <> ?2)
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                "#,
                params![preview_id, exclude_post_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }
}
