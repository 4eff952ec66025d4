use crate::config::MetadataConfig;
use crate::database::models::PreviewRecord;
use crate::database::repositories::{PreviewRepository, SqliteRepositories};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::utils::now_utc_iso;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvePreviewInput {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewView {
    pub id: String,
    pub url: String,
    /// Every non-canonical spelling that has resolved to this preview.
    pub canonicals: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_post: Option<String>,
    pub created_at: String,
}

impl PreviewView {
    pub(crate) fn from_record(record: PreviewRecord, canonicals: Vec<String>) -> Self {
        Self {
            id: record.id,
            url: record.url,
            canonicals,
            title: record.title,
            description: record.description,
            site_name: record.site_name,
            favicon: record.favicon,
            image: record.image,
            youtube_id: record.youtube_id,
            source_post: record.source_post_id,
            created_at: record.created_at,
        }
    }
}

/// Metadata extracted for a link by the external scraping service, already
/// reduced to the fields we persist.
#[derive(Debug, Clone, Default)]
pub struct LinkMetadata {
    pub canonical: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
    pub favicon: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    meta: MetaSection,
    #[serde(default)]
    links: LinksSection,
}

#[derive(Debug, Default, Deserialize)]
struct MetaSection {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    site: Option<String>,
    #[serde(default)]
    canonical: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksSection {
    #[serde(default)]
    icon: Vec<LinkEntry>,
    #[serde(default)]
    thumbnail: Vec<LinkEntry>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    href: String,
}

impl MetadataResponse {
    fn into_metadata(self) -> LinkMetadata {
        LinkMetadata {
            canonical: self.meta.canonical,
            title: self.meta.title,
            description: self.meta.description,
            site_name: self.meta.site,
            favicon: self.links.icon.into_iter().next().map(|entry| entry.href),
            image: self
                .links
                .thumbnail
                .into_iter()
                .next()
                .map(|entry| entry.href),
        }
    }
}

/// Client for the iframely-compatible metadata endpoint.
#[derive(Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    config: MetadataConfig,
}

impl MetadataClient {
    pub fn new(http: reqwest::Client, config: MetadataConfig) -> Self {
        Self { http, config }
    }

    pub async fn fetch(&self, url: &str) -> CoreResult<LinkMetadata> {
        let mut request = self
            .http
            .get(&self.config.endpoint)
            .query(&[("iframe", "1"), ("omit_script", "1"), ("url", url)]);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        let response = request.send().await.map_err(|err| CoreError::Upstream {
            status: 502,
            message: format!("metadata service unreachable: {err}"),
        })?;

        let http_status = response.status().as_u16();
        let payload: MetadataResponse =
            response.json().await.map_err(|err| CoreError::Upstream {
                status: 502,
                message: format!("metadata service sent a malformed payload: {err}"),
            })?;

        // The service reports scrape failures inside the body, sometimes
        // alongside a 200 transport status.
        if let Some(message) = payload.error {
            return Err(CoreError::Upstream {
                status: payload.status.unwrap_or(http_status),
                message,
            });
        }
        if !(200..300).contains(&http_status) {
            return Err(CoreError::Upstream {
                status: http_status,
                message: "metadata service refused the request".into(),
            });
        }
        Ok(payload.into_metadata())
    }
}

/// Link preview resolution and the source-post bookkeeping around it.
///
/// A preview row is keyed by the page's canonical URL; every other spelling
/// of the same page (tracking parameters, shorteners, scheme variants) is
/// recorded as an alias pointing at that one row, so repeated submissions
/// never scrape twice or store duplicates.
#[derive(Clone)]
pub struct PreviewService {
    database: Database,
    metadata: MetadataClient,
}

impl PreviewService {
    pub fn new(database: Database, metadata: MetadataClient) -> Self {
        Self { database, metadata }
    }

    /// Resolves a raw URL to its stored preview, scraping the page through
    /// the metadata service only on a cache miss.
    pub async fn resolve(&self, raw_url: &str) -> CoreResult<PreviewView> {
        let input = normalize_input(raw_url)?;
        if let Some(view) = self.lookup_cached(&input)? {
            return Ok(view);
        }
        let metadata = self.metadata.fetch(&input).await?;
        self.store_resolution(&input, metadata)
    }

    fn lookup_cached(&self, input: &str) -> CoreResult<Option<PreviewView>> {
        self.database
            .with_repositories(|repos| {
                let previews = repos.previews();
                match previews.find_by_url_or_alias(input)? {
                    Some(record) => {
                        let canonicals = previews.aliases_for(&record.id)?;
                        Ok(Some(PreviewView::from_record(record, canonicals)))
                    }
                    None => Ok(None),
                }
            })
            .map_err(CoreError::from_anyhow)
    }

    /// Persists one resolution outcome. The canonical URL wins as the row
    /// key; when it differs from what the caller typed, the typed spelling
    /// is kept as an alias so the next submission of either form hits the
    /// same row.
    pub(crate) fn store_resolution(
        &self,
        input: &str,
        metadata: LinkMetadata,
    ) -> CoreResult<PreviewView> {
        self.database
            .with_repositories(|repos| {
                let tx = repos.conn().unchecked_transaction()?;
                let previews = repos.previews();

                // Another request may have resolved the same URL while we
                // were waiting on the metadata service.
                if let Some(existing) = previews.find_by_url_or_alias(input)? {
                    let canonicals = previews.aliases_for(&existing.id)?;
                    tx.commit()?;
                    return Ok(PreviewView::from_record(existing, canonicals));
                }

                let canonical = metadata
                    .canonical
                    .as_deref()
                    .map(str::trim)
                    .filter(|canonical| !canonical.is_empty());
                let stored_url = canonical.unwrap_or(input);

                if stored_url != input {
                    if let Some(existing) = previews.find_by_url_or_alias(stored_url)? {
                        previews.add_alias(&existing.id, input)?;
                        let canonicals = previews.aliases_for(&existing.id)?;
                        tx.commit()?;
                        return Ok(PreviewView::from_record(existing, canonicals));
                    }
                }

                let record = PreviewRecord {
                    id: Uuid::new_v4().to_string(),
                    url: stored_url.to_string(),
                    title: clean_text(metadata.title.as_deref()),
                    description: clean_text(metadata.description.as_deref()),
                    site_name: clean_text(metadata.site_name.as_deref()),
                    favicon: metadata.favicon.clone(),
                    image: metadata.image.clone(),
                    youtube_id: detect_video_id(input),
                    source_post_id: None,
                    created_at: now_utc_iso(),
                };
                previews.create(&record)?;
                let mut canonicals = Vec::new();
                if stored_url != input {
                    previews.add_alias(&record.id, input)?;
                    canonicals.push(input.to_string());
                }
                tx.commit()?;
                Ok(PreviewView::from_record(record, canonicals))
            })
            .map_err(CoreError::from_anyhow)
    }

    /// Stamps the post as the preview's source when it has none yet.
    pub fn claim_source_post(&self, preview_id: &str, post_id: &str) -> CoreResult<()> {
        self.database
            .with_repositories(|repos| claim_source_with(&repos, preview_id, post_id))
            .map_err(CoreError::from_anyhow)
    }

    /// Drops `post_id` as a referrer and repoints the preview at the oldest
    /// post still using it, clearing the source when none remain.
    pub fn release_source_post(&self, preview_id: &str, post_id: &str) -> CoreResult<()> {
        self.database
            .with_repositories(|repos| release_source_with(&repos, preview_id, post_id))
            .map_err(CoreError::from_anyhow)
    }

    pub fn get(&self, preview_id: &str) -> CoreResult<PreviewView> {
        self.database
            .with_repositories(|repos| {
                let previews = repos.previews();
                let record = previews
                    .get(preview_id)?
                    .ok_or_else(|| CoreError::NotFound("preview not found".into()))?;
                let canonicals = previews.aliases_for(&record.id)?;
                Ok(PreviewView::from_record(record, canonicals))
            })
            .map_err(CoreError::from_anyhow)
    }
}

/// Attribution step shared with the post write paths, which run it inside
/// their own transaction and must not re-enter the connection lock.
pub(crate) fn claim_source_with(
    repos: &SqliteRepositories<'_>,
    preview_id: &str,
    post_id: &str,
) -> anyhow::Result<()> {
    let previews = repos.previews();
    let Some(preview) = previews.get(preview_id)? else {
        return Ok(());
    };
    if preview.source_post_id.is_none() {
        previews.set_source_post(preview_id, Some(post_id))?;
    }
    Ok(())
}

pub(crate) fn release_source_with(
    repos: &SqliteRepositories<'_>,
    preview_id: &str,
    post_id: &str,
) -> anyhow::Result<()> {
    let previews = repos.previews();
    let Some(preview) = previews.get(preview_id)? else {
        return Ok(());
    };
    match previews.oldest_referencing_post(preview_id, Some(post_id))? {
        Some(oldest) => {
            if preview.source_post_id.as_deref() != Some(oldest.as_str()) {
                previews.set_source_post(preview_id, Some(&oldest))?;
            }
        }
        None => {
            if preview.source_post_id.is_some() {
                previews.set_source_post(preview_id, None)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn load_preview_view(
    repos: &SqliteRepositories<'_>,
    preview_id: &str,
) -> anyhow::Result<Option<PreviewView>> {
    let previews = repos.previews();
    match previews.get(preview_id)? {
        Some(record) => {
            let canonicals = previews.aliases_for(&record.id)?;
            Ok(Some(PreviewView::from_record(record, canonicals)))
        }
        None => Ok(None),
    }
}

fn normalize_input(raw_url: &str) -> CoreResult<String> {
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("url is required".into()));
    }
    if trimmed.split_whitespace().count() > 1 {
        return Err(CoreError::InvalidInput(
            "url must not contain whitespace".into(),
        ));
    }
    Url::parse(trimmed).map_err(|err| CoreError::InvalidInput(format!("invalid url: {err}")))?;
    Ok(trimmed.to_string())
}

fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(|text| html_escape::decode_html_entities(text).trim().to_string())
        .filter(|text| !text.is_empty())
}

fn detect_video_id(url: &str) -> Option<String> {
    let re = Regex::new(
        r"^(?:https?://)?(?:www\.)?(?:youtube\.com|youtu\.be)/(?:watch\?v=)?([a-zA-Z0-9_-]{11})",
    )
    .unwrap();
    re.captures(url).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup_service() -> PreviewService {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let database = Database::from_connection(conn, true);
        database.ensure_migrations().expect("migrations");
        let metadata = MetadataClient::new(
            reqwest::Client::new(),
            MetadataConfig {
                endpoint: "http://127.0.0.1:9/api/iframely".into(),
                api_key: None,
            },
        );
        PreviewService::new(database, metadata)
    }

    fn sample_metadata(canonical: Option<&str>) -> LinkMetadata {
        LinkMetadata {
            canonical: canonical.map(ToString::to_string),
            title: Some("Example".into()),
            description: Some("A page".into()),
            site_name: Some("example.com".into()),
            favicon: None,
            image: None,
        }
    }

    #[test]
    fn rejects_blank_and_multi_token_input() {
        assert!(matches!(
            normalize_input("  "),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            normalize_input("https://a.example https://b.example"),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            normalize_input("not a url"),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(normalize_input(" https://example.com/x ").is_ok());
    }

    #[test]
    fn detects_video_ids() {
        assert_eq!(
            detect_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".into())
        );
        assert_eq!(
            detect_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".into())
        );
        assert_eq!(detect_video_id("https://example.com/watch?v=short"), None);
    }

    #[test]
    fn url_variants_share_one_preview() {
        let service = setup_service();
        let canonical = "https://example.com/article";

        let first = service
            .store_resolution(
                "https://example.com/article?utm_source=feed",
                sample_metadata(Some(canonical)),
            )
            .unwrap();
        assert_eq!(first.url, canonical);
        assert_eq!(
            first.canonicals,
            vec!["https://example.com/article?utm_source=feed".to_string()]
        );

        // A different spelling that canonicalizes to the same page must
        // land on the same row, with both spellings recorded.
        let second = service
            .store_resolution(
                "https://example.com/article?ref=homepage",
                sample_metadata(Some(canonical)),
            )
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.canonicals.len(), 2);

        // And both spellings now hit the cache without any metadata.
        let cached = service
            .lookup_cached("https://example.com/article?utm_source=feed")
            .unwrap()
            .unwrap();
        assert_eq!(cached.id, first.id);
    }

    #[test]
    fn canonical_becomes_the_stored_url() {
        let service = setup_service();
        let view = service
            .store_resolution(
                "http://example.com/a?b=c",
                sample_metadata(Some("https://example.com/a")),
            )
            .unwrap();
        assert_eq!(view.url, "https://example.com/a");

        // Without a canonical the typed URL is kept as-is and no alias is
        // recorded.
        let plain = service
            .store_resolution("https://example.com/plain", sample_metadata(None))
            .unwrap();
        assert_eq!(plain.url, "https://example.com/plain");
        assert!(plain.canonicals.is_empty());
    }

    #[test]
    fn titles_are_entity_decoded() {
        let service = setup_service();
        let view = service
            .store_resolution(
                "https://example.com/amp",
                LinkMetadata {
                    title: Some("AT&amp;T &quot;news&quot;".into()),
                    description: Some("  ".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(view.title.as_deref(), Some(r#"AT&T "news""#));
        assert_eq!(view.description, None);
    }

    #[test]
    fn source_post_claim_and_release() {
        let service = setup_service();
        let view = service
            .store_resolution("https://example.com/claimed", sample_metadata(None))
            .unwrap();

        service.claim_source_post(&view.id, "post-1").unwrap();
        assert_eq!(
            service.get(&view.id).unwrap().source_post.as_deref(),
            Some("post-1")
        );

        // A later claim does not steal the slot.
        service.claim_source_post(&view.id, "post-2").unwrap();
        assert_eq!(
            service.get(&view.id).unwrap().source_post.as_deref(),
            Some("post-1")
        );

        // No posts reference the preview, so releasing clears it.
        service.release_source_post(&view.id, "post-1").unwrap();
        assert_eq!(service.get(&view.id).unwrap().source_post, None);

        // Both helpers tolerate unknown previews.
        service.claim_source_post("missing", "post-1").unwrap();
        service.release_source_post("missing", "post-1").unwrap();
    }
}
