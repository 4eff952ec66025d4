use crate::database::models::PostRecord;
use crate::database::repositories::{
    NotificationGroupRepository, PostRepository, PreviewRepository, SqliteRepositories,
    UserRepository, VoteRepository,
};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, EventPayload, NewPostEvent};
use crate::previews::{self, PreviewView};
use crate::users::UserView;
use crate::utils::{deserialize_patch, now_utc_iso};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

const POPULAR_TOPICS_LIMIT: usize = 4;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub preview_id: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyInput {
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub preview_id: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// PATCH-style edit. `title`/`text`/`images`/`tags` are replaced when
/// present. `previewId` distinguishes absent (keep) from null (detach) from
/// a value (attach), which is why it is doubly optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPostInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_patch")]
    pub preview_id: Option<Option<String>>,
}

/// 1-based pagination with a default of 20 and a hard cap of 100 per page.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl Page {
    pub(crate) fn limit_offset(self) -> (usize, usize) {
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let page = self.page.unwrap_or(1).max(1);
        (per_page, (page - 1) * per_page)
    }
}

/// Time window for topic feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(CoreError::InvalidInput(format!("unknown period '{raw}'"))),
        }
    }

    fn cutoff(self) -> String {
        let span = match self {
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::weeks(1),
            Self::Month => Duration::days(30),
            Self::Year => Duration::days(365),
        };
        (Utc::now() - span).to_rfc3339()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    pub tag: String,
    pub posts: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub user_id: String,
    pub user: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied_to: Option<String>,
    pub replies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewView>,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub upvotes: Vec<String>,
    pub downvotes: Vec<String>,
    pub total_votes: i64,
    pub reputation: f64,
    pub last_upvotes_weight: f64,
    pub last_downvotes_weight: f64,
    pub tips: BTreeMap<String, i64>,
    pub book_marks: Vec<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Assembles the full wire view of one post: author, reply ids, vote sets,
/// tips, bookmarks, tags, images and the joined preview.
pub(crate) fn load_post_view(
    repos: &SqliteRepositories<'_>,
    record: PostRecord,
) -> anyhow::Result<PostView> {
    let author = repos
        .users()
        .get(&record.user_id)?
        .ok_or_else(|| anyhow::anyhow!("author row missing for post {}", record.id))?;
    let posts = repos.posts();
    let replies = posts.reply_ids(&record.id)?;
    let tags = posts.tags_for(&record.id)?;
    let images = posts.images_for(&record.id)?;

    let votes = repos.votes();
    let mut upvotes = Vec::new();
    let mut downvotes = Vec::new();
    for vote in votes.votes_for_post(&record.id)? {
        if vote.vote > 0 {
            upvotes.push(vote.user_id);
        } else {
            downvotes.push(vote.user_id);
        }
    }
    let mut tips = BTreeMap::new();
    for tip in votes.tips_for_post(&record.id)? {
        tips.insert(tip.user_id, tip.count);
    }
    let book_marks = votes.bookmarkers_for_post(&record.id)?;

    let preview = match &record.preview_id {
        Some(preview_id) => previews::load_preview_view(repos, preview_id)?,
        None => None,
    };

    Ok(PostView {
        id: record.id,
        user_id: record.user_id,
        user: UserView::from_record(author),
        replied_to: record.replied_to,
        replies,
        title: record.title,
        text: record.text,
        preview,
        images,
        tags,
        upvotes,
        downvotes,
        total_votes: record.total_votes,
        reputation: record.reputation,
        last_upvotes_weight: record.last_upvotes_weight,
        last_downvotes_weight: record.last_downvotes_weight,
        tips,
        book_marks,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

fn load_views(
    repos: &SqliteRepositories<'_>,
    records: Vec<PostRecord>,
) -> anyhow::Result<Vec<PostView>> {
    records
        .into_iter()
        .map(|record| load_post_view(repos, record))
        .collect()
}

fn clean_opt(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Post lifecycle and feed queries.
#[derive(Clone)]
pub struct PostService {
    database: Database,
    events: EventBus,
}

impl PostService {
    pub fn new(database: Database, events: EventBus) -> Self {
        Self { database, events }
    }

    pub fn create_post(&self, input: CreatePostInput) -> CoreResult<PostView> {
        let title = clean_opt(input.title.clone());
        let text = clean_opt(input.text.clone());
        if title.is_none() && text.is_none() && input.preview_id.is_none() && input.images.is_empty()
        {
            return Err(CoreError::InvalidInput(
                "a post needs a title, text, link or image".into(),
            ));
        }

        let view = self
            .database
            .with_repositories(|repos| {
                let tx = repos.conn().unchecked_transaction()?;
                if repos.users().get(&input.user_id)?.is_none() {
                    return Err(CoreError::NotFound("user not found".into()).into());
                }
                if let Some(preview_id) = &input.preview_id {
                    if repos.previews().get(preview_id)?.is_none() {
                        return Err(CoreError::InvalidInput("unknown preview".into()).into());
                    }
                }

                let record = PostRecord {
                    id: Uuid::new_v4().to_string(),
                    user_id: input.user_id.clone(),
                    replied_to: None,
                    title: title.clone(),
                    text: text.clone(),
                    preview_id: input.preview_id.clone(),
                    total_votes: 0,
                    reputation: 1.0,
                    last_upvotes_weight: 0.0,
                    last_downvotes_weight: 0.0,
                    created_at: now_utc_iso(),
                    updated_at: None,
                };
                repos.posts().create(&record)?;
                if !input.tags.is_empty() {
                    repos.posts().set_tags(&record.id, &input.tags)?;
                }
                if !input.images.is_empty() {
                    repos.posts().set_images(&record.id, &input.images)?;
                }
                if let Some(preview_id) = &input.preview_id {
                    previews::claim_source_with(&repos, preview_id, &record.id)?;
                }
                let view = load_post_view(&repos, record)?;
                tx.commit()?;
                Ok(view)
            })
            .map_err(CoreError::from_anyhow)?;

        self.events.emit(EventPayload::NewPost(NewPostEvent {
            post_id: view.id.clone(),
            user_id: view.user_id.clone(),
            title: view.title.clone(),
        }));
        Ok(view)
    }

    pub fn create_reply(&self, parent_id: &str, input: CreateReplyInput) -> CoreResult<PostView> {
        let parent_id = parent_id.trim().to_string();
        if parent_id.is_empty() {
            return Err(CoreError::InvalidInput("parent post id is required".into()));
        }
        let text = input.text.trim().to_string();
        if text.is_empty() {
            return Err(CoreError::InvalidInput("reply text is required".into()));
        }

        let view = self
            .database
            .with_repositories(|repos| {
                let tx = repos.conn().unchecked_transaction()?;
                let parent = repos
                    .posts()
                    .get(&parent_id)?
                    .ok_or_else(|| CoreError::NotFound("parent post not found".into()))?;
                if repos.users().get(&input.user_id)?.is_none() {
                    return Err(CoreError::NotFound("user not found".into()).into());
                }
                if let Some(preview_id) = &input.preview_id {
                    if repos.previews().get(preview_id)?.is_none() {
                        return Err(CoreError::InvalidInput("unknown preview".into()).into());
                    }
                }

                let record = PostRecord {
                    id: Uuid::new_v4().to_string(),
                    user_id: input.user_id.clone(),
                    replied_to: Some(parent.id.clone()),
                    title: None,
                    text: Some(text.clone()),
                    preview_id: input.preview_id.clone(),
                    total_votes: 0,
                    reputation: 1.0,
                    last_upvotes_weight: 0.0,
                    last_downvotes_weight: 0.0,
                    created_at: now_utc_iso(),
                    updated_at: None,
                };
                repos.posts().create(&record)?;
                if !input.images.is_empty() {
                    repos.posts().set_images(&record.id, &input.images)?;
                }
                if let Some(preview_id) = &input.preview_id {
                    previews::claim_source_with(&repos, preview_id, &record.id)?;
                }
                // Replying to yourself is not news.
                if input.user_id != parent.user_id {
                    repos.notification_groups().increment(
                        &Uuid::new_v4().to_string(),
                        &parent.id,
                        &parent.user_id,
                        "comment",
                        &record.created_at,
                    )?;
                }
                let view = load_post_view(&repos, record)?;
                tx.commit()?;
                Ok(view)
            })
            .map_err(CoreError::from_anyhow)?;

        self.events.emit(EventPayload::NewPost(NewPostEvent {
            post_id: view.id.clone(),
            user_id: view.user_id.clone(),
            title: None,
        }));
        Ok(view)
    }

    pub fn edit_post(&self, post_id: &str, input: EditPostInput) -> CoreResult<PostView> {
        self.database
            .with_repositories(|repos| {
                let tx = repos.conn().unchecked_transaction()?;
                let mut record = repos
                    .posts()
                    .get(post_id)?
                    .ok_or_else(|| CoreError::NotFound("post not found".into()))?;

                if let Some(patch) = input.preview_id.clone() {
                    let next = clean_opt(patch);
                    if next != record.preview_id {
                        if let Some(new_id) = &next {
                            if repos.previews().get(new_id)?.is_none() {
                                return Err(
                                    CoreError::InvalidInput("unknown preview".into()).into()
                                );
                            }
                        }
                        if let Some(old_id) = record.preview_id.clone() {
                            if let Err(err) =
                                previews::release_source_with(&repos, &old_id, &record.id)
                            {
                                tracing::warn!(
                                    "failed to release preview {old_id} from post {}: {err}",
                                    record.id
                                );
                            }
                        }
                        if let Some(new_id) = &next {
                            if let Err(err) = previews::claim_source_with(&repos, new_id, &record.id)
                            {
                                tracing::warn!(
                                    "failed to claim preview {new_id} for post {}: {err}",
                                    record.id
                                );
                            }
                        }
                        record.preview_id = next;
                    }
                }
                if let Some(title) = input.title.clone() {
                    record.title = clean_opt(Some(title));
                }
                if let Some(text) = input.text.clone() {
                    record.text = clean_opt(Some(text));
                }
                record.updated_at = Some(now_utc_iso());
                repos.posts().update_content(&record)?;
                if let Some(tags) = &input.tags {
                    repos.posts().set_tags(&record.id, tags)?;
                }
                if let Some(images) = &input.images {
                    repos.posts().set_images(&record.id, images)?;
                }
                let view = load_post_view(&repos, record)?;
                tx.commit()?;
                Ok(view)
            })
            .map_err(CoreError::from_anyhow)
    }

    /// Deletes the post and every transitive reply, then repoints each
    /// affected preview at its oldest surviving referrer.
    pub fn delete_post(&self, post_id: &str) -> CoreResult<usize> {
        self.database
            .with_repositories(|repos| {
                let tx = repos.conn().unchecked_transaction()?;
                if repos.posts().get(post_id)?.is_none() {
                    return Err(CoreError::NotFound("post not found".into()).into());
                }
                let tree = repos.posts().tree_with_previews(post_id)?;
                let removed = repos.posts().delete_tree(post_id)?;
                for (removed_id, preview_id) in &tree {
                    if let Some(preview_id) = preview_id {
                        if let Err(err) =
                            previews::release_source_with(&repos, preview_id, removed_id)
                        {
                            tracing::warn!(
                                "failed to release preview {preview_id} after deleting {removed_id}: {err}"
                            );
                        }
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn get_post(&self, post_id: &str) -> CoreResult<PostView> {
        self.database
            .with_repositories(|repos| {
                let record = repos
                    .posts()
                    .get(post_id)?
                    .ok_or_else(|| CoreError::NotFound("post not found".into()))?;
                load_post_view(&repos, record)
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn list_replies(&self, post_id: &str, page: Page) -> CoreResult<Vec<PostView>> {
        let (limit, offset) = page.limit_offset();
        self.database
            .with_repositories(|repos| {
                if repos.posts().get(post_id)?.is_none() {
                    return Err(CoreError::NotFound("post not found".into()).into());
                }
                let records = repos.posts().list_replies(post_id, limit, offset)?;
                load_views(&repos, records)
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn explore(&self, page: Page) -> CoreResult<Vec<PostView>> {
        let (limit, offset) = page.limit_offset();
        self.database
            .with_repositories(|repos| {
                let records = repos.posts().explore(limit, offset)?;
                load_views(&repos, records)
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn trending(&self, page: Page) -> CoreResult<Vec<PostView>> {
        let (limit, offset) = page.limit_offset();
        self.database
            .with_repositories(|repos| {
                let records = repos.posts().trending(limit, offset)?;
                load_views(&repos, records)
            })
            .map_err(CoreError::from_anyhow)
    }

    /// Substring search over title and text. An empty query short-circuits
    /// to an empty page without touching storage.
    pub fn search(&self, query: &str, page: Page) -> CoreResult<Vec<PostView>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let (limit, offset) = page.limit_offset();
        self.database
            .with_repositories(|repos| {
                let records = repos.posts().search(query, limit, offset)?;
                load_views(&repos, records)
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn popular_topics(&self) -> CoreResult<Vec<TopicView>> {
        self.database
            .with_repositories(|repos| {
                let tags = repos.posts().popular_tags(POPULAR_TOPICS_LIMIT)?;
                Ok(tags
                    .into_iter()
                    .map(|(tag, posts)| TopicView { tag, posts })
                    .collect())
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn all_topics(&self) -> CoreResult<Vec<String>> {
        self.database
            .with_repositories(|repos| repos.posts().all_tags())
            .map_err(CoreError::from_anyhow)
    }

    pub fn posts_by_topic(
        &self,
        tag: &str,
        period: Option<Period>,
        page: Page,
    ) -> CoreResult<Vec<PostView>> {
        let tag = tag.trim().to_string();
        if tag.is_empty() {
            return Err(CoreError::InvalidInput("topic is required".into()));
        }
        let since = period.map(Period::cutoff);
        let (limit, offset) = page.limit_offset();
        self.database
            .with_repositories(|repos| {
                let records = repos.posts().by_tag(&tag, since.as_deref(), limit, offset)?;
                load_views(&repos, records)
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn posts_by_user(&self, user_id: &str, page: Page) -> CoreResult<Vec<PostView>> {
        let (limit, offset) = page.limit_offset();
        self.database
            .with_repositories(|repos| {
                if repos.users().get(user_id)?.is_none() {
                    return Err(CoreError::NotFound("user not found".into()).into());
                }
                let records = repos.posts().by_author(user_id, limit, offset)?;
                load_views(&repos, records)
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn upvoted_posts(&self, user_id: &str, page: Page) -> CoreResult<Vec<PostView>> {
        self.voted_posts(user_id, 1, page)
    }

    pub fn downvoted_posts(&self, user_id: &str, page: Page) -> CoreResult<Vec<PostView>> {
        self.voted_posts(user_id, -1, page)
    }

    fn voted_posts(&self, user_id: &str, vote: i64, page: Page) -> CoreResult<Vec<PostView>> {
        let (limit, offset) = page.limit_offset();
        self.database
            .with_repositories(|repos| {
                if repos.users().get(user_id)?.is_none() {
                    return Err(CoreError::NotFound("user not found".into()).into());
                }
                let records = repos.posts().voted_by(user_id, vote, limit, offset)?;
                load_views(&repos, records)
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn bookmarked_posts(&self, user_id: &str, page: Page) -> CoreResult<Vec<PostView>> {
        let (limit, offset) = page.limit_offset();
        self.database
            .with_repositories(|repos| {
                if repos.users().get(user_id)?.is_none() {
                    return Err(CoreError::NotFound("user not found".into()).into());
                }
                let records = repos.posts().bookmarked_by(user_id, limit, offset)?;
                load_views(&repos, records)
            })
            .map_err(CoreError::from_anyhow)
    }
}
