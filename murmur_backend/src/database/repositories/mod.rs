mod notifications;
mod posts;
mod previews;
mod users;
mod votes;

use super::models::{
    NotificationGroupRecord, PostRecord, PostVoteRecord, PreviewRecord, TipRecord, UserRecord,
    UserStatsRecord,
};
use anyhow::Result;
use rusqlite::Connection;

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn adjust_balance(&self, id: &str, delta: i64) -> Result<()>;
    fn stats(&self, id: &str) -> Result<UserStatsRecord>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    /// Rewrites the editable columns only; vote counters and weight
    /// accumulators are never touched by content edits.
    fn update_content(&self, record: &PostRecord) -> Result<()>;
    /// Deletes the post and every transitive reply in one statement.
    fn delete_tree(&self, root_id: &str) -> Result<usize>;
    /// The post plus all transitive replies, each paired with its preview id.
    fn tree_with_previews(&self, root_id: &str) -> Result<Vec<(String, Option<String>)>>;
    fn reply_ids(&self, post_id: &str) -> Result<Vec<String>>;
    fn list_replies(&self, post_id: &str, limit: usize, offset: usize) -> Result<Vec<PostRecord>>;
    fn explore(&self, limit: usize, offset: usize) -> Result<Vec<PostRecord>>;
    fn trending(&self, limit: usize, offset: usize) -> Result<Vec<PostRecord>>;
    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<PostRecord>>;
    fn by_tag(
        &self,
        tag: &str,
        since: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostRecord>>;
    fn by_author(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<PostRecord>>;
    fn voted_by(
        &self,
        user_id: &str,
        vote: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostRecord>>;
    fn bookmarked_by(&self, user_id: &str, limit: usize, offset: usize)
        -> Result<Vec<PostRecord>>;
    fn set_tags(&self, post_id: &str, tags: &[String]) -> Result<()>;
    fn tags_for(&self, post_id: &str) -> Result<Vec<String>>;
    fn set_images(&self, post_id: &str, images: &[String]) -> Result<()>;
    fn images_for(&self, post_id: &str) -> Result<Vec<String>>;
    /// Returns (tag, post count) pairs, most used first.
    fn popular_tags(&self, limit: usize) -> Result<Vec<(String, i64)>>;
    fn all_tags(&self) -> Result<Vec<String>>;
    fn apply_vote_deltas(
        &self,
        post_id: &str,
        total_delta: i64,
        up_weight_delta: f64,
        down_weight_delta: f64,
    ) -> Result<()>;
    /// One bulk sweep over every post: posts at or above the 0.1 floor fold
    /// their pending weight deltas into reputation, the rest drop to zero,
    /// and both accumulators reset. Returns the number of rows touched.
    fn decay_all_reputation(&self) -> Result<usize>;
}

pub trait VoteRepository {
    fn vote_of(&self, post_id: &str, user_id: &str) -> Result<Option<i64>>;
    /// Upserts the single (post, user) vote row. Replacing the row is what
    /// keeps a user out of both direction sets at once.
    fn set_vote(&self, post_id: &str, user_id: &str, vote: i64, created_at: &str) -> Result<()>;
    fn votes_for_post(&self, post_id: &str) -> Result<Vec<PostVoteRecord>>;
    fn increment_tip(&self, post_id: &str, user_id: &str) -> Result<()>;
    fn tips_for_post(&self, post_id: &str) -> Result<Vec<TipRecord>>;
    fn is_bookmarked(&self, post_id: &str, user_id: &str) -> Result<bool>;
    fn add_bookmark(&self, post_id: &str, user_id: &str, created_at: &str) -> Result<()>;
    fn remove_bookmark(&self, post_id: &str, user_id: &str) -> Result<()>;
    fn bookmarkers_for_post(&self, post_id: &str) -> Result<Vec<String>>;
}

pub trait PreviewRepository {
    fn create(&self, record: &PreviewRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PreviewRecord>>;
    /// Lookup by canonical URL or any recorded alias.
    fn find_by_url_or_alias(&self, url: &str) -> Result<Option<PreviewRecord>>;
    fn add_alias(&self, preview_id: &str, url: &str) -> Result<()>;
    fn aliases_for(&self, preview_id: &str) -> Result<Vec<String>>;
    fn set_source_post(&self, preview_id: &str, post_id: Option<&str>) -> Result<()>;
    /// Oldest post (by creation time) still referencing the preview,
    /// optionally excluding one post id.
    fn oldest_referencing_post(
        &self,
        preview_id: &str,
        exclude_post_id: Option<&str>,
    ) -> Result<Option<String>>;
}

pub trait NotificationGroupRepository {
    /// Bumps the (post, kind) group counter, creating the group with the
    /// supplied id and recipient when it does not exist yet.
    fn increment(
        &self,
        id: &str,
        post_id: &str,
        user_id: &str,
        kind: &str,
        created_at: &str,
    ) -> Result<()>;
    fn list_for_user(&self, user_id: &str) -> Result<Vec<NotificationGroupRecord>>;
    fn get_for_post(&self, post_id: &str, kind: &str) -> Result<Option<NotificationGroupRecord>>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn votes(&self) -> impl VoteRepository + '_ {
        votes::SqliteVoteRepository { conn: self.conn }
    }

    pub fn previews(&self) -> impl PreviewRepository + '_ {
        previews::SqlitePreviewRepository { conn: self.conn }
    }

    pub fn notification_groups(&self) -> impl NotificationGroupRepository + '_ {
        notifications::SqliteNotificationGroupRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}
