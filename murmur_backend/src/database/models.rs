use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub balance: i64,
    /// Vote weight folded into post weight accumulators on every vote.
    pub reputation: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub user_id: String,
    pub replied_to: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub preview_id: Option<String>,
    pub total_votes: i64,
    pub reputation: f64,
    pub last_upvotes_weight: f64,
    pub last_downvotes_weight: f64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRecord {
    pub id: String,
    /// Canonical URL. Every other observed spelling lives in preview_aliases.
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
    pub favicon: Option<String>,
    pub image: Option<String>,
    pub youtube_id: Option<String>,
    pub source_post_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostVoteRecord {
    pub post_id: String,
    pub user_id: String,
    /// +1 for an upvote, -1 for a downvote.
    pub vote: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipRecord {
    pub post_id: String,
    pub user_id: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationGroupRecord {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub kind: String,
    pub count: i64,
    pub created_at: String,
}

/// Aggregate counters backing the per-user stats endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStatsRecord {
    pub total_posts: i64,
    pub bookmarks_count: i64,
    pub upvotes_count: i64,
    pub downvotes_count: i64,
    pub tips_count: i64,
}
