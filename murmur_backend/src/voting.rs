use crate::database::repositories::{
    NotificationGroupRepository, PostRepository, UserRepository, VoteRepository,
};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::utils::now_utc_iso;
use uuid::Uuid;

/// Vote, tip and bookmark mutations. Each mutation runs inside one SQLite
/// transaction so counters, weight accumulators, balances and notification
/// groups can never drift apart.
#[derive(Clone)]
pub struct VoteService {
    database: Database,
    admin_account_id: Option<String>,
}

impl VoteService {
    pub fn new(database: Database, admin_account_id: Option<String>) -> Self {
        Self {
            database,
            admin_account_id,
        }
    }

    pub fn upvote(&self, post_id: &str, voter_id: &str) -> CoreResult<()> {
        self.apply_vote(post_id, voter_id, 1)
    }

    pub fn downvote(&self, post_id: &str, voter_id: &str) -> CoreResult<()> {
        self.apply_vote(post_id, voter_id, -1)
    }

    /// Casts or flips a vote. A repeat vote in the same direction is a
    /// no-op, which is what keeps hammering the button from moving any
    /// counter, weight or balance twice.
    fn apply_vote(&self, post_id: &str, voter_id: &str, direction: i64) -> CoreResult<()> {
        let admin_account_id = self.admin_account_id.clone();
        self.database
            .with_repositories(|repos| {
                let tx = repos.conn().unchecked_transaction()?;
                let posts = repos.posts();
                let users = repos.users();
                let votes = repos.votes();

                let post = posts
                    .get(post_id)?
                    .ok_or_else(|| CoreError::NotFound("post not found".into()))?;
                let author = users
                    .get(&post.user_id)?
                    .ok_or_else(|| CoreError::NotFound("post author not found".into()))?;
                let voter = users
                    .get(voter_id)?
                    .ok_or_else(|| CoreError::NotFound("voter not found".into()))?;
                if voter.id == author.id {
                    return Err(CoreError::Forbidden(
                        "voting on your own post is not allowed".into(),
                    )
                    .into());
                }

                // Downvotes credit the configured admin account instead of
                // the author. The account is never created on the fly.
                let beneficiary_id = if direction > 0 {
                    author.id.clone()
                } else {
                    let admin_id = admin_account_id.as_deref().ok_or_else(|| {
                        CoreError::NotFound("admin account is not configured".into())
                    })?;
                    users
                        .get(admin_id)?
                        .ok_or_else(|| CoreError::NotFound("admin account not found".into()))?
                        .id
                };

                let previous = votes.vote_of(post_id, voter_id)?;
                if previous == Some(direction) {
                    tx.commit()?;
                    return Ok(());
                }
                let flipped = previous.is_some();
                let total_delta = if flipped { 2 * direction } else { direction };
                let (up_delta, down_delta) = if direction > 0 {
                    (
                        voter.reputation,
                        if flipped { -voter.reputation } else { 0.0 },
                    )
                } else {
                    (
                        if flipped { -voter.reputation } else { 0.0 },
                        voter.reputation,
                    )
                };

                let now = now_utc_iso();
                votes.set_vote(post_id, voter_id, direction, &now)?;
                posts.apply_vote_deltas(post_id, total_delta, up_delta, down_delta)?;
                users.adjust_balance(voter_id, -1)?;
                users.adjust_balance(&beneficiary_id, 1)?;
                if direction > 0 {
                    votes.increment_tip(post_id, voter_id)?;
                }
                let kind = if direction > 0 { "upvote" } else { "downvote" };
                repos.notification_groups().increment(
                    &Uuid::new_v4().to_string(),
                    post_id,
                    &author.id,
                    kind,
                    &now,
                )?;
                tx.commit()?;
                Ok(())
            })
            .map_err(CoreError::from_anyhow)
    }

    /// Transfers one coin from tipper to author and bumps the tipper's tips
    /// entry on the post. Unlike votes, tips stack.
    pub fn tip(&self, post_id: &str, tipper_id: &str) -> CoreResult<()> {
        self.database
            .with_repositories(|repos| {
                let tx = repos.conn().unchecked_transaction()?;
                let users = repos.users();

                let post = repos
                    .posts()
                    .get(post_id)?
                    .ok_or_else(|| CoreError::NotFound("post not found".into()))?;
                let author = users
                    .get(&post.user_id)?
                    .ok_or_else(|| CoreError::NotFound("post author not found".into()))?;
                let tipper = users
                    .get(tipper_id)?
                    .ok_or_else(|| CoreError::NotFound("user not found".into()))?;
                if tipper.id == author.id {
                    return Err(CoreError::Forbidden(
                        "tipping your own post is not allowed".into(),
                    )
                    .into());
                }

                users.adjust_balance(&tipper.id, -1)?;
                users.adjust_balance(&author.id, 1)?;
                repos.votes().increment_tip(post_id, &tipper.id)?;
                tx.commit()?;
                Ok(())
            })
            .map_err(CoreError::from_anyhow)
    }

    /// Toggles the user's bookmark on the post and returns the new state.
    pub fn toggle_bookmark(&self, post_id: &str, user_id: &str) -> CoreResult<bool> {
        self.database
            .with_repositories(|repos| {
                if repos.posts().get(post_id)?.is_none() {
                    return Err(CoreError::NotFound("post not found".into()).into());
                }
                if repos.users().get(user_id)?.is_none() {
                    return Err(CoreError::NotFound("user not found".into()).into());
                }
                let votes = repos.votes();
                if votes.is_bookmarked(post_id, user_id)? {
                    votes.remove_bookmark(post_id, user_id)?;
                    Ok(false)
                } else {
                    votes.add_bookmark(post_id, user_id, &now_utc_iso())?;
                    Ok(true)
                }
            })
            .map_err(CoreError::from_anyhow)
    }
}
