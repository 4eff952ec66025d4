use crate::database::models::{NotificationGroupRecord, UserRecord, UserStatsRecord};
use crate::database::repositories::{NotificationGroupRepository, UserRepository};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserInput {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub balance: i64,
    pub reputation: f64,
    pub created_at: String,
}

impl UserView {
    pub(crate) fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            display_name: record.display_name,
            balance: record.balance,
            reputation: record.reputation,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsView {
    pub total_posts: i64,
    pub bookmarks_count: i64,
    pub upvotes_count: i64,
    pub downvotes_count: i64,
    pub tips_count: i64,
}

impl UserStatsView {
    fn from_record(record: UserStatsRecord) -> Self {
        Self {
            total_posts: record.total_posts,
            bookmarks_count: record.bookmarks_count,
            upvotes_count: record.upvotes_count,
            downvotes_count: record.downvotes_count,
            tips_count: record.tips_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGroupView {
    pub id: String,
    pub post: String,
    pub user: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub count: i64,
    pub created_at: String,
}

impl NotificationGroupView {
    fn from_record(record: NotificationGroupRecord) -> Self {
        Self {
            id: record.id,
            post: record.post_id,
            user: record.user_id,
            kind: record.kind,
            count: record.count,
            created_at: record.created_at,
        }
    }
}

/// Account registration and profile lookups. New accounts start with the
/// configured balance and a reputation of 1.0, which is what makes a fresh
/// account's votes carry weight at all.
#[derive(Clone)]
pub struct UserService {
    database: Database,
    starting_balance: i64,
}

impl UserService {
    pub fn new(database: Database, starting_balance: i64) -> Self {
        Self {
            database,
            starting_balance,
        }
    }

    pub fn register(&self, input: RegisterUserInput) -> CoreResult<UserView> {
        let username = input.username.trim().to_string();
        if username.is_empty() {
            return Err(CoreError::InvalidInput("username is required".into()));
        }
        let display_name = input
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string);
        let starting_balance = self.starting_balance;

        self.database
            .with_repositories(|repos| {
                let users = repos.users();
                if users.find_by_username(&username)?.is_some() {
                    return Err(
                        CoreError::InvalidInput("username is already taken".into()).into()
                    );
                }
                let record = UserRecord {
                    id: Uuid::new_v4().to_string(),
                    username: username.clone(),
                    display_name: display_name.clone(),
                    balance: starting_balance,
                    reputation: 1.0,
                    created_at: now_utc_iso(),
                };
                users.create(&record)?;
                Ok(UserView::from_record(record))
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn get_user(&self, user_id: &str) -> CoreResult<UserView> {
        self.database
            .with_repositories(|repos| {
                let record = repos
                    .users()
                    .get(user_id)?
                    .ok_or_else(|| CoreError::NotFound("user not found".into()))?;
                Ok(UserView::from_record(record))
            })
            .map_err(CoreError::from_anyhow)
    }

    pub fn stats(&self, user_id: &str) -> CoreResult<UserStatsView> {
        self.database
            .with_repositories(|repos| {
                if repos.users().get(user_id)?.is_none() {
                    return Err(CoreError::NotFound("user not found".into()).into());
                }
                let record = repos.users().stats(user_id)?;
                Ok(UserStatsView::from_record(record))
            })
            .map_err(CoreError::from_anyhow)
    }

    /// Grouped notifications, most recent activity first. One group per
    /// (post, kind) pair, so a burst of upvotes reads as a single line.
    pub fn notifications(&self, user_id: &str) -> CoreResult<Vec<NotificationGroupView>> {
        self.database
            .with_repositories(|repos| {
                if repos.users().get(user_id)?.is_none() {
                    return Err(CoreError::NotFound("user not found".into()).into());
                }
                let records = repos.notification_groups().list_for_user(user_id)?;
                Ok(records
                    .into_iter()
                    .map(NotificationGroupView::from_record)
                    .collect())
            })
            .map_err(CoreError::from_anyhow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::PostRecord;
    use crate::database::repositories::PostRepository;
    use rusqlite::Connection;

    fn setup_service() -> UserService {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let database = Database::from_connection(conn, true);
        database.ensure_migrations().expect("migrations");
        UserService::new(database, 250)
    }

    #[test]
    fn register_seeds_balance_and_reputation() {
        let service = setup_service();
        let user = service
            .register(RegisterUserInput {
                username: "alice".into(),
                display_name: Some("Alice".into()),
            })
            .unwrap();

        assert_eq!(user.balance, 250);
        assert_eq!(user.reputation, 1.0);

        let fetched = service.get_user(&user.id).unwrap();
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn register_rejects_duplicate_username() {
        let service = setup_service();
        service
            .register(RegisterUserInput {
                username: "alice".into(),
                display_name: None,
            })
            .unwrap();

        let err = service
            .register(RegisterUserInput {
                username: "Alice".into(),
                display_name: None,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn register_rejects_blank_username() {
        let service = setup_service();
        let err = service
            .register(RegisterUserInput {
                username: "   ".into(),
                display_name: None,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn stats_start_at_zero_and_require_a_user() {
        let service = setup_service();
        let user = service
            .register(RegisterUserInput {
                username: "alice".into(),
                display_name: None,
            })
            .unwrap();

        let stats = service.stats(&user.id).unwrap();
        assert_eq!(stats.total_posts, 0);
        assert_eq!(stats.upvotes_count, 0);
        assert_eq!(stats.tips_count, 0);

        let err = service.stats("missing").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn notifications_group_by_kind_and_list_newest_first() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let database = Database::from_connection(conn, true);
        database.ensure_migrations().expect("migrations");
        let service = UserService::new(database.clone(), 0);

        let user = service
            .register(RegisterUserInput {
                username: "alice".into(),
                display_name: None,
            })
            .unwrap();
        database
            .with_repositories(|repos| {
                repos.posts().create(&PostRecord {
                    id: "post-1".into(),
                    user_id: user.id.clone(),
                    replied_to: None,
                    title: Some("hello".into()),
                    text: None,
                    preview_id: None,
                    total_votes: 0,
                    reputation: 1.0,
                    last_upvotes_weight: 0.0,
                    last_downvotes_weight: 0.0,
                    created_at: "2024-01-01T00:00:00+00:00".into(),
                    updated_at: None,
                })?;
                let groups = repos.notification_groups();
                groups.increment("n-1", "post-1", &user.id, "upvote", "2024-01-01T10:00:00+00:00")?;
                groups.increment("n-2", "post-1", &user.id, "comment", "2024-01-02T10:00:00+00:00")?;
                groups.increment("n-3", "post-1", &user.id, "upvote", "2024-01-03T10:00:00+00:00")
            })
            .unwrap();

        let groups = service.notifications(&user.id).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, "upvote");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[1].kind, "comment");
        assert_eq!(groups[1].count, 1);

        let err = service.notifications("missing").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
