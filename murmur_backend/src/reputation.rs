use crate::database::repositories::PostRepository;
use crate::database::Database;
use anyhow::Result;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs one reputation decay sweep and returns how many posts were touched.
///
/// Every post keeps two weight accumulators that collect the reputation of
/// voters since the previous sweep. The sweep folds them into the post's
/// reputation, then resets both, so each vote's weight is counted exactly
/// once no matter how many cycles follow it.
pub fn run_cycle(database: &Database) -> Result<usize> {
    database.with_repositories(|repos| repos.posts().decay_all_reputation())
}

/// Background loop driving `run_cycle` on a fixed interval. The first
/// interval tick fires immediately, so it is consumed before the loop to
/// avoid a sweep right at startup.
pub fn spawn_decay_task(database: Database, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match run_cycle(&database) {
                Ok(updated) => {
                    tracing::debug!("reputation decay cycle touched {updated} posts");
                }
                Err(err) => {
                    tracing::warn!("reputation decay cycle failed: {err}");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PostRecord, UserRecord};
    use crate::database::repositories::UserRepository;
    use rusqlite::Connection;

    fn setup_database() -> Database {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let database = Database::from_connection(conn, true);
        database.ensure_migrations().expect("migrations");
        database
            .with_repositories(|repos| {
                repos.users().create(&UserRecord {
                    id: "user-1".into(),
                    username: "alice".into(),
                    display_name: None,
                    balance: 0,
                    reputation: 1.0,
                    created_at: "2024-01-01T00:00:00+00:00".into(),
                })
            })
            .unwrap();
        database
    }

    fn seed_post(database: &Database, id: &str, reputation: f64, up: f64, down: f64) {
        database
            .with_repositories(|repos| {
                repos.posts().create(&PostRecord {
                    id: id.into(),
                    user_id: "user-1".into(),
                    replied_to: None,
                    title: Some("Title".into()),
                    text: None,
                    preview_id: None,
                    total_votes: 0,
                    reputation,
                    last_upvotes_weight: up,
                    last_downvotes_weight: down,
                    created_at: "2024-01-01T00:00:01+00:00".into(),
                    updated_at: None,
                })
            })
            .unwrap();
    }

    fn reputation_of(database: &Database, id: &str) -> (f64, f64, f64) {
        database
            .with_repositories(|repos| {
                let post = repos.posts().get(id)?.ok_or_else(|| anyhow::anyhow!("missing"))?;
                Ok((
                    post.reputation,
                    post.last_upvotes_weight,
                    post.last_downvotes_weight,
                ))
            })
            .unwrap()
    }

    #[test]
    fn cycle_folds_pending_weights_into_reputation() {
        let database = setup_database();
        seed_post(&database, "post-1", 10.0, 5.0, 2.0);

        let updated = run_cycle(&database).unwrap();
        assert_eq!(updated, 1);

        let (reputation, up, down) = reputation_of(&database, "post-1");
        assert!((reputation - 12.5).abs() < 1e-9);
        assert_eq!(up, 0.0);
        assert_eq!(down, 0.0);
    }

    #[test]
    fn cycle_collapses_posts_below_the_floor() {
        let database = setup_database();
        seed_post(&database, "low", 0.05, 100.0, 0.0);
        seed_post(&database, "at-floor", 0.1, 0.0, 0.0);

        run_cycle(&database).unwrap();

        let (low, _, _) = reputation_of(&database, "low");
        assert_eq!(low, 0.0);

        let (at_floor, _, _) = reputation_of(&database, "at-floor");
        assert!((at_floor - 0.098).abs() < 1e-9);
    }
}
