use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use murmur_backend::config::{MurmurConfig, MurmurPaths};
use murmur_backend::events::{EventBus, EventPayload};
use murmur_backend::users::{RegisterUserInput, UserService};
use murmur_backend::{api, bootstrap, reputation};
use serde_json::{json, Value};
use std::collections::HashMap;
use tempfile::tempdir;
use tokio::time::{sleep, timeout, Duration};

fn next_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .unwrap()
        .port()
}

async fn wait_for_health(base_url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("server did not become healthy in time");
}

/// Stand-in for the metadata extraction service: every URL on
/// example.com resolves to the same canonical article.
async fn metadata_stub(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let requested = params.get("url").cloned().unwrap_or_default();
    Json(json!({
        "meta": {
            "title": "Example &amp; Friends",
            "description": format!("Scraped from {requested}"),
            "site": "Example",
            "canonical": "https://example.com/article"
        },
        "links": {
            "icon": [{"href": "https://example.com/favicon.ico"}],
            "thumbnail": [{"href": "https://example.com/thumb.png"}]
        }
    }))
}

async fn spawn_metadata_stub() -> (String, tokio::task::JoinHandle<()>) {
    let router = Router::new().route("/iframely", get(metadata_stub));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind metadata stub");
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    (format!("http://127.0.0.1:{port}/iframely"), handle)
}

async fn get_json(client: &reqwest::Client, url: String) -> Value {
    client
        .get(url)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body")
}

async fn post_json(client: &reqwest::Client, url: String, body: Value) -> Value {
    client
        .post(url)
        .json(&body)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body")
}

fn id_of(value: &Value) -> String {
    value
        .get("id")
        .and_then(|id| id.as_str())
        .expect("id field")
        .to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rest_roundtrip_covers_posting_voting_and_previews() {
    let temp = tempdir().expect("tempdir");
    let port = next_port();
    let (metadata_url, metadata_task) = spawn_metadata_stub().await;

    let mut config = MurmurConfig::new(
        port,
        MurmurPaths::from_base_dir(temp.path()).expect("paths"),
    );
    config.metadata.endpoint = metadata_url;
    config.metadata.api_key = None;
    config.starting_balance = 10;

    let resources = bootstrap::initialize(&config).expect("bootstrap");
    let database = resources.database.clone();

    // The downvote sink account is seeded out of band, never via the API.
    let admin = UserService::new(database.clone(), 0)
        .register(RegisterUserInput {
            username: "admin".into(),
            display_name: None,
        })
        .expect("register admin");
    config.admin_account_id = Some(admin.id.clone());

    let events = EventBus::default();
    let mut new_posts = events.subscribe();

    let server_config = config.clone();
    let server_database = database.clone();
    let server_events = events.clone();
    let server = tokio::spawn(async move {
        let _ = api::serve_http(server_config, server_database, server_events).await;
    });

    let base_url = format!("http://127.0.0.1:{port}/api");
    wait_for_health(&base_url).await;

    let client = reqwest::Client::new();

    let alice = post_json(
        &client,
        format!("{base_url}/users"),
        json!({"username": "alice"}),
    )
    .await;
    let alice_id = id_of(&alice);
    assert_eq!(alice["balance"], json!(10));
    assert_eq!(alice["reputation"], json!(1.0));

    let bob = post_json(
        &client,
        format!("{base_url}/users"),
        json!({"username": "bob", "displayName": "Bob"}),
    )
    .await;
    let bob_id = id_of(&bob);

    // Two spellings of the same link share one preview row.
    let preview = post_json(
        &client,
        format!("{base_url}/previews/resolve"),
        json!({"url": "https://example.com/article?utm_source=mail"}),
    )
    .await;
    let preview_id = id_of(&preview);
    assert_eq!(preview["url"], json!("https://example.com/article"));
    assert_eq!(preview["title"], json!("Example & Friends"));
    assert_eq!(
        preview["canonicals"],
        json!(["https://example.com/article?utm_source=mail"])
    );

    let again = post_json(
        &client,
        format!("{base_url}/previews/resolve"),
        json!({"url": "https://example.com/article"}),
    )
    .await;
    assert_eq!(id_of(&again), preview_id);

    let invalid = client
        .post(format!("{base_url}/previews/resolve"))
        .json(&json!({"url": "not a url at all"}))
        .send()
        .await
        .expect("resolve invalid");
    assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);

    let post = post_json(
        &client,
        format!("{base_url}/posts"),
        json!({
            "userId": alice_id,
            "title": "Shared link",
            "text": "worth reading",
            "previewId": preview_id,
            "tags": ["reading"]
        }),
    )
    .await;
    let post_id = id_of(&post);
    assert_eq!(post["user"]["username"], json!("alice"));
    assert_eq!(post["preview"]["sourcePost"], json!(post_id.clone()));
    assert_eq!(post["tags"], json!(["reading"]));

    let event = timeout(Duration::from_secs(2), new_posts.recv())
        .await
        .expect("event in time")
        .expect("event received");
    match event {
        EventPayload::NewPost(event) => assert_eq!(event.post_id, post_id),
    }

    let missing = client
        .get(format!("{base_url}/posts/nope"))
        .send()
        .await
        .expect("get missing post");
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    // Bob upvotes: one balance point moves to the author, the vote weight
    // lands in the pending accumulator, and the tip ledger opens at one.
    let upvoted = post_json(
        &client,
        format!("{base_url}/posts/{post_id}/upvote"),
        json!({"userId": bob_id}),
    )
    .await;
    assert_eq!(upvoted["totalVotes"], json!(1));
    assert_eq!(upvoted["upvotes"], json!([bob_id.clone()]));
    assert_eq!(upvoted["lastUpvotesWeight"], json!(1.0));
    assert_eq!(upvoted["tips"][&bob_id], json!(1));

    // Repeating the same vote changes nothing.
    let repeated = post_json(
        &client,
        format!("{base_url}/posts/{post_id}/upvote"),
        json!({"userId": bob_id}),
    )
    .await;
    assert_eq!(repeated["totalVotes"], json!(1));

    let self_vote = client
        .post(format!("{base_url}/posts/{post_id}/upvote"))
        .json(&json!({"userId": alice_id}))
        .send()
        .await
        .expect("self vote");
    assert_eq!(self_vote.status(), reqwest::StatusCode::FORBIDDEN);

    let ghost_vote = client
        .post(format!("{base_url}/posts/{post_id}/upvote"))
        .json(&json!({"userId": "ghost"}))
        .send()
        .await
        .expect("ghost vote");
    assert_eq!(ghost_vote.status(), reqwest::StatusCode::NOT_FOUND);

    // Flipping to a downvote swings the total by two and moves the pending
    // weight to the other side.
    let flipped = post_json(
        &client,
        format!("{base_url}/posts/{post_id}/downvote"),
        json!({"userId": bob_id}),
    )
    .await;
    assert_eq!(flipped["totalVotes"], json!(-1));
    assert_eq!(flipped["upvotes"], json!([]));
    assert_eq!(flipped["downvotes"], json!([bob_id.clone()]));
    assert_eq!(flipped["lastUpvotesWeight"], json!(0.0));
    assert_eq!(flipped["lastDownvotesWeight"], json!(1.0));

    let tipped = post_json(
        &client,
        format!("{base_url}/posts/{post_id}/tip"),
        json!({"userId": bob_id}),
    )
    .await;
    assert_eq!(tipped["tips"][&bob_id], json!(2));

    // Upvote paid alice, the downvote paid the admin sink, the tip paid
    // alice again; bob footed all three bills.
    let alice_now = get_json(&client, format!("{base_url}/users/{alice_id}")).await;
    assert_eq!(alice_now["balance"], json!(12));
    let bob_now = get_json(&client, format!("{base_url}/users/{bob_id}")).await;
    assert_eq!(bob_now["balance"], json!(7));
    let admin_now = get_json(&client, format!("{base_url}/users/{}", admin.id)).await;
    assert_eq!(admin_now["balance"], json!(1));

    let marked = post_json(
        &client,
        format!("{base_url}/posts/{post_id}/bookmark"),
        json!({"userId": bob_id}),
    )
    .await;
    assert_eq!(marked["bookmarked"], json!(true));
    let unmarked = post_json(
        &client,
        format!("{base_url}/posts/{post_id}/bookmark"),
        json!({"userId": bob_id}),
    )
    .await;
    assert_eq!(unmarked["bookmarked"], json!(false));
    post_json(
        &client,
        format!("{base_url}/posts/{post_id}/bookmark"),
        json!({"userId": bob_id}),
    )
    .await;

    let bookmarks = get_json(&client, format!("{base_url}/users/{bob_id}/bookmarks")).await;
    assert_eq!(bookmarks[0]["id"], json!(post_id.clone()));

    let reply = post_json(
        &client,
        format!("{base_url}/posts/{post_id}/replies"),
        json!({"userId": bob_id, "text": "counterpoint"}),
    )
    .await;
    let reply_id = id_of(&reply);
    let parent = get_json(&client, format!("{base_url}/posts/{post_id}")).await;
    assert_eq!(parent["replies"], json!([reply_id.clone()]));

    let listed = get_json(&client, format!("{base_url}/posts/{post_id}/replies")).await;
    assert_eq!(listed[0]["id"], json!(reply_id.clone()));

    // Alice has been upvoted, downvoted and replied to: three groups.
    let groups = get_json(
        &client,
        format!("{base_url}/users/{alice_id}/notifications"),
    )
    .await;
    let kinds: Vec<&str> = groups
        .as_array()
        .expect("groups array")
        .iter()
        .map(|group| group["type"].as_str().expect("kind"))
        .collect();
    assert_eq!(kinds.len(), 3);
    assert!(kinds.contains(&"upvote"));
    assert!(kinds.contains(&"downvote"));
    assert!(kinds.contains(&"comment"));

    let explore = get_json(&client, format!("{base_url}/feeds/explore")).await;
    assert_eq!(explore.as_array().expect("explore array").len(), 1);
    let trending = get_json(&client, format!("{base_url}/feeds/trending")).await;
    assert_eq!(trending[0]["id"], json!(post_id.clone()));
    let found = get_json(&client, format!("{base_url}/feeds/search?q=shared")).await;
    assert_eq!(found.as_array().expect("search array").len(), 1);

    let topics = get_json(&client, format!("{base_url}/topics")).await;
    assert_eq!(topics, json!(["reading"]));
    let popular = get_json(&client, format!("{base_url}/topics/popular")).await;
    assert_eq!(popular[0]["tag"], json!("reading"));
    assert_eq!(popular[0]["posts"], json!(1));
    let tagged = get_json(&client, format!("{base_url}/topics/reading/posts")).await;
    assert_eq!(tagged.as_array().expect("topic posts").len(), 1);
    let bad_period = client
        .get(format!("{base_url}/topics/reading/posts?period=decade"))
        .send()
        .await
        .expect("bad period");
    assert_eq!(bad_period.status(), reqwest::StatusCode::BAD_REQUEST);

    let alice_stats = get_json(&client, format!("{base_url}/users/{alice_id}/stats")).await;
    assert_eq!(alice_stats["totalPosts"], json!(1));
    let bob_stats = get_json(&client, format!("{base_url}/users/{bob_id}/stats")).await;
    assert_eq!(bob_stats["totalPosts"], json!(1));
    assert_eq!(bob_stats["bookmarksCount"], json!(1));
    assert_eq!(bob_stats["downvotesCount"], json!(1));
    assert_eq!(bob_stats["upvotesCount"], json!(0));
    assert_eq!(bob_stats["tipsCount"], json!(2));

    // One decay sweep folds the pending downvote weight into reputation.
    let touched = reputation::run_cycle(&database).expect("decay cycle");
    assert_eq!(touched, 2);
    let decayed = get_json(&client, format!("{base_url}/posts/{post_id}")).await;
    let reputation_now = decayed["reputation"].as_f64().expect("reputation");
    assert!((reputation_now - 0.08).abs() < 1e-9);
    assert_eq!(decayed["lastDownvotesWeight"], json!(0.0));

    let deleted: Value = client
        .delete(format!("{base_url}/posts/{post_id}"))
        .send()
        .await
        .expect("delete post")
        .json()
        .await
        .expect("delete json");
    assert_eq!(deleted["removed"], json!(2));

    let gone = client
        .get(format!("{base_url}/posts/{post_id}"))
        .send()
        .await
        .expect("get deleted post");
    assert_eq!(gone.status(), reqwest::StatusCode::NOT_FOUND);

    // With its last referrer gone the preview survives, unattributed.
    let orphaned = get_json(&client, format!("{base_url}/previews/{preview_id}")).await;
    assert!(orphaned.get("sourcePost").is_none());

    // Deleting the post also swept alice's notification groups away.
    let groups = get_json(
        &client,
        format!("{base_url}/users/{alice_id}/notifications"),
    )
    .await;
    assert_eq!(groups.as_array().expect("groups array").len(), 0);

    let explore = get_json(&client, format!("{base_url}/feeds/explore")).await;
    assert_eq!(explore.as_array().expect("explore array").len(), 0);

    server.abort();
    let _ = server.await;
    metadata_task.abort();
    let _ = metadata_task.await;
}
