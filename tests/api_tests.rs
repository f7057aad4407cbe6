// tests/api_tests.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use timeline::{
    cache::{CacheError, CacheKey, CacheStore, MemoryCache},
    config::{CacheSettings, Config},
    dao::memory::MemorySource,
    models::{comment::ReactionState, post::Visibility},
    routes,
    services::LooseService,
    state::AppState,
    utils::jwt::sign_jwt,
};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    source: Arc<MemorySource>,
}

/// Spawns the app on a random port, backed by `source` and `store`.
async fn spawn_app_with(source: Arc<MemorySource>, store: Arc<dyn CacheStore>) -> TestApp {
    let config = Config {
        database_url: String::new(),
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
        cache: CacheSettings::default(),
    };

    let state = AppState {
        service: Arc::new(LooseService::new(
            source.clone(),
            store,
            config.cache.clone(),
        )),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp { address, source }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(seeded(), Arc::new(MemoryCache::new(256))).await
}

/// alice(1) and bob(2) are friends, carol(3) follows bob, root(9) is an admin.
fn seeded() -> Arc<MemorySource> {
    let source = Arc::new(MemorySource::new());
    source
        .add_user(1, "alice")
        .add_user(2, "bob")
        .add_user(3, "carol")
        .add_admin(9, "root")
        .befriend(1, 2)
        .follow(3, 2)
        .add_post(10, 2, Visibility::Public, "bob in public")
        .add_post(11, 2, Visibility::Friend, "bob to friends")
        .add_post(12, 2, Visibility::Following, "bob to followers")
        .add_post(13, 2, Visibility::Private, "bob alone")
        .add_post(14, 1, Visibility::Public, "alice in public")
        .tag_post(14, "rust")
        .mark_essence(10);
    source
}

fn token(id: i64, username: &str, role: &str) -> String {
    sign_jwt(id, username, role, SECRET, 600).unwrap()
}

async fn get(app: &TestApp, path: &str, bearer: Option<&str>) -> (u16, String) {
    let mut request = reqwest::Client::new().get(format!("{}{}", app.address, path));
    if let Some(bearer) = bearer {
        request = request.bearer_auth(bearer);
    }
    let response = request.send().await.expect("Failed to execute request");
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

async fn get_json(app: &TestApp, path: &str, bearer: Option<&str>) -> Value {
    let (status, body) = get(app, path, bearer).await;
    assert_eq!(status, 200, "{}", body);
    serde_json::from_str(&body).unwrap()
}

fn ids(body: &Value) -> Vec<i64> {
    body["data"]["list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;
    let (status, _) = get(&app, "/random_path_that_does_not_exist", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn anonymous_index_read_is_cached() {
    let app = spawn_app().await;
    let path = "/v1/posts?style=newest&page=1&page_size=20";

    let (status, first) = get(&app, path, None).await;
    assert_eq!(status, 200);
    let queries = app.source.query_count();

    // A hit must not touch the source, even after the source changed.
    app.source.delete_post(14);
    let (status, second) = get(&app, path, None).await;

    assert_eq!(status, 200);
    assert_eq!(first, second);
    assert_eq!(app.source.query_count(), queries);

    let body: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "success");
    assert_eq!(ids(&body), vec![14, 10]);
    assert_eq!(
        body["data"]["pager"],
        serde_json::json!({ "page": 1, "page_size": 20, "total_rows": 2 })
    );
}

#[tokio::test]
async fn index_pages_are_cached_per_viewer() {
    let app = spawn_app().await;
    let path = "/v1/posts?style=newest";

    get_json(&app, path, None).await;
    let queries = app.source.query_count();

    get_json(&app, path, Some(&token(1, "alice", "user"))).await;
    assert!(app.source.query_count() > queries);
}

#[tokio::test]
async fn following_without_viewer_falls_back_to_newest() {
    let app = spawn_app().await;

    let following = get_json(&app, "/v1/posts?style=following", None).await;
    let newest = get_json(&app, "/v1/posts?style=newest", None).await;

    assert_eq!(following["code"], 0);
    assert_eq!(ids(&following), ids(&newest));
}

#[tokio::test]
async fn following_feed_shows_what_followers_may_see() {
    let app = spawn_app().await;

    let carol = get_json(
        &app,
        "/v1/posts?style=following",
        Some(&token(3, "carol", "user")),
    )
    .await;
    assert_eq!(ids(&carol), vec![12, 10]);

    let alice = get_json(
        &app,
        "/v1/posts?style=following",
        Some(&token(1, "alice", "user")),
    )
    .await;
    assert_eq!(ids(&alice), vec![14, 11, 10]);
}

#[tokio::test]
async fn friend_who_also_follows_reads_following_only_posts() {
    let app = spawn_app().await;
    app.source.follow(1, 2);
    let alice = token(1, "alice", "user");

    let detail = get_json(&app, "/v1/post?id=12", Some(&alice)).await;
    assert_eq!(detail["code"], 0);
    assert_eq!(detail["data"]["id"], 12);

    let feed = get_json(&app, "/v1/posts?style=following", Some(&alice)).await;
    assert_eq!(ids(&feed), vec![14, 12, 11, 10]);
    assert_eq!(feed["data"]["pager"]["total_rows"], 4);
}

#[tokio::test]
async fn hidden_post_detail_is_denied_not_missing() {
    let app = spawn_app().await;

    let guest = get_json(&app, "/v1/post?id=11", None).await;
    assert_eq!(guest["code"], 30003);

    let missing = get_json(&app, "/v1/post?id=404", None).await;
    assert_eq!(missing["code"], 30010);

    let friend = get_json(&app, "/v1/post?id=11", Some(&token(1, "alice", "user"))).await;
    assert_eq!(friend["code"], 0);
    assert_eq!(friend["data"]["id"], 11);
    assert_eq!(friend["data"]["user"]["username"], "bob");
    assert_eq!(friend["data"]["user"]["is_friend"], true);

    let admin = get_json(&app, "/v1/post?id=13", Some(&token(9, "root", "admin"))).await;
    assert_eq!(admin["code"], 0);
}

#[tokio::test]
async fn user_posts_follow_the_viewer_relation() {
    let app = spawn_app().await;
    let path = "/v1/user/posts?username=bob&style=post";

    let guest = get_json(&app, path, None).await;
    assert_eq!(ids(&guest), vec![10]);

    let friend = get_json(&app, path, Some(&token(1, "alice", "user"))).await;
    assert_eq!(ids(&friend), vec![11, 10]);

    let follower = get_json(&app, path, Some(&token(3, "carol", "user"))).await;
    assert_eq!(ids(&follower), vec![12, 10]);

    let owner = get_json(&app, path, Some(&token(2, "bob", "user"))).await;
    assert_eq!(ids(&owner), vec![13, 12, 11, 10]);

    let highlights = get_json(&app, "/v1/user/posts?username=bob&style=highlight", None).await;
    assert_eq!(ids(&highlights), vec![10]);
}

#[tokio::test]
async fn pinned_posts_lead_the_user_page() {
    let app = spawn_app().await;
    app.source.pin_to_top(10);

    let owner = get_json(
        &app,
        "/v1/user/posts?username=bob&style=post",
        Some(&token(2, "bob", "user")),
    )
    .await;
    assert_eq!(ids(&owner), vec![10, 13, 12, 11]);
}

#[tokio::test]
async fn guests_share_relation_scoped_user_pages() {
    let app = spawn_app().await;
    let path = "/v1/user/posts?username=bob&style=post";

    get_json(&app, path, None).await;
    let after_first = app.source.query_count();

    // dave has no ties to bob: a guest, served from the guest entry after
    // relation resolution.
    get_json(&app, path, Some(&token(4, "dave", "user"))).await;
    let lookups = app.source.query_count() - after_first;

    // username lookup, is_friend, is_following
    assert_eq!(lookups, 3);
}

#[tokio::test]
async fn stars_are_listed_for_the_starring_user() {
    let app = spawn_app().await;
    app.source.star(3, 10).star(3, 14);

    let stars = get_json(&app, "/v1/user/posts?username=carol&style=star", None).await;
    assert_eq!(ids(&stars), vec![14, 10]);
}

#[tokio::test]
async fn media_listing_only_returns_posts_with_media() {
    let app = spawn_app().await;
    app.source
        .add_post(20, 2, Visibility::Public, "look")
        .add_content(20, timeline::models::post::ContentType::Image, "https://img/1.png");

    let media = get_json(&app, "/v1/user/posts?username=bob&style=media", None).await;
    assert_eq!(ids(&media), vec![20]);
}

#[tokio::test]
async fn unknown_user_and_unknown_style_have_their_own_codes() {
    let app = spawn_app().await;

    let unknown_user = get_json(&app, "/v1/user/posts?username=nobody", None).await;
    assert_eq!(unknown_user["code"], 20008);

    let unknown_style = get_json(&app, "/v1/user/posts?username=bob&style=likes", None).await;
    assert_eq!(unknown_style["code"], 30006);

    let unknown_index = get_json(&app, "/v1/posts?style=trending", None).await;
    assert_eq!(unknown_index["code"], 30006);
}

#[tokio::test]
async fn out_of_range_page_size_is_rejected() {
    let app = spawn_app().await;
    let (status, body) = get(&app, "/v1/posts?page_size=500", None).await;

    assert_eq!(status, 400);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["code"], 10001);
}

#[tokio::test]
async fn comment_thread_carries_the_viewers_votes() {
    let app = spawn_app().await;
    app.source
        .add_comment(100, 10, 3, "nice")
        .add_reply(1000, 100, 2, Some(3), "thanks")
        .add_reply(1001, 100, 3, None, "np")
        .react_comment(
            1,
            100,
            None,
            ReactionState {
                is_upvoted: false,
                is_downvoted: true,
            },
        )
        .react_comment(
            1,
            100,
            Some(1001),
            ReactionState {
                is_upvoted: true,
                is_downvoted: false,
            },
        );

    let body = get_json(
        &app,
        "/v1/post/comments?id=10&style=default",
        Some(&token(1, "alice", "user")),
    )
    .await;

    let comment = &body["data"]["list"][0];
    assert_eq!(comment["is_downvoted"], true);
    assert_eq!(comment["is_upvoted"], false);
    assert_eq!(comment["replies"][0]["id"], 1000);
    assert_eq!(comment["replies"][0]["is_upvoted"], false);
    assert_eq!(comment["replies"][1]["id"], 1001);
    assert_eq!(comment["replies"][1]["is_upvoted"], true);
    assert_eq!(comment["replies"][0]["at_user"]["username"], "carol");
}

#[tokio::test]
async fn comment_styles_order_the_thread() {
    let app = spawn_app().await;
    app.source
        .add_comment(100, 10, 1, "first")
        .add_comment(101, 10, 3, "second")
        .add_comment(102, 10, 2, "third")
        .thumbs_up_comment(101, 5)
        .thumbs_up_comment(100, 2);

    let hots = get_json(&app, "/v1/post/comments?id=10&style=hots", None).await;
    assert_eq!(ids(&hots), vec![101, 100, 102]);

    let newest = get_json(&app, "/v1/post/comments?id=10&style=newest", None).await;
    assert_eq!(ids(&newest), vec![102, 101, 100]);

    let default = get_json(&app, "/v1/post/comments?id=10", None).await;
    assert_eq!(ids(&default), vec![100, 101, 102]);
}

#[tokio::test]
async fn comments_without_replies_expose_an_empty_list() {
    let app = spawn_app().await;
    app.source.add_comment(100, 10, 3, "lonely");

    let body = get_json(&app, "/v1/post/comments?id=10", None).await;
    assert_eq!(body["data"]["list"][0]["replies"], serde_json::json!([]));
    assert_eq!(body["data"]["pager"]["total_rows"], 1);
}

#[tokio::test]
async fn search_results_are_never_cached() {
    let app = spawn_app().await;
    let path = "/v1/posts?query=PUBLIC&type=search";

    let first = get_json(&app, path, None).await;
    assert_eq!(ids(&first), vec![14, 10]);
    let queries = app.source.query_count();

    get_json(&app, path, None).await;
    assert!(app.source.query_count() > queries);

    let tagged = get_json(&app, "/v1/posts?query=rust&type=tag", None).await;
    assert_eq!(ids(&tagged), vec![14]);
}

#[tokio::test]
async fn profile_reports_relations_and_counts() {
    let app = spawn_app().await;

    let body = get_json(
        &app,
        "/v1/user/profile?username=bob",
        Some(&token(3, "carol", "user")),
    )
    .await;
    assert_eq!(body["data"]["username"], "bob");
    assert_eq!(body["data"]["is_friend"], false);
    assert_eq!(body["data"]["is_following"], true);
    assert_eq!(body["data"]["follows"], 1);
    assert_eq!(body["data"]["followings"], 0);
    assert_eq!(body["data"]["tweets_count"], 4);
}

#[tokio::test]
async fn topic_lists_depend_on_the_viewer() {
    let app = spawn_app().await;
    app.source
        .add_tag(1, "rust", 42)
        .add_tag(2, "axum", 7)
        .follow_tag(1, 2, false);

    let anonymous = get_json(&app, "/v1/tags?type=hot_extral&num=5", None).await;
    assert_eq!(anonymous["data"]["topics"][0]["tag"], "rust");
    assert_eq!(anonymous["data"]["extral_topics"], serde_json::json!([]));

    let alice = get_json(
        &app,
        "/v1/tags?type=hot_extral&num=5",
        Some(&token(1, "alice", "user")),
    )
    .await;
    assert_eq!(alice["data"]["topics"][1]["is_following"], true);
    assert_eq!(alice["data"]["extral_topics"][0]["tag"], "axum");
}

#[tokio::test]
async fn invalid_token_is_treated_as_anonymous() {
    let app = spawn_app().await;
    let body = get_json(&app, "/v1/post?id=11", Some("not-a-token")).await;
    assert_eq!(body["code"], 30003);
}

#[tokio::test]
async fn source_failure_returns_an_opaque_code() {
    let app = spawn_app().await;
    app.source.set_failing(true);

    let (status, body) = get(&app, "/v1/posts?style=hots", None).await;
    assert_eq!(status, 200);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        serde_json::json!({ "code": 30005, "msg": "failed to get posts" })
    );
}

struct UnreachableStore;

#[async_trait]
impl CacheStore for UnreachableStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn set(&self, _key: &CacheKey, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

#[tokio::test]
async fn cache_outage_degrades_to_always_miss() {
    let app = spawn_app_with(seeded(), Arc::new(UnreachableStore)).await;
    let path = "/v1/posts?style=newest";

    let first = get_json(&app, path, None).await;
    let queries = app.source.query_count();
    let second = get_json(&app, path, None).await;

    assert_eq!(first, second);
    assert!(app.source.query_count() > queries);
}
