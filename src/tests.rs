//! Integration tests for the school tracker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinSet;

use crate::config::WikiConfig;
use crate::db::{init_database, Repository, SchoolStore};
use crate::errors::AppError;
use crate::models::{LangLink, PageviewSeries, Revision, School};
use crate::sync::{SchoolUpdater, SyncReport, UpdateKind};
use crate::wiki::{MediaWikiClient, WikiApi};
use crate::{create_router, AppState};

/// Canned wiki responses keyed by title. A missing title fails like a page without data.
#[derive(Default)]
struct FakeWiki {
    langlinks: HashMap<String, Vec<LangLink>>,
    pageviews: HashMap<String, PageviewSeries>,
    revisions: HashMap<String, Vec<Revision>>,
}

impl FakeWiki {
    fn with_langs(mut self, title: &str, langs: &[&str]) -> Self {
        let links = langs
            .iter()
            .map(|lang| LangLink {
                lang: lang.to_string(),
                title: Some(title.to_string()),
            })
            .collect();
        self.langlinks.insert(title.to_string(), links);
        self
    }

    fn with_pageviews(mut self, title: &str, days: &[(&str, Value)]) -> Self {
        let series = days
            .iter()
            .map(|(date, views)| (date.to_string(), views.clone()))
            .collect();
        self.pageviews.insert(title.to_string(), series);
        self
    }

    fn with_editors(mut self, title: &str, users: &[&str]) -> Self {
        let revisions = users
            .iter()
            .map(|user| Revision {
                timestamp: Some("2023-06-01T00:00:00Z".to_string()),
                user: Some(user.to_string()),
                comment: Some(String::new()),
            })
            .collect();
        self.revisions.insert(title.to_string(), revisions);
        self
    }
}

#[async_trait]
impl WikiApi for FakeWiki {
    async fn langlinks(&self, title: &str) -> Result<Vec<LangLink>, AppError> {
        self.langlinks
            .get(title)
            .cloned()
            .ok_or_else(|| AppError::Parse(format!("No langlinks for {}", title)))
    }

    async fn pageviews(&self, title: &str) -> Result<PageviewSeries, AppError> {
        self.pageviews
            .get(title)
            .cloned()
            .ok_or_else(|| AppError::Parse(format!("No pageviews for {}", title)))
    }

    async fn revisions(&self, title: &str) -> Result<Vec<Revision>, AppError> {
        self.revisions
            .get(title)
            .cloned()
            .ok_or_else(|| AppError::Remote(format!("Wiki API unreachable for {}", title)))
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let state = AppState {
            store: repo.clone(),
        };
        let base_url = serve(create_router(state)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            repo,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn updater(&self, wiki: FakeWiki) -> SchoolUpdater {
        SchoolUpdater::new(Arc::new(wiki), self.repo.clone())
    }

    async fn get_json(&self, path: &str) -> Value {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    async fn stored(&self, id: &str) -> School {
        self.repo
            .list_schools()
            .await
            .unwrap()
            .into_iter()
            .find(|school| school.id == id)
            .unwrap()
    }
}

/// Serve `app` on a random local port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn foo_high_wiki() -> FakeWiki {
    FakeWiki::default()
        .with_langs("Foo High", &["fr", "de"])
        .with_pageviews(
            "Foo High",
            &[
                ("2023-06-26", json!("5")),
                ("2023-06-27", json!("3")),
                ("2023-07-03", json!("10")),
            ],
        )
        .with_editors("Foo High", &["a", "b", "a", "c"])
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_get_school_unmatched_is_empty_object() {
    let fixture = TestFixture::new().await;
    fixture.repo.create_school("Bar Academy").await.unwrap();

    let body = fixture.get_json("/api/get-school?school_name=Foo%20High").await;
    assert_eq!(body, json!({}));

    let body = fixture.get_json("/api/get-school").await;
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_get_school_after_sync() {
    let fixture = TestFixture::new().await;
    fixture.repo.create_school("Foo High").await.unwrap();

    let report = fixture.updater(foo_high_wiki()).sync_all().await.unwrap();
    assert_eq!(
        report,
        SyncReport {
            schools: 1,
            succeeded: 3,
            failed: 0
        }
    );

    let body = fixture.get_json("/api/get-school?school_name=Foo%20High").await;
    assert_eq!(
        body,
        json!({
            "name": "Foo High",
            "pageviews": { "2023-27": 10 },
            "languages": ["en", "fr", "de"]
        })
    );
}

#[tokio::test]
async fn test_get_school_list_in_store_order() {
    let fixture = TestFixture::new().await;
    for name in ["Foo High", "Bar Academy", "Baz College"] {
        fixture.repo.create_school(name).await.unwrap();
    }

    let body = fixture.get_json("/api/get-school-list").await;
    assert_eq!(
        body,
        json!({ "school_list": ["Foo High", "Bar Academy", "Baz College"] })
    );
}

#[tokio::test]
async fn test_dump_all_keyed_by_document_id() {
    let fixture = TestFixture::new().await;
    let foo = fixture.repo.create_school("Foo High").await.unwrap();
    let bar = fixture.repo.create_school("Bar Academy").await.unwrap();

    let body = fixture.get_json("/api/dump-all").await;
    let dump = body.as_object().unwrap();

    let ids: Vec<&String> = dump.keys().collect();
    assert_eq!(ids, vec![&foo.id, &bar.id]);
    assert_eq!(
        dump[&foo.id],
        json!({ "name": "Foo High", "pageviews": {}, "languages": ["en"] })
    );
    assert_eq!(dump[&bar.id]["name"], "Bar Academy");
}

#[tokio::test]
async fn test_read_endpoints_allow_any_origin() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/get-school-list"))
        .header("Origin", "https://schools.example.org")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_sync_updates_all_field_groups() {
    let fixture = TestFixture::new().await;
    let school = fixture.repo.create_school("Foo High").await.unwrap();

    fixture.updater(foo_high_wiki()).sync_all().await.unwrap();

    let stored = fixture.stored(&school.id).await;
    assert_eq!(stored.languages, vec!["en", "fr", "de"]);
    assert_eq!(stored.lang_cnt, 3);
    assert_eq!(stored.pageviews.len(), 1);
    assert_eq!(stored.pageviews["2023-27"], 10);
    assert_eq!(stored.revision_cnt, 4);
    assert_eq!(stored.contributor_cnt, 3);
    let mut contributors = stored.contributors.clone();
    contributors.sort();
    assert_eq!(contributors, vec!["a", "b", "c"]);
    assert!(stored.updated_at.is_some());
}

#[tokio::test]
async fn test_failed_update_does_not_block_others() {
    let fixture = TestFixture::new().await;
    let foo = fixture.repo.create_school("Foo High").await.unwrap();
    let bar = fixture.repo.create_school("Bar Academy").await.unwrap();

    // Bar Academy has pageviews only: its language and revision queries fail
    let wiki = foo_high_wiki().with_pageviews(
        "Bar Academy",
        &[("2023-06-30", json!(1)), ("2023-07-02", json!(4))],
    );
    let report = fixture.updater(wiki).sync_all().await.unwrap();

    assert_eq!(report.schools, 2);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 2);

    let stored_bar = fixture.stored(&bar.id).await;
    assert_eq!(stored_bar.languages, vec!["en"]);
    assert_eq!(stored_bar.revision_cnt, 0);
    assert_eq!(stored_bar.pageviews["2023-27"], 4);

    let stored_foo = fixture.stored(&foo.id).await;
    assert_eq!(stored_foo.lang_cnt, 3);
}

#[tokio::test]
async fn test_pageviews_merge_across_runs() {
    let fixture = TestFixture::new().await;
    let school = fixture.repo.create_school("Foo High").await.unwrap();

    fixture.updater(foo_high_wiki()).sync_all().await.unwrap();

    // The next night sees a later window that re-reports week 27 with more data
    let wiki = FakeWiki::default().with_pageviews(
        "Foo High",
        &[
            ("2023-06-27", json!(3)),
            ("2023-07-03", json!(10)),
            ("2023-07-04", json!(2)),
            ("2023-07-10", json!(7)),
        ],
    );
    let updater = fixture.updater(wiki);
    updater
        .update_pageviews(&school.id, "Foo High")
        .await
        .unwrap();

    let stored = fixture.stored(&school.id).await;
    assert_eq!(stored.pageviews["2023-27"], 12);
    assert_eq!(stored.pageviews["2023-28"], 7);
    assert!(!stored.pageviews.contains_key("2023-26"));
    // Language data from the first run is untouched
    assert_eq!(stored.languages, vec!["en", "fr", "de"]);
}

#[tokio::test]
async fn test_spawned_updates_can_be_awaited() {
    let fixture = TestFixture::new().await;
    let school = fixture.repo.create_school("Foo High").await.unwrap();
    let updater = fixture.updater(FakeWiki::default().with_langs("Foo High", &["es"]));

    let mut tasks = JoinSet::new();
    updater.spawn_updates(&school, &mut tasks);

    let mut outcomes = HashMap::new();
    while let Some(outcome) = tasks.join_next().await {
        let outcome = outcome.unwrap();
        assert_eq!(outcome.school_id, school.id);
        outcomes.insert(outcome.kind, outcome.result.is_ok());
    }

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[&UpdateKind::Languages]);
    assert!(!outcomes[&UpdateKind::Pageviews]);
    assert!(!outcomes[&UpdateKind::Revisions]);
    assert_eq!(fixture.stored(&school.id).await.languages, vec!["en", "es"]);
}

// ==================== MEDIAWIKI CLIENT ====================

async fn fake_api(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let param = |key: &str| params.get(key).map(String::as_str).unwrap_or("");

    if param("action") != "query" || param("format") != "json" || param("origin") != "*" {
        return Json(json!({ "error": { "code": "badparams", "info": "unexpected parameters" } }));
    }

    let body = match (param("prop"), param("titles")) {
        (_, "Missing School") => json!({ "query": { "pages": { "-1": { "missing": true } } } }),
        ("langlinks", title) => json!({
            "query": { "pages": { "4242": {
                "pageid": 4242,
                "title": title,
                "langlinks": [ { "lang": "fr", "title": "Foo" }, { "lang": "de", "title": "Foo" } ]
            } } }
        }),
        ("pageviews", title) if param("pvipdays") == "60" => json!({
            "query": { "pages": [ {
                "title": title,
                "pageviews": { "2023-06-26": 5, "2023-06-27": null, "2023-07-03": 10 }
            } ] }
        }),
        ("revisions", title)
            if param("rvlimit") == "500" && param("rvend") == "2022-01-01T00:00:00Z" =>
        {
            json!({
                "query": { "pages": [ {
                    "title": title,
                    "revisions": [
                        { "user": "a", "timestamp": "2023-06-02T00:00:00Z", "comment": "" },
                        { "user": "b", "timestamp": "2023-06-01T00:00:00Z", "comment": "typo" }
                    ]
                } ] }
            })
        }
        _ => json!({ "error": { "code": "badparams", "info": "unexpected parameters" } }),
    };
    Json(body)
}

async fn wiki_client_for(app: Router) -> MediaWikiClient {
    let base_url = serve(app).await;
    MediaWikiClient::new(WikiConfig {
        api_url: format!("{}/w/api.php", base_url),
        timeout_ms: 5_000,
        ..WikiConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_mediawiki_client_queries() {
    let client = wiki_client_for(Router::new().route("/w/api.php", get(fake_api))).await;

    let links = client.langlinks("Foo High").await.unwrap();
    let langs: Vec<&str> = links.iter().map(|l| l.lang.as_str()).collect();
    assert_eq!(langs, vec!["fr", "de"]);

    let views = client.pageviews("Foo High").await.unwrap();
    assert_eq!(views.len(), 3);
    assert_eq!(views[2], ("2023-07-03".to_string(), json!(10)));

    let revisions = client.revisions("Foo High").await.unwrap();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[1].user.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_mediawiki_client_missing_page_is_parse_error() {
    let client = wiki_client_for(Router::new().route("/w/api.php", get(fake_api))).await;

    let err = client.langlinks("Missing School").await.unwrap_err();
    assert!(matches!(err, AppError::Parse(_)), "got {}", err);
}

#[tokio::test]
async fn test_mediawiki_client_remote_faults() {
    let app = Router::new()
        .route(
            "/w/api.php",
            get(|| async { Json(json!({ "error": { "code": "ratelimited", "info": "slow down" } })) }),
        )
        .route(
            "/broken/api.php",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
    let base_url = serve(app).await;

    let client = MediaWikiClient::new(WikiConfig {
        api_url: format!("{}/w/api.php", base_url),
        ..WikiConfig::default()
    })
    .unwrap();
    let err = client.revisions("Foo High").await.unwrap_err();
    assert!(matches!(err, AppError::Remote(_)));
    assert!(err.message().contains("ratelimited"));

    let client = MediaWikiClient::new(WikiConfig {
        api_url: format!("{}/broken/api.php", base_url),
        ..WikiConfig::default()
    })
    .unwrap();
    let err = client.pageviews("Foo High").await.unwrap_err();
    assert!(matches!(err, AppError::Remote(_)));
}
