//! Integration tests for the site backend.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::init_database;
use crate::store::{Collection, DocumentStore};
use crate::{build_state, create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    anonymous: Client,
    base_url: String,
    state: AppState,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-admin-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        Self::with_config(psk, |_| {}).await
    }

    async fn with_config(psk: Option<String>, tweak: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let asset_dir = temp_dir.path().join("assets");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");

        // Create config
        let mut config = Config {
            admin_psk: psk.clone(),
            db_path,
            asset_dir,
            asset_base_url: "/assets".to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            store_timeout: Duration::from_secs(5),
            carousel_interval: Duration::from_secs(3600),
            edit_idle_timeout: Duration::from_secs(3600),
            excerpt_words: 50,
            excerpt_chars: 120,
        };
        tweak(&mut config);

        let state = build_state(config, pool)
            .await
            .expect("Failed to build state");
        let app = create_router(state.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            anonymous: Client::new(),
            base_url,
            state,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.anonymous.get(self.url(path)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn admin_get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn admin_post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn admin_patch(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .patch(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn admin_delete(&self, path: &str) -> (u16, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    /// Poll a public endpoint until `ready` accepts its data; live views update asynchronously.
    async fn eventually(&self, path: &str, ready: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..100 {
            let (status, body) = self.get(path).await;
            if status == 200 && ready(&body["data"]) {
                return body["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} never reached the expected state", path);
    }

    async fn create_post(&self, title: &str, kind: &str) -> String {
        let (status, body) = self
            .admin_post(
                "/api/admin/posts",
                json!({"title": title, "description": "Details to follow", "type": kind}),
            )
            .await;
        assert_eq!(status, 200, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

fn png_payload(name: &str) -> Value {
    json!({
        "filename": name,
        "contentType": "image/png",
        "dataBase64": STANDARD.encode([0x89, b'P', b'N', b'G', 0x0d, 0x0a]),
    })
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
async fn test_admin_requires_key_but_public_does_not() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/posts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/posts"))
        .header("Authorization", "Bearer wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/posts"))
        .header("Authorization", "Bearer test-admin-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (status, body) = fixture.get("/api/posts").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "empty");
}

#[tokio::test]
async fn test_open_console_without_psk() {
    let fixture = TestFixture::with_psk(None).await;
    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/hotlines"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_posts_feed_filters_by_type() {
    let fixture = TestFixture::new().await;
    fixture.create_post("Seminar", "event").await;
    fixture.create_post("Office closed", "announcement").await;

    let events = fixture
        .eventually("/api/posts?type=event", |d| d["status"] == "items")
        .await;
    let items = events["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Seminar");

    let all = fixture
        .eventually("/api/posts", |d| d["items"].as_array().map_or(false, |i| i.len() == 2))
        .await;
    // Newest first.
    assert_eq!(all["items"][0]["title"], "Office closed");

    let (status, body) = fixture.get("/api/posts?type=memo").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_create_with_blank_field_is_rejected() {
    let fixture = TestFixture::new().await;
    let (status, body) = fixture
        .admin_post(
            "/api/admin/posts",
            json!({"title": "  ", "description": "", "type": "event"}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["message"],
        "Please fill all fields: title, description"
    );

    let (_, listing) = fixture.admin_post("/api/admin/unknown", json!({})).await;
    assert_eq!(listing["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_inline_edit_lifecycle() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_post("Draft title", "event").await;
    let base = format!("/api/admin/posts/{}", id);

    let (status, body) = fixture.admin_post(&format!("{}/edit", base), json!({})).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["state"], "editing");
    assert_eq!(body["data"]["buffer"]["fields"]["title"], "Draft title");

    // Blank title: stays editing, buffer kept.
    fixture
        .admin_patch(&format!("{}/edit", base), json!({"fields": {"title": ""}}))
        .await;
    let (status, body) = fixture.admin_post(&format!("{}/save", base), json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["state"], "editing");

    let (status, _) = fixture
        .admin_patch(&format!("{}/edit", base), json!({"fields": {"title": "Final title"}}))
        .await;
    assert_eq!(status, 200);
    let (status, body) = fixture.admin_post(&format!("{}/save", base), json!({})).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["state"], "viewing");

    let (_, detail) = fixture.get(&format!("/api/posts/{}", id)).await;
    assert_eq!(detail["data"]["title"], "Final title");

    // Cancel discards without writing.
    fixture.admin_post(&format!("{}/edit", base), json!({})).await;
    fixture
        .admin_patch(&format!("{}/edit", base), json!({"fields": {"title": "Abandoned"}}))
        .await;
    let (_, body) = fixture.admin_post(&format!("{}/cancel", base), json!({})).await;
    assert_eq!(body["data"]["state"], "viewing");
    let (_, detail) = fixture.get(&format!("/api/posts/{}", id)).await;
    assert_eq!(detail["data"]["title"], "Final title");

    // Save without an open edit.
    let (status, _) = fixture.admin_post(&format!("{}/save", base), json!({})).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_edit_rejects_locked_fields() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_post("Typed", "event").await;
    let base = format!("/api/admin/posts/{}", id);

    fixture.admin_post(&format!("{}/edit", base), json!({})).await;
    let (status, body) = fixture
        .admin_patch(&format!("{}/edit", base), json!({"fields": {"type": "announcement"}}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["details"]["state"], "editing");
}

#[tokio::test]
async fn test_delete_needs_confirmation() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_post("Short lived", "announcement").await;

    let (status, body) = fixture
        .admin_delete(&format!("/api/admin/posts/{}", id))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = fixture
        .admin_delete(&format!("/api/admin/posts/{}?confirm=true", id))
        .await;
    assert_eq!(status, 200);

    let (status, body) = fixture.get(&format!("/api/posts/{}", id)).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture
        .admin_delete(&format!("/api/admin/posts/{}?confirm=true", id))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_calendar_day_lists_events_in_order() {
    let fixture = TestFixture::new().await;
    for title in ["Planning Session", "Budget Review"] {
        let (status, body) = fixture
            .admin_post(
                "/api/admin/calendarActivities",
                json!({"title": title, "description": "Hall B", "date": "2025-03-14"}),
            )
            .await;
        assert_eq!(status, 200, "{}", body);
    }

    let day = fixture
        .eventually("/api/calendar/days/2025-03-14", |d| {
            d["items"].as_array().map_or(false, |i| i.len() == 2)
        })
        .await;
    let titles: Vec<&str> = day["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Planning Session", "Budget Review"]);

    let (_, empty) = fixture.get("/api/calendar/days/2025-03-15").await;
    assert_eq!(empty["data"]["status"], "empty");

    let (status, _) = fixture.get("/api/calendar/days/2025-02-30").await;
    assert_eq!(status, 400);

    let (status, bad_date) = fixture
        .admin_post(
            "/api/admin/calendarActivities",
            json!({"title": "t", "description": "d", "date": "March 14"}),
        )
        .await;
    assert_eq!(status, 400, "{}", bad_date);
}

#[tokio::test]
async fn test_calendar_navigation_wraps() {
    let fixture = TestFixture::new().await;
    let (_, start) = fixture.get("/api/calendar").await;
    let month = start["data"]["month"].as_u64().unwrap();

    let mut last = start["data"].clone();
    for _ in 0..12 {
        let resp = fixture
            .anonymous
            .post(fixture.url("/api/calendar/navigate"))
            .json(&json!({"direction": "next"}))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        last = body["data"].clone();
    }
    assert_eq!(last["month"].as_u64().unwrap(), month);
    assert_eq!(
        last["year"].as_i64().unwrap(),
        start["data"]["year"].as_i64().unwrap() + 1
    );
}

#[tokio::test]
async fn test_activity_year_buttons() {
    let fixture = TestFixture::new().await;
    for year in ["2023", "2024"] {
        let (status, body) = fixture
            .admin_post(
                "/api/admin/activities",
                json!({"title": format!("Outreach {}", year), "description": "Barangay visit", "year": year}),
            )
            .await;
        assert_eq!(status, 200, "{}", body);
    }
    // Legacy document without a year.
    fixture
        .state
        .store
        .put(
            Collection::Activities,
            None,
            json!({"title": "Undated", "description": ""}).as_object().cloned().unwrap(),
        )
        .await
        .unwrap();

    let page = fixture
        .eventually("/api/activities", |d| d["years"].as_array().map_or(false, |y| y.len() == 3))
        .await;
    assert_eq!(page["years"], json!(["2024", "2023", "Unknown Year"]));
    assert_eq!(page["activities"]["items"].as_array().unwrap().len(), 3);

    let (_, selected) = fixture.get("/api/activities?year=2023").await;
    let items = selected["data"]["activities"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Outreach 2023");

    let (status, body) = fixture
        .admin_post(
            "/api/admin/activities",
            json!({"title": "t", "description": "d", "year": "24"}),
        )
        .await;
    assert_eq!(status, 400, "{}", body);

    // The console lists the same activities grouped by year.
    let (status, listing) = fixture.admin_get("/api/admin/activities").await;
    assert_eq!(status, 200, "{}", listing);
    assert_eq!(listing["data"]["documents"].as_array().unwrap().len(), 3);
    let groups = listing["data"]["byYear"]["buckets"].as_array().unwrap();
    let years: Vec<_> = groups.iter().map(|g| g["year"].clone()).collect();
    assert_eq!(years, vec![json!("2024"), json!("2023"), json!("Unknown Year")]);
    assert_eq!(groups[2]["items"][0]["title"], "Undated");

    let (_, posts) = fixture.admin_get("/api/admin/posts").await;
    assert!(posts["data"].get("byYear").is_none());
}

#[tokio::test]
async fn test_idle_edit_sessions_are_dropped() {
    let fixture = TestFixture::with_config(Some("test-admin-key".to_string()), |config| {
        config.edit_idle_timeout = Duration::from_millis(200);
    })
    .await;
    let first = fixture.create_post("Left open", "event").await;
    let second = fixture.create_post("Edited later", "event").await;

    let (status, _) = fixture
        .admin_post(&format!("/api/admin/posts/{}/edit", first), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(fixture.state.sessions.len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let (status, _) = fixture
        .admin_post(&format!("/api/admin/posts/{}/edit", second), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(fixture.state.sessions.len(), 1);

    let (status, body) = fixture
        .admin_patch(
            &format!("/api/admin/posts/{}/edit", first),
            json!({"fields": {"title": "Too late"}}),
        )
        .await;
    assert_eq!(status, 404, "{}", body);
}

#[tokio::test]
async fn test_year_options_for_activity_form() {
    let fixture = TestFixture::new().await;
    let resp = fixture
        .client
        .get(fixture.url("/api/admin/year-options"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let years = body["data"].as_array().unwrap();
    assert_eq!(years.last().unwrap(), 2022);
    assert!(years.windows(2).all(|w| w[0].as_i64() > w[1].as_i64()));
}

#[tokio::test]
async fn test_resources_by_category() {
    let fixture = TestFixture::new().await;
    let (status, body) = fixture
        .admin_post(
            "/api/admin/resources",
            json!({
                "title": "GAD Plan 2025",
                "description": "Approved plan",
                "type": "gadLaws",
                "fileUrl": "https://example.org/plan.pdf"
            }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);

    let (_, laws) = fixture.get("/api/resources/gadLaws").await;
    assert_eq!(laws["data"].as_array().unwrap().len(), 1);
    assert_eq!(laws["data"][0]["fileUrl"], "https://example.org/plan.pdf");

    let (_, orders) = fixture.get("/api/resources/specialOrders").await;
    assert!(orders["data"].as_array().unwrap().is_empty());

    let (status, _) = fixture.get("/api/resources/memos").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_documentation_upload_feeds_carousel() {
    let fixture = TestFixture::new().await;
    let (status, body) = fixture
        .admin_post(
            "/api/admin/documentations",
            json!({"asset": png_payload("seminar.png")}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    let url = body["data"]["fields"]["imageUrl"].as_str().unwrap().to_string();
    assert!(url.starts_with("/assets/image/"));

    let carousel = fixture.eventually("/api/carousel", |d| d["len"] == 1).await;
    assert_eq!(carousel["index"], 0);
    assert_eq!(carousel["current"]["imageUrl"], url.as_str());

    let resp = fixture.anonymous.get(fixture.url(&url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/carousel/advance"))
        .json(&json!({"direction": "backward"}))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["index"], 0);
}

#[tokio::test]
async fn test_members_grouped_by_position() {
    let fixture = TestFixture::new().await;
    let (status, body) = fixture
        .admin_post(
            "/api/admin/members",
            json!({
                "name": "Ana Cruz",
                "role": "Head",
                "position": "Vice-Chairperson",
                "asset": png_payload("ana.png")
            }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);

    let members = fixture
        .eventually("/api/members", |d| d["items"][1]["members"].as_array().map_or(false, |m| m.len() == 1))
        .await;
    assert_eq!(members["items"][1]["position"], "Vice-Chairperson");
    assert_eq!(members["items"][1]["members"][0]["name"], "Ana Cruz");
}

#[tokio::test]
async fn test_site_settings_round_trip() {
    let fixture = TestFixture::new().await;
    let (_, site) = fixture.get("/api/site").await;
    assert_eq!(site["data"]["bannerUrl"], "images/4ft x 11ft Streamer.png");
    assert!(site["data"].get("footer").is_none());

    let resp = fixture
        .client
        .put(fixture.url("/api/admin/site/footer"))
        .json(&json!({"address": "Municipal Hall", "phone": "555-0100", "email": "gad@example.org"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (_, site) = fixture.get("/api/site").await;
    assert_eq!(site["data"]["footer"]["address"], "Municipal Hall");

    let (status, _) = fixture.admin_delete("/api/admin/site/footer").await;
    assert_eq!(status, 200);
    let (_, site) = fixture.get("/api/site").await;
    assert!(site["data"].get("footer").is_none());

    let (status, _) = fixture.admin_delete("/api/admin/site/sidebar").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_hotlines_sorted_by_category() {
    let fixture = TestFixture::new().await;
    for (category, name) in [("Police", "PNP"), ("Fire", "BFP")] {
        fixture
            .admin_post(
                "/api/admin/hotlines",
                json!({"category": category, "name": name, "number": "911"}),
            )
            .await;
    }
    let (_, body) = fixture.get("/api/hotlines").await;
    let categories: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["category"].as_str().unwrap())
        .collect();
    assert_eq!(categories, vec!["Fire", "Police"]);
}

#[tokio::test]
async fn test_envelope_reports_revision() {
    let fixture = TestFixture::new().await;
    let (_, before) = fixture.get("/api/hotlines").await;
    fixture.create_post("Bump", "event").await;
    let (_, after) = fixture.get("/api/hotlines").await;
    assert!(after["revisionId"].as_i64().unwrap() > before["revisionId"].as_i64().unwrap());
}
