use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use salvo::http::header::LOCATION;
use salvo::prelude::*;
use salvo::test::{ResponseExt, TestClient};
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::{NamedTempFile, TempDir, tempdir};

use super::routes::create_router;
use super::{LOGIN_STATE_COOKIE, SESSION_COOKIE, WebState};
use crate::auth::AccessPolicy;
use crate::auth::tests::{FakeProvider, staff_principal};
use crate::config::Config;
use crate::db::manager::tests::temp_database;
use crate::db::{Category, Panel};
use crate::discord::{PanelPublisher, PlatformError};
use crate::relay::{EventBus, EventRelay, TicketEventKind};
use crate::session::SessionManager;
use crate::toggles::ToggleStore;

const STAFF_ROLE: u64 = 1365633918593794079;
const BASE: &str = "http://127.0.0.1:5000";

#[derive(Default)]
struct FakePublisher {
    posts: AtomicUsize,
}

#[async_trait]
impl PanelPublisher for FakePublisher {
    async fn post_panel(
        &self,
        panel: &Panel,
        categories: &[Category],
    ) -> Result<String, PlatformError> {
        if categories.is_empty() {
            return Err(PlatformError::Api("panel has no categories".into()));
        }
        self.posts.fetch_add(1, Ordering::SeqCst);
        Ok(format!("msg-{}", panel.id))
    }
}

struct Harness {
    service: Service,
    state: WebState,
    publisher: Arc<FakePublisher>,
    staff_cookie: String,
    _db_file: NamedTempFile,
    _flags_dir: TempDir,
}

async fn harness_with(provider: FakeProvider) -> Harness {
    let flags_dir = tempdir().expect("flags dir");
    let flags_path = flags_dir.path().join("toggles.json");
    let yaml = format!(
        r#"
auth:
  client_id: "1234"
  client_secret: "secret"
  bot_token: "bot-token"
  guild_id: 1365510151884378214
  allowed_roles: [{STAFF_ROLE}]
  webhook_secret: "shared"
database:
  filename: "unused.db"
toggles:
  path: "{}"
  subsystems:
    tickets: true
    logs: false
"#,
        flags_path.display()
    );
    let config = Config::from_yaml(&yaml).expect("config parses");

    let (db_file, db) = temp_database().await;
    let db = Arc::new(db);
    let relay = Arc::new(EventRelay::new(
        db.ticket_store(),
        EventBus::new(config.live.channel_capacity),
    ));
    let toggles = Arc::new(ToggleStore::from_config(&config.toggles, db.settings_store()));
    let publisher = Arc::new(FakePublisher::default());

    let state = WebState {
        policy: Arc::new(AccessPolicy::new(config.auth.allowed_roles.clone())),
        config: Arc::new(config),
        db_manager: db,
        sessions: Arc::new(SessionManager::new(Duration::from_secs(3600))),
        identity: Arc::new(provider),
        publisher: publisher.clone(),
        relay,
        toggles,
        webhook_secret: Arc::new(SecretString::from("shared".to_string())),
        started_at: Instant::now(),
    };

    let token = state
        .sessions
        .create(staff_principal("42", vec![STAFF_ROLE]));

    Harness {
        service: Service::new(create_router(state.clone())),
        state,
        publisher,
        staff_cookie: format!("{SESSION_COOKIE}={token}"),
        _db_file: db_file,
        _flags_dir: flags_dir,
    }
}

async fn harness() -> Harness {
    harness_with(FakeProvider::new("42", vec![STAFF_ROLE], None)).await
}

impl Harness {
    async fn staff_get(&self, path: &str) -> Response {
        TestClient::get(format!("{BASE}{path}"))
            .add_header("cookie", &self.staff_cookie, true)
            .send(&self.service)
            .await
    }

    async fn staff_send(&self, method: &str, path: &str, body: Value) -> Response {
        let url = format!("{BASE}{path}");
        let builder = match method {
            "POST" => TestClient::post(url),
            "PUT" => TestClient::put(url),
            "PATCH" => TestClient::patch(url),
            "DELETE" => TestClient::delete(url),
            other => panic!("unsupported method {other}"),
        };
        builder
            .add_header("cookie", &self.staff_cookie, true)
            .json(&body)
            .send(&self.service)
            .await
    }

    async fn webhook(&self, route: &str, bearer: Option<&str>, body: Value) -> Response {
        let mut builder = TestClient::post(format!("{BASE}/api/webhook/{route}"));
        if let Some(bearer) = bearer {
            builder = builder.add_header("authorization", format!("Bearer {bearer}"), true);
        }
        builder.json(&body).send(&self.service).await
    }
}

async fn json_body(res: &mut Response) -> Value {
    res.take_json::<Value>().await.expect("json body")
}

#[tokio::test]
async fn ticket_flow_from_webhooks_to_staff_views() {
    let h = harness().await;
    let mut events = h.state.relay.bus().subscribe();

    let mut res = h
        .staff_send("POST", "/api/categories", json!({ "name": "Support", "color": "#FF8C00" }))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::CREATED));
    let category_id = json_body(&mut res).await["id"].as_i64().expect("category id");

    let mut res = h
        .webhook(
            "ticket-created",
            Some("shared"),
            json!({
                "ticket_number": 1,
                "user_id": "u1",
                "channel_id": "c1",
                "category_id": category_id,
            }),
        )
        .await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    let body = json_body(&mut res).await;
    assert_eq!(body["success"], true);
    let ticket_id = body["ticket_id"].as_i64().expect("ticket id");

    let mut res = h
        .webhook(
            "ticket-message",
            Some("shared"),
            json!({ "ticket_id": ticket_id, "user_id": "u1", "content": "help" }),
        )
        .await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    assert!(json_body(&mut res).await["message_id"].as_i64().is_some());

    let mut res = h.staff_get(&format!("/api/ticket/{ticket_id}")).await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    let detail = json_body(&mut res).await;
    assert_eq!(detail["messages_count"], 1);
    assert_eq!(detail["category_name"], "Support");
    assert_eq!(detail["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(detail["messages"][0]["content"], "help");

    let mut res = h
        .staff_send("POST", &format!("/api/ticket/{ticket_id}/close"), json!({}))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    let closed = json_body(&mut res).await;
    assert_eq!(closed["already_closed"], false);
    assert_eq!(closed["ticket"]["status"], "closed");

    let mut res = h.staff_get("/api/tickets?status=open").await;
    assert_eq!(json_body(&mut res).await, json!([]));

    let mut res = h.staff_get("/api/tickets?status=closed").await;
    let listed = json_body(&mut res).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["id"], ticket_id);

    let kinds: Vec<TicketEventKind> = (0..3)
        .map(|_| events.try_recv().expect("event published").kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TicketEventKind::TicketCreated,
            TicketEventKind::TicketUpdate,
            TicketEventKind::TicketUpdate,
        ]
    );

    let mut res = h.staff_get("/api/stats").await;
    let stats = json_body(&mut res).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["closed"], 1);
    assert_eq!(stats["resolution_rate"], 100);
}

#[tokio::test]
async fn closing_twice_through_the_webhook_reports_already_closed() {
    let h = harness().await;
    let mut res = h
        .webhook("ticket-created", Some("shared"), json!({ "ticket_number": 7, "user_id": "u7" }))
        .await;
    let ticket_id = json_body(&mut res).await["ticket_id"].as_i64().expect("ticket id");

    let close = json!({ "ticket_id": ticket_id, "status": "closed" });
    let mut first = h.webhook("ticket-closed", Some("shared"), close.clone()).await;
    assert_eq!(json_body(&mut first).await["already_closed"], false);
    let mut second = h.webhook("ticket-closed", Some("shared"), close).await;
    assert_eq!(second.status_code, Some(StatusCode::OK));
    assert_eq!(json_body(&mut second).await["already_closed"], true);
}

#[tokio::test]
async fn webhook_without_the_secret_is_rejected_without_mutation() {
    let h = harness().await;
    let ticket = json!({ "ticket_number": 9, "user_id": "u9" });

    let res = h.webhook("ticket-created", None, ticket.clone()).await;
    assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));
    let res = h.webhook("ticket-created", Some("wrong"), ticket).await;
    assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

    let mut res = h.staff_get("/api/stats").await;
    assert_eq!(json_body(&mut res).await["total"], 0);
}

#[tokio::test]
async fn duplicate_ticket_number_is_a_conflict() {
    let h = harness().await;
    let ticket = json!({ "ticket_number": 3, "user_id": "u3" });
    let res = h.webhook("ticket-created", Some("shared"), ticket.clone()).await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    let res = h.webhook("ticket-created", Some("shared"), ticket).await;
    assert_eq!(res.status_code, Some(StatusCode::CONFLICT));
}

#[tokio::test]
async fn staff_routes_redirect_anonymous_visitors_to_login() {
    let h = harness().await;
    let res = TestClient::get(format!("{BASE}/api/tickets"))
        .send(&h.service)
        .await;
    assert_eq!(res.status_code, Some(StatusCode::FOUND));
    assert_eq!(
        res.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn invalid_status_filter_is_a_bad_request() {
    let h = harness().await;
    let res = h.staff_get("/api/tickets?status=waiting").await;
    assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn ticket_update_requires_a_field() {
    let h = harness().await;
    let mut res = h
        .webhook("ticket-created", Some("shared"), json!({ "ticket_number": 4, "user_id": "u4" }))
        .await;
    let ticket_id = json_body(&mut res).await["ticket_id"].as_i64().expect("ticket id");

    let res = h
        .staff_send("PATCH", &format!("/api/ticket/{ticket_id}"), json!({}))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

    let mut res = h
        .staff_send(
            "PATCH",
            &format!("/api/ticket/{ticket_id}"),
            json!({ "priority": "urgent", "assigned_to": "42" }),
        )
        .await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    let ticket = json_body(&mut res).await;
    assert_eq!(ticket["priority"], "urgent");
    assert_eq!(ticket["assigned_to"], "42");
}

#[tokio::test]
async fn toggles_flip_and_report_to_the_bot() {
    let h = harness().await;

    let res = h
        .staff_send("POST", "/api/config/toggle/unknown", json!({}))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));

    let mut res = h
        .staff_send("POST", "/api/config/toggle/tickets", json!({}))
        .await;
    assert_eq!(
        json_body(&mut res).await,
        json!({ "system": "tickets", "enabled": false })
    );

    let mut res = h
        .staff_send("PUT", "/api/config/logs", json!({ "enabled": true }))
        .await;
    assert_eq!(json_body(&mut res).await["enabled"], true);

    let mut res = TestClient::get(format!("{BASE}/api/config/status"))
        .send(&h.service)
        .await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    assert_eq!(
        json_body(&mut res).await,
        json!({ "logs": true, "tickets": false })
    );
}

#[tokio::test]
async fn panels_resolve_categories_and_post_through_the_bot() {
    let h = harness().await;
    let mut res = h
        .staff_send("POST", "/api/categories", json!({ "name": "Billing", "emoji": "💳" }))
        .await;
    let category_id = json_body(&mut res).await["id"].as_i64().expect("category id");

    let res = h
        .staff_send("POST", "/api/panels", json!({ "name": "Broken", "categories": [999] }))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));

    let mut res = h
        .staff_send(
            "POST",
            "/api/panels",
            json!({
                "name": "Main",
                "title": "Open a ticket",
                "channel_id": "1365510151884378300",
                "categories": [category_id],
            }),
        )
        .await;
    assert_eq!(res.status_code, Some(StatusCode::CREATED));
    let panel_id = json_body(&mut res).await["id"].as_i64().expect("panel id");

    let mut res = h.staff_get(&format!("/api/panels/{panel_id}")).await;
    let panel = json_body(&mut res).await;
    assert_eq!(panel["categories"], json!([category_id]));
    assert_eq!(panel["category_records"][0]["name"], "Billing");

    let mut res = h
        .staff_send("POST", "/api/discord/send-panel", json!({ "panel_id": panel_id }))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    assert_eq!(
        json_body(&mut res).await["message_id"],
        format!("msg-{panel_id}")
    );
    assert_eq!(h.publisher.posts.load(Ordering::SeqCst), 1);

    let mut res = h.staff_get(&format!("/api/panels/{panel_id}")).await;
    assert_eq!(
        json_body(&mut res).await["message_id"],
        format!("msg-{panel_id}")
    );
}

#[tokio::test]
async fn settings_crud() {
    let h = harness().await;
    let res = h
        .staff_send("PUT", "/api/settings/welcome", json!({ "value": "hello" }))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::OK));

    let mut res = h.staff_get("/api/settings/welcome").await;
    assert_eq!(json_body(&mut res).await["value"], "hello");

    let res = h
        .staff_send("DELETE", "/api/settings/welcome", json!({}))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::OK));
    let res = h
        .staff_send("DELETE", "/api/settings/welcome", json!({}))
        .await;
    assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn callback_rejects_a_mismatched_state() {
    let h = harness().await;
    let res = TestClient::get(format!("{BASE}/callback?code=abc&state=forged"))
        .add_header("cookie", format!("{LOGIN_STATE_COOKIE}=expected"), true)
        .send(&h.service)
        .await;
    assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn callback_opens_a_session_for_staff() {
    let h = harness_with(FakeProvider::new("77", vec![STAFF_ROLE], None)).await;
    let before = h.state.sessions.len();

    let res = TestClient::get(format!("{BASE}/callback?code=abc&state=s1"))
        .add_header("cookie", format!("{LOGIN_STATE_COOKIE}=s1"), true)
        .send(&h.service)
        .await;
    assert_eq!(res.status_code, Some(StatusCode::FOUND));
    assert_eq!(h.state.sessions.len(), before + 1);
}

#[tokio::test]
async fn callback_denies_members_without_staff_roles() {
    let h = harness_with(FakeProvider::new("77", vec![5], Some(1))).await;
    let before = h.state.sessions.len();

    let mut res = TestClient::get(format!("{BASE}/callback?code=abc&state=s1"))
        .add_header("cookie", format!("{LOGIN_STATE_COOKIE}=s1"), true)
        .send(&h.service)
        .await;
    assert_eq!(res.status_code, Some(StatusCode::FORBIDDEN));
    assert_eq!(json_body(&mut res).await, json!({ "error": "access denied" }));
    assert_eq!(h.state.sessions.len(), before);
}

#[tokio::test]
async fn provider_failure_is_a_bad_gateway() {
    let mut provider = FakeProvider::new("77", vec![STAFF_ROLE], None);
    provider.exchange_status = Some(500);
    let h = harness_with(provider).await;

    let res = TestClient::get(format!("{BASE}/callback?code=abc&state=s1"))
        .add_header("cookie", format!("{LOGIN_STATE_COOKIE}=s1"), true)
        .send(&h.service)
        .await;
    assert_eq!(res.status_code, Some(StatusCode::BAD_GATEWAY));
}

#[tokio::test]
async fn me_returns_the_session_principal() {
    let h = harness().await;
    let mut res = h.staff_get("/api/me").await;
    let me = json_body(&mut res).await;
    assert_eq!(me["id"], "42");
    assert_eq!(me["roles"], json!([STAFF_ROLE.to_string()]));
}

#[tokio::test]
async fn metrics_and_health_are_public() {
    let h = harness().await;
    let res = TestClient::get(format!("{BASE}/health")).send(&h.service).await;
    assert_eq!(res.status_code, Some(StatusCode::OK));

    let mut res = TestClient::get(format!("{BASE}/metrics")).send(&h.service).await;
    let text = res.take_string().await.expect("metrics text");
    assert!(text.contains("dashboard_active_sessions 1"));
}

#[tokio::test]
async fn session_without_staff_roles_is_forbidden_not_redirected() {
    let h = harness().await;
    let token = h.state.sessions.create(staff_principal("99", vec![5]));

    let mut res = TestClient::get(format!("{BASE}/api/tickets"))
        .add_header("cookie", format!("{SESSION_COOKIE}={token}"), true)
        .send(&h.service)
        .await;
    assert_eq!(res.status_code, Some(StatusCode::FORBIDDEN));
    assert!(res.headers().get(LOCATION).is_none());
    assert_eq!(json_body(&mut res).await, json!({ "error": "access denied" }));
}
