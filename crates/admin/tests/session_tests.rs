//! Session lifecycle tests against a mock admin API

use inkdesk_admin::routes;
use inkdesk_admin::{AdminConfig, AuthState, NotificationLevel, SessionManager};
use inkdesk_core::store::{ACCESS_TOKEN_KEY, COOKIES_KEY, PROFILE_KEY};
use inkdesk_core::{
    FileStorage, GuardDecision, KeyValueStorage, MemoryStorage, Navigator, Redirect, Role,
    TokenStore,
};
use inkdesk_http::types::ProfileUpdate;
use inkdesk_http::{ApiClient, ClientError};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingNavigator {
    redirects: Mutex<Vec<Redirect>>,
}

impl RecordingNavigator {
    fn redirects(&self) -> Vec<Redirect> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, redirect: Redirect) {
        self.redirects.lock().unwrap().push(redirect);
    }
}

fn admin_json(id: &str, name: &str) -> Value {
    json!({
        "_id": id,
        "name": name,
        "email": "ada@example.com",
        "role": "blog_manager",
        "permissions": { "canManageBlogs": true, "canManageAdmins": true },
        "isActive": true
    })
}

struct Harness {
    manager: SessionManager,
    storage: Arc<MemoryStorage>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(server: &MockServer, stored: &[(&str, String)]) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    for (key, value) in stored {
        storage.set_item(key, value).unwrap();
    }
    let navigator = Arc::new(RecordingNavigator::default());
    let client = ApiClient::builder()
        .base_url(server.uri())
        .store(Arc::new(TokenStore::new(storage.clone())))
        .navigator(navigator.clone())
        .build()
        .unwrap();
    Harness {
        manager: SessionManager::new(client),
        storage,
        navigator,
    }
}

fn stored_session(token: &str) -> Vec<(&'static str, String)> {
    vec![
        (ACCESS_TOKEN_KEY, token.to_string()),
        (PROFILE_KEY, admin_json("a1", "Ada").to_string()),
    ]
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "ada@example.com", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": token,
            "admin": admin_json("a1", "Ada"),
        })))
        .mount(server)
        .await;
}

fn drain(rx: &mut broadcast::Receiver<inkdesk_admin::Notification>) -> Vec<(NotificationLevel, String)> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push((n.level, n.message));
    }
    out
}

#[tokio::test]
async fn test_initialize_without_stored_session_makes_no_request() {
    let server = MockServer::start().await;
    let h = harness(&server, &[]);
    assert_eq!(h.manager.state(), AuthState::Loading);

    assert_eq!(h.manager.initialize().await, AuthState::Unauthenticated);
    assert!(!h.manager.is_loading());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_initialize_discards_half_written_session() {
    let server = MockServer::start().await;
    let h = harness(&server, &[(ACCESS_TOKEN_KEY, "orphan".to_string())]);

    assert_eq!(h.manager.initialize().await, AuthState::Unauthenticated);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(h.storage.get_item(ACCESS_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_initialize_confirms_stored_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "admin": admin_json("a1", "Ada L.") })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, &stored_session("tok-1"));
    let AuthState::Authenticated(profile) = h.manager.initialize().await else {
        panic!("expected an authenticated session");
    };
    assert_eq!(profile.name, "Ada L.");

    let stored: Value =
        serde_json::from_str(&h.storage.get_item(PROFILE_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored["name"], "Ada L.");
}

#[tokio::test]
async fn test_initialize_with_rejected_session_refreshes_once_then_logs_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "expired" })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, &stored_session("stale"));
    assert_eq!(h.manager.initialize().await, AuthState::Unauthenticated);
    assert!(!h.manager.is_authenticated());
    assert_eq!(h.storage.get_item(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(h.storage.get_item(PROFILE_KEY).unwrap(), None);
    assert_eq!(h.navigator.redirects(), vec![Redirect::login(None)]);
}

#[tokio::test]
async fn test_login_then_me_reports_same_admin() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-new").await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer tok-new"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "admin": admin_json("a1", "Ada") })),
        )
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    let mut notifications = h.manager.notifier().subscribe();

    let profile = h.manager.login("ada@example.com", "pw").await.unwrap();
    assert!(h.manager.is_authenticated());
    assert!(!h.manager.is_loading());
    assert_eq!(h.storage.get_item(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok-new"));

    let me = h.manager.client().me().await.unwrap();
    assert_eq!(me.id, profile.id);
    assert_eq!(
        drain(&mut notifications),
        vec![(NotificationLevel::Success, "Login successful".to_string())]
    );
}

#[tokio::test]
async fn test_failed_login_reports_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    let mut notifications = h.manager.notifier().subscribe();

    let err = h.manager.login("ada@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationFailed(_)));
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    assert_eq!(
        drain(&mut notifications),
        vec![(NotificationLevel::Error, "Invalid credentials".to_string())]
    );
}

#[tokio::test]
async fn test_failed_login_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({})))
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    let mut notifications = h.manager.notifier().subscribe();
    h.manager.login("ada@example.com", "pw").await.unwrap_err();

    let received = drain(&mut notifications);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, NotificationLevel::Error);
    assert_eq!(received[0].1, "Internal Server Error");
}

#[tokio::test]
async fn test_logout_clears_session_even_when_server_fails() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1").await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    h.manager.login("ada@example.com", "pw").await.unwrap();
    let mut notifications = h.manager.notifier().subscribe();

    h.manager.logout().await;
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    assert_eq!(h.storage.get_item(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(h.storage.get_item(PROFILE_KEY).unwrap(), None);
    assert_eq!(drain(&mut notifications)[0].0, NotificationLevel::Success);
}

#[tokio::test]
async fn test_update_profile_merges_server_fields() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1").await;
    Mock::given(method("PUT"))
        .and(path("/admins/profile"))
        .and(body_json(json!({ "name": "Ada Lovelace" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Profile saved",
            "admin": {
                "_id": "someone-else",
                "name": "Ada Lovelace",
                "email": "ada@example.com",
                "role": "super_admin",
                "permissions": { "canManageBlogs": true, "canViewAnalytics": true }
            }
        })))
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    h.manager.login("ada@example.com", "pw").await.unwrap();
    let mut notifications = h.manager.notifier().subscribe();

    let update = ProfileUpdate {
        name: Some("Ada Lovelace".into()),
        email: None,
    };
    let profile = h.manager.update_profile(&update).await.unwrap();

    assert_eq!(profile.id, "a1");
    assert_eq!(profile.role, Role::BlogManager);
    assert_eq!(profile.name, "Ada Lovelace");
    assert!(profile.has_permission("canViewAnalytics"));
    assert_eq!(h.manager.profile(), Some(profile));

    let stored: Value =
        serde_json::from_str(&h.storage.get_item(PROFILE_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored["name"], "Ada Lovelace");
    assert_eq!(
        drain(&mut notifications),
        vec![(NotificationLevel::Success, "Profile saved".to_string())]
    );
}

#[tokio::test]
async fn test_update_profile_validation_error_leaves_profile_untouched() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1").await;
    Mock::given(method("PUT"))
        .and(path("/admins/profile"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Validation failed",
            "errors": [{ "msg": "Email is invalid", "param": "email" }]
        })))
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    let before = h.manager.login("ada@example.com", "pw").await.unwrap();
    let mut notifications = h.manager.notifier().subscribe();

    let update = ProfileUpdate {
        name: None,
        email: Some("nope".into()),
    };
    let err = h.manager.update_profile(&update).await.unwrap_err();

    assert_eq!(err.field_errors().len(), 1);
    assert_eq!(h.manager.profile(), Some(before));
    assert_eq!(
        drain(&mut notifications),
        vec![(NotificationLevel::Error, "email: Email is invalid".to_string())]
    );
}

#[tokio::test]
async fn test_password_operations_notify_without_touching_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/forgot-password"))
        .and(body_json(json!({ "email": "ada@example.com" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/reset-password"))
        .and(body_json(json!({ "token": "reset-1", "newPassword": "new-pw" })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Token expired" })),
        )
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    h.manager.initialize().await;
    let mut notifications = h.manager.notifier().subscribe();

    h.manager.forgot_password("ada@example.com").await.unwrap();
    let err = h.manager.reset_password("reset-1", "new-pw").await.unwrap_err();
    assert!(matches!(err, ClientError::BadRequest(_)));

    assert_eq!(
        drain(&mut notifications),
        vec![
            (NotificationLevel::Success, "Password reset email sent".to_string()),
            (NotificationLevel::Error, "Token expired".to_string()),
        ]
    );
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn test_change_password_uses_server_message() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1").await;
    Mock::given(method("PUT"))
        .and(path("/admins/change-password"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(json!({ "currentPassword": "pw", "newPassword": "pw2" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Password updated" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    let before = h.manager.login("ada@example.com", "pw").await.unwrap();
    let mut notifications = h.manager.notifier().subscribe();

    h.manager.change_password("pw", "pw2").await.unwrap();
    assert_eq!(h.manager.profile(), Some(before));
    assert_eq!(
        drain(&mut notifications),
        vec![(NotificationLevel::Success, "Password updated".to_string())]
    );
}

#[tokio::test]
async fn test_guard_follows_session_lifecycle() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1").await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let h = harness(&server, &[]);
    assert_eq!(h.manager.guard(&routes::BLOGS, "/blogs"), GuardDecision::Pending);

    h.manager.initialize().await;
    assert_eq!(
        h.manager.check("/blogs?page=2"),
        Some(GuardDecision::Redirect(Redirect::login(Some(
            "/blogs?page=2".to_string()
        ))))
    );

    h.manager.login("ada@example.com", "pw").await.unwrap();
    assert_eq!(h.manager.check("/blogs/7"), Some(GuardDecision::Render));
    assert_eq!(
        h.manager.check("/stories"),
        Some(GuardDecision::Redirect(Redirect::landing()))
    );
    // canManageAdmins in the map does not open the admins page
    assert_eq!(
        h.manager.check("/admins"),
        Some(GuardDecision::Redirect(Redirect::landing()))
    );
    assert_eq!(h.manager.check("/nowhere"), None);

    h.manager.logout().await;
    assert!(matches!(
        h.manager.check("/dashboard"),
        Some(GuardDecision::Redirect(ref r)) if r.is_login()
    ));
}

#[tokio::test]
async fn test_session_persists_across_managers() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-file").await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer tok-file"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "admin": admin_json("a1", "Ada") })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = AdminConfig {
        api_url: server.uri(),
        data_dir: dir.path().join("state"),
        ..AdminConfig::default()
    };
    let navigator: Arc<dyn Navigator> = Arc::new(RecordingNavigator::default());

    let first = SessionManager::from_config(&config, navigator.clone()).unwrap();
    first.login("ada@example.com", "pw").await.unwrap();
    assert!(config.session_path().exists());

    let second = SessionManager::from_config(&config, navigator).unwrap();
    assert!(second.initialize().await.is_authenticated());
    assert_eq!(second.client().store().access_token().as_deref(), Some("tok-file"));
}

#[tokio::test]
async fn test_refresh_cookie_persists_across_managers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refreshToken=r1; HttpOnly; Path=/")
                .set_body_json(json!({
                    "accessToken": "tok-1",
                    "admin": admin_json("a1", "Ada"),
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "admin": admin_json("a1", "Ada") })),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("cookie", "refreshToken=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "tok-2",
            "admin": admin_json("a1", "Ada"),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Logged out" })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = AdminConfig {
        api_url: server.uri(),
        data_dir: dir.path().join("state"),
        ..AdminConfig::default()
    };
    let navigator = Arc::new(RecordingNavigator::default());

    let first = SessionManager::from_config(&config, navigator.clone()).unwrap();
    first.login("ada@example.com", "pw").await.unwrap();
    drop(first);

    // A new process only has the session file to go on
    let second = SessionManager::from_config(&config, navigator.clone()).unwrap();
    assert!(second.initialize().await.is_authenticated());
    assert_eq!(second.client().store().access_token().as_deref(), Some("tok-2"));
    assert!(navigator.redirects().is_empty());

    second.logout().await;
    let file = FileStorage::new(config.session_path());
    assert!(file.get_item(COOKIES_KEY).unwrap().is_none());
    assert!(file.get_item(ACCESS_TOKEN_KEY).unwrap().is_none());
}
