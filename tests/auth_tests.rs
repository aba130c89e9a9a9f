//! Authentication, authorization, and super-admin behavior over the real
//! router with in-memory stores.

use comeback_portal::{
    AppConfig, AppState, create_router,
    models::{Course, TermRecord},
    repository::{InMemoryRepository, RepositoryState},
    session::{InMemorySessionStore, SessionState},
};
use std::sync::Arc;
use tokio::net::TcpListener;

fn sample_catalog() -> Vec<Course> {
    vec![Course {
        code: "CSE-3121".to_string(),
        title: "Data Structures".to_string(),
        semester: 3,
        credits: 3.0,
        is_extra: false,
        mid: TermRecord::default(),
        final_term: TermRecord::default(),
    }]
}

async fn spawn_app_with_config(config: AppConfig) -> String {
    let repo = Arc::new(InMemoryRepository::with_catalog(sample_catalog())) as RepositoryState;
    let sessions =
        Arc::new(InMemorySessionStore::new(config.session_ttl_hours)) as SessionState;

    let state = AppState {
        repo,
        sessions,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

async fn spawn_app() -> String {
    spawn_app_with_config(AppConfig::default()).await
}

fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

async fn signup(client: &reqwest::Client, address: &str, id: &str, email: &str) -> serde_json::Value {
    let response = client
        .post(format!("{address}/signup"))
        .json(&serde_json::json!({
            "name": format!("User {id}"),
            "universityId": id,
            "email": email,
            "password": "secret123",
            "semester": 3
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201, "signup failed for {id}");
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_protected_route_requires_auth() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for path in ["/user-courses", "/all-courses", "/my-courses"] {
        let response = client
            .get(format!("{address}{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401, "{path} must reject anonymous calls");
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["reason"], "unauthenticated");
    }
}

#[tokio::test]
async fn test_super_admin_promoted_on_login() {
    let address = spawn_app().await;
    let client = cookie_client();

    // The super-identity signs up like anyone else and starts as Student.
    let body = signup(&client, &address, "C241079", "super@example.com").await;
    assert_eq!(body["user"]["role"], "Student");

    // check-auth is a pure read: it does not elevate.
    let response = client
        .get(format!("{address}/check-auth"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["role"], "Student");

    // The grant runs on the successful-login path.
    let response = client
        .post(format!("{address}/login"))
        .json(&serde_json::json!({ "universityId": "C241079", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["role"], "Admin");

    // And the elevated role opens the admin surface.
    let response = client
        .get(format!("{address}/admin/moderators"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_super_admin_demotion_is_always_rejected() {
    let address = spawn_app().await;
    let client = cookie_client();

    signup(&client, &address, "C241079", "super@example.com").await;
    client
        .post(format!("{address}/login"))
        .json(&serde_json::json!({ "universityId": "C241079", "password": "secret123" }))
        .send()
        .await
        .unwrap();

    // Self-demotion of the protected identity fails unconditionally.
    let response = client
        .post(format!("{address}/admin/demote"))
        .json(&serde_json::json!({ "universityId": "C241079" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "protected_identity");

    // Lower-cased spelling of the same key is caught by normalization.
    let response = client
        .post(format!("{address}/admin/demote"))
        .json(&serde_json::json!({ "universityId": "c241079" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_student_is_forbidden_from_admin_and_moderator_surfaces() {
    let address = spawn_app().await;
    let client = cookie_client();

    signup(&client, &address, "C300010", "student@example.com").await;

    let response = client
        .get(format!("{address}/admin/moderators"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "forbidden");

    let response = client
        .post(format!("{address}/admin/promote"))
        .json(&serde_json::json!({ "universityId": "C300010" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .post(format!("{address}/moderator/add-resource"))
        .json(&serde_json::json!({
            "courseCode": "CSE-3121",
            "term": "mid",
            "name": "Notes",
            "link": "https://example.com/notes",
            "type": "notes"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_expired_session_reads_as_unauthenticated() {
    // Zero-hour TTL: every session is dead on arrival.
    let config = AppConfig {
        session_ttl_hours: 0,
        ..AppConfig::default()
    };
    let address = spawn_app_with_config(config).await;
    let client = cookie_client();

    signup(&client, &address, "C300011", "ttl@example.com").await;

    // The cookie is present but the server-side session has already expired.
    let response = client
        .get(format!("{address}/check-auth"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["authenticated"], false);

    let response = client
        .get(format!("{address}/user-courses"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_local_bypass_header_resolves_real_users_only() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let body = signup(&client, &address, "C300012", "bypass@example.com").await;
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    // Env::Local honors the x-user-id header for a user that exists.
    let response = client
        .get(format!("{address}/my-courses"))
        .header("x-user-id", &user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // An unknown UUID falls through to the normal (failing) auth path.
    let response = client
        .get(format!("{address}/my-courses"))
        .header("x-user-id", uuid::Uuid::new_v4().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}
