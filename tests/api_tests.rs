use comeback_portal::{
    AppConfig, AppState, create_router,
    models::{Course, TermRecord},
    repository::{InMemoryRepository, RepositoryState},
    session::{InMemorySessionStore, SessionState},
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

fn course(code: &str, semester: i32) -> Course {
    Course {
        code: code.to_string(),
        title: format!("Course {code}"),
        semester,
        credits: 3.0,
        is_extra: false,
        mid: TermRecord::default(),
        final_term: TermRecord::default(),
    }
}

fn sample_catalog() -> Vec<Course> {
    vec![
        course("CSE-3121", 3),
        course("CSE-3122", 3),
        course("MATH-3107", 3),
        course("CSE-5121", 5),
    ]
}

async fn spawn_app() -> TestApp {
    let config = AppConfig::default();
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
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

fn signup_body(name: &str, id: &str, email: &str, semester: i32) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "universityId": id,
        "email": email,
        "password": "secret123",
        "semester": semester
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_signup_login_logout_lifecycle() {
    let app = spawn_app().await;
    let client = cookie_client();

    // Signup: lower-case id goes in, canonical upper-case comes out.
    let response = client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Alice", "c300001", "alice@example.com", 3))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["universityId"], "C300001");
    assert_eq!(body["user"]["role"], "Student");
    assert!(body["token"].as_str().unwrap().len() > 20);

    // The signup set a session cookie; check-auth must see it.
    let response = client
        .get(format!("{}/check-auth", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["universityId"], "C300001");

    // Logout destroys the session.
    let response = client
        .post(format!("{}/logout", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .get(format!("{}/check-auth", app.address))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["authenticated"], false);

    // Fresh login opens a new session.
    let response = client
        .post(format!("{}/login", app.address))
        .json(&serde_json::json!({ "universityId": "C300001", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["universityId"], "C300001");
}

#[tokio::test]
async fn test_signup_rejects_duplicate_identity() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Alice", "C300002", "dup@example.com", 3))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    // Same university ID (different case), different email.
    let response = client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Bob", "c300002", "bob@example.com", 3))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "duplicate_identity");

    // Same email, different university ID.
    let response = client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Carol", "C300003", "dup@example.com", 3))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "duplicate_identity");
}

#[tokio::test]
async fn test_signup_boundary_validation() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Wrong prefix is rejected before any store call.
    let response = client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Eve", "X300004", "eve@example.com", 3))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "invalid_input");

    // Too few digits passes the boundary prefix check but fails the store's
    // full pattern validation — still invalid_input, still no user created.
    let response = client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Eve", "C3000", "eve@example.com", 3))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Short password.
    let mut body = signup_body("Eve", "C300004", "eve@example.com", 3);
    body["password"] = serde_json::json!("abc");
    let response = client
        .post(format!("{}/signup", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Semester out of range.
    let response = client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Eve", "C300004", "eve@example.com", 9))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_login_failures_are_uniform_and_unlimited() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Dan", "C300005", "dan@example.com", 3))
        .send()
        .await
        .unwrap();

    // Unknown ID and wrong password produce the same failure.
    let response = client
        .post(format!("{}/login", app.address))
        .json(&serde_json::json!({ "universityId": "C999999", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    for _ in 0..3 {
        let response = client
            .post(format!("{}/login", app.address))
            .json(&serde_json::json!({ "universityId": "C300005", "password": "wrong-pass" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["reason"], "unauthenticated");
    }

    // No lockout: the correct secret still works after repeated failures.
    let response = client
        .post(format!("{}/login", app.address))
        .json(&serde_json::json!({ "universityId": "C300005", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_bearer_token_works_without_session_cookie() {
    let app = spawn_app().await;
    // No cookie store: this client drops the session cookie on the floor.
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Fay", "C300006", "fay@example.com", 3))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    // Without cookie or token the protected route rejects.
    let response = client
        .get(format!("{}/user-courses", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // The stateless bearer path authenticates on its own.
    let response = client
        .get(format!("{}/user-courses", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["semester"], 3);
}

#[tokio::test]
async fn test_delete_account_cascades() {
    let app = spawn_app().await;
    let client = cookie_client();

    client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Gil", "C300007", "gil@example.com", 3))
        .send()
        .await
        .unwrap();

    // Record some progress so the cascade has something to remove.
    let response = client
        .post(format!("{}/academic-progress/toggle", app.address))
        .json(&serde_json::json!({ "courseCode": "CSE-3121", "term": "mid", "segmentId": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .delete(format!("{}/user", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The session died with the account.
    let response = client
        .get(format!("{}/check-auth", app.address))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["authenticated"], false);

    // And the credentials are gone.
    let response = client
        .post(format!("{}/login", app.address))
        .json(&serde_json::json!({ "universityId": "C300007", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_public_stats() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/signup", app.address))
        .json(&signup_body("Hal", "C300008", "hal@example.com", 3))
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{}/stats", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["students"], 1);
    assert_eq!(body["courses"], 4);
}
