//! Enrollment resolver behavior over the HTTP surface: home derivation,
//! the extra-course overlay, and the contractual error ordering.

use comeback_portal::{
    AppConfig, AppState, create_router,
    models::{Course, TermRecord},
    repository::{InMemoryRepository, RepositoryState},
    session::{InMemorySessionStore, SessionState},
};
use std::sync::Arc;
use tokio::net::TcpListener;

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

/// Five cohort-3 courses and two cohort-5 courses.
fn sample_catalog() -> Vec<Course> {
    vec![
        course("CSE-3121", 3),
        course("CSE-3122", 3),
        course("CSE-3123", 3),
        course("MATH-3107", 3),
        course("PHY-3101", 3),
        course("CSE-5121", 5),
        course("CSE-5122", 5),
    ]
}

async fn spawn_app() -> String {
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

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

/// Signs up a cohort-3 student and returns an authenticated cookie client.
async fn authed_client(address: &str) -> reqwest::Client {
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();
    let response = client
        .post(format!("{address}/signup"))
        .json(&serde_json::json!({
            "name": "Enrollment Tester",
            "universityId": "C310001",
            "email": "enroll@example.com",
            "password": "secret123",
            "semester": 3
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    client
}

async fn enrolled_course_count(client: &reqwest::Client, address: &str) -> usize {
    let response = client
        .get(format!("{address}/user-courses"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    body["courses"].as_array().unwrap().len()
}

#[tokio::test]
async fn test_home_extra_union_scenario() {
    let address = spawn_app().await;
    let client = authed_client(&address).await;

    // Cohort 3 sees its five home courses.
    assert_eq!(enrolled_course_count(&client, &address).await, 5);

    // Opting into a cohort-5 course grows the union to six.
    let response = client
        .post(format!("{address}/add-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-5121" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["extraCourses"], serde_json::json!(["CSE-5121"]));

    assert_eq!(enrolled_course_count(&client, &address).await, 6);

    // The extra course is flagged in the derived view; home courses are not.
    let response = client
        .get(format!("{address}/user-courses"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let courses = body["courses"].as_array().unwrap();
    let extra_flags: Vec<bool> = courses
        .iter()
        .filter(|c| c["code"] == "CSE-5121")
        .map(|c| c["isExtra"].as_bool().unwrap())
        .collect();
    assert_eq!(extra_flags, vec![true]);
    assert!(
        courses
            .iter()
            .filter(|c| c["code"] != "CSE-5121")
            .all(|c| !c["isExtra"].as_bool().unwrap())
    );

    // Removing it returns to the plain home set.
    let response = client
        .post(format!("{address}/remove-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-5121" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    assert_eq!(enrolled_course_count(&client, &address).await, 5);
}

#[tokio::test]
async fn test_add_course_error_ordering() {
    let address = spawn_app().await;
    let client = authed_client(&address).await;

    // Unknown code: existence check runs first.
    let response = client
        .post(format!("{address}/add-course"))
        .json(&serde_json::json!({ "courseCode": "NOPE-0000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "not_found");

    // A home course must surface as already_enrolled, not a generic failure.
    let response = client
        .post(format!("{address}/add-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-3121" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "already_enrolled");
}

#[tokio::test]
async fn test_double_add_conflicts() {
    let address = spawn_app().await;
    let client = authed_client(&address).await;

    let response = client
        .post(format!("{address}/add-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-5122" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{address}/add-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-5122" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "already_enrolled");
}

#[tokio::test]
async fn test_remove_course_detects_stale_state() {
    let address = spawn_app().await;
    let client = authed_client(&address).await;

    // Never added: the failure is explicit so stale clients notice.
    let response = client
        .post(format!("{address}/remove-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-5121" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "not_in_extra");

    // Home courses are never individually revocable either.
    let response = client
        .post(format!("{address}/remove-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-3121" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_all_courses_marks_enrollment() {
    let address = spawn_app().await;
    let client = authed_client(&address).await;

    client
        .post(format!("{address}/add-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-5121" }))
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{address}/all-courses"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();

    // The whole catalog is visible.
    assert_eq!(body["courses"].as_array().unwrap().len(), 7);
    assert_eq!(body["userSemester"], 3);

    // Enrolled codes = five home + one extra.
    let enrolled: Vec<&str> = body["enrolledCodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(enrolled.len(), 6);
    assert!(enrolled.contains(&"CSE-5121"));
    assert!(!enrolled.contains(&"CSE-5122"));
}

#[tokio::test]
async fn test_my_courses_is_home_only() {
    let address = spawn_app().await;
    let client = authed_client(&address).await;

    client
        .post(format!("{address}/add-course"))
        .json(&serde_json::json!({ "courseCode": "CSE-5121" }))
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{address}/my-courses"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    // The overlay never leaks into the home set.
    assert_eq!(body["courses"].as_array().unwrap().len(), 5);
    assert_eq!(body["semester"], 3);
}
