use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Note, PASSWORD};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.to_string()).unwrap()
}

/// Log in against `app` and return the issued token.
async fn obtain_token(app: &axum::Router) -> String {
    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            &format!(r#"{{"username":"tester","password":"{PASSWORD}"}}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let value: serde_json::Value = body_json(resp).await;
    value["token"].as_str().unwrap().to_string()
}

// --- login / logout ---

#[tokio::test]
async fn login_with_bad_password_returns_401() {
    let app = app();
    let resp = app
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            r#"{"username":"tester","password":"wrong"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let value: serde_json::Value = body_json(resp).await;
    assert_eq!(value["error"], "invalid credentials");
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = app();
    let token = obtain_token(&app).await;

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/logout", Some(&token), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // the token no longer authenticates
    let resp = app
        .oneshot(json_request("GET", "/notes", Some(&token), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- notes ---

#[tokio::test]
async fn notes_require_authentication() {
    let app = app();
    let resp = app
        .oneshot(json_request("GET", "/notes", None, ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let value: serde_json::Value = body_json(resp).await;
    assert_eq!(value["error"], "not authenticated");
}

#[tokio::test]
async fn note_crud_roundtrip() {
    let app = app();
    let token = obtain_token(&app).await;

    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/notes",
            Some(&token),
            r#"{"title":"First","body":"hello"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Note = body_json(resp).await;
    assert_eq!(created.title, "First");

    let resp = app
        .clone()
        .oneshot(json_request(
            "GET",
            &format!("/notes/{}", created.id),
            Some(&token),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Note = body_json(resp).await;
    assert_eq!(fetched, created);

    let resp = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            &format!("/notes/{}", created.id),
            Some(&token),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .oneshot(json_request(
            "GET",
            &format!("/notes/{}", created.id),
            Some(&token),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let value: serde_json::Value = body_json(resp).await;
    assert_eq!(value["error"], "not found");
}

// --- plain ---

#[tokio::test]
async fn plain_endpoint_serves_non_json() {
    let app = app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/plain")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.as_ref(), b"not json");
}
