#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use channelhub::{ServerConfig, create_app, db::Database, media::LocalMediaStore};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

pub const PASSWORD: &str = "correct-horse-battery";
const BOUNDARY: &str = "channelhub-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub media_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_dir);
    }
}

pub async fn test_app() -> TestApp {
    test_app_with_rates(1000, 1000).await
}

pub async fn test_app_with_rates(login_per_minute: u32, register_per_minute: u32) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let media_dir = std::env::temp_dir().join(format!("channelhub-test-{}", uuid::Uuid::new_v4()));
    let media_base = Url::parse("http://localhost:8000/media/").expect("Invalid URL");

    let config = ServerConfig {
        db: db.clone(),
        media: Arc::new(LocalMediaStore::new(media_dir.clone(), media_base)),
        media_dir: media_dir.clone(),
        access_token_secret: b"test-access-secret-0123456789abcdef".to_vec(),
        refresh_token_secret: b"test-refresh-secret-0123456789abcdef".to_vec(),
        access_token_duration: 900,
        refresh_token_duration: 864_000,
        secure_cookies: false,
        login_rate_per_minute: login_per_minute,
        register_rate_per_minute: register_per_minute,
    };

    TestApp {
        app: create_app(&config),
        db,
        media_dir,
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

/// Build a multipart/form-data body. Returns (content type, body).
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: image/png\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    /// All `Set-Cookie` header values.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// Value of the named cookie as set by this response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookies().into_iter().find_map(|c| {
            let (pair, _) = c.split_once(';')?;
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        json,
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn multipart_request(
    method: &str,
    uri: &str,
    parts: &[Part<'_>],
    cookie: Option<&str>,
) -> Request<Body> {
    let (content_type, body) = multipart(parts);
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn register(app: &Router, username: &str, email: &str) -> TestResponse {
    send(
        app,
        multipart_request(
            "POST",
            "/api/v1/users/register",
            &[
                Part::Text("fullName", "Test User"),
                Part::Text("email", email),
                Part::Text("username", username),
                Part::Text("password", PASSWORD),
                Part::File("avatar", "avatar.png", b"fake avatar bytes"),
            ],
            None,
        ),
    )
    .await
}

pub async fn login(app: &Router, username: &str, password: &str) -> TestResponse {
    send(
        app,
        json_request(
            "POST",
            "/api/v1/users/login",
            serde_json::json!({ "username": username, "password": password }),
            None,
        ),
    )
    .await
}

/// Register and log in; returns the login response.
pub async fn signed_in(app: &Router, username: &str) -> TestResponse {
    let registered = register(app, username, &format!("{}@example.com", username)).await;
    assert_eq!(registered.status, StatusCode::CREATED);
    let response = login(app, username, PASSWORD).await;
    assert_eq!(response.status, StatusCode::OK);
    response
}

/// `Cookie` header carrying the access token from a login/refresh response.
pub fn access_cookie(response: &TestResponse) -> String {
    format!(
        "accessToken={}",
        response.cookie("accessToken").expect("no access cookie")
    )
}

pub fn refresh_cookie(response: &TestResponse) -> String {
    format!(
        "refreshToken={}",
        response.cookie("refreshToken").expect("no refresh cookie")
    )
}
