mod common;

use axum::http::StatusCode;
use common::{Part, multipart_request, register, send, test_app, test_app_with_rates};

#[tokio::test]
async fn test_register_success() {
    let t = test_app().await;

    let response = register(&t.app, "Alice", "alice@example.com").await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json["statusCode"], 201);
    assert_eq!(response.json["success"], true);

    let user = &response.json["data"];
    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["fullName"], "Test User");
    assert!(user["avatar"].as_str().unwrap().starts_with("http://localhost:8000/media/"));
    assert_eq!(user["coverImage"], "");
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("refreshToken").is_none());
}

#[tokio::test]
async fn test_register_stores_hash_not_password() {
    let t = test_app().await;
    register(&t.app, "alice", "alice@example.com").await;

    let account = t.db.users().get_by_username("alice").await.unwrap().unwrap();
    assert_ne!(account.password_hash, common::PASSWORD);
    assert!(account.password_hash.starts_with("$argon2"));
    assert!(account.refresh_token.is_none());
}

#[tokio::test]
async fn test_register_with_cover_image() {
    let t = test_app().await;

    let response = send(
        &t.app,
        multipart_request(
            "POST",
            "/api/v1/users/register",
            &[
                Part::Text("fullName", "Alice"),
                Part::Text("email", "alice@example.com"),
                Part::Text("username", "alice"),
                Part::Text("password", "pw"),
                Part::File("avatar", "a.png", b"avatar"),
                Part::File("coverImage", "c.png", b"cover"),
            ],
            None,
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let cover = response.json["data"]["coverImage"].as_str().unwrap();
    assert!(cover.ends_with(".png"));
    assert_ne!(cover, response.json["data"]["avatar"].as_str().unwrap());
}

#[tokio::test]
async fn test_register_missing_fields() {
    let t = test_app().await;

    let response = send(
        &t.app,
        multipart_request(
            "POST",
            "/api/v1/users/register",
            &[
                Part::Text("fullName", "  "),
                Part::Text("email", "alice@example.com"),
                Part::Text("username", "alice"),
                Part::Text("password", "pw"),
                Part::File("avatar", "a.png", b"avatar"),
            ],
            None,
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["message"], "All fields are required");
    assert_eq!(response.json["success"], false);
    assert!(response.json["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_missing_avatar() {
    let t = test_app().await;

    let response = send(
        &t.app,
        multipart_request(
            "POST",
            "/api/v1/users/register",
            &[
                Part::Text("fullName", "Alice"),
                Part::Text("email", "alice@example.com"),
                Part::Text("username", "alice"),
                Part::Text("password", "pw"),
                // Empty part, as browsers send when no file was picked
                Part::File("avatar", "", b""),
            ],
            None,
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["message"], "Avatar file is required");
    assert!(t.db.users().get_by_username("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_rejects_svg_avatar() {
    let t = test_app().await;

    let response = send(
        &t.app,
        multipart_request(
            "POST",
            "/api/v1/users/register",
            &[
                Part::Text("fullName", "Eve"),
                Part::Text("email", "eve@example.com"),
                Part::Text("username", "eve"),
                Part::Text("password", "pw"),
                Part::File("avatar", "evil.svg", b"<svg><script>alert(1)</script></svg>"),
            ],
            None,
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(t.db.users().get_by_username("eve").await.unwrap().is_none());
    assert!(!t.media_dir.exists());
}

#[tokio::test]
async fn test_register_invalid_username() {
    let t = test_app().await;

    let response = register(&t.app, "alice@bob", "alice@example.com").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let long = "a".repeat(33);
    let response = register(&t.app, &long, "alice@example.com").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_duplicates() {
    let t = test_app().await;
    assert_eq!(
        register(&t.app, "alice", "alice@example.com").await.status,
        StatusCode::CREATED
    );

    let same_username = register(&t.app, "ALICE", "other@example.com").await;
    assert_eq!(same_username.status, StatusCode::CONFLICT);
    assert_eq!(
        same_username.json["message"],
        "User with this username already exists"
    );

    let same_email = register(&t.app, "bob", "alice@example.com").await;
    assert_eq!(same_email.status, StatusCode::CONFLICT);
    assert_eq!(same_email.json["message"], "User with this email already exists");

    let both = register(&t.app, "alice", "alice@example.com").await;
    assert_eq!(both.status, StatusCode::CONFLICT);
    assert_eq!(
        both.json["message"],
        "User with this email and username already exists"
    );
}

#[tokio::test]
async fn test_register_rate_limited() {
    let t = test_app_with_rates(1000, 2).await;

    assert_eq!(register(&t.app, "a1", "a1@example.com").await.status, StatusCode::CREATED);
    assert_eq!(register(&t.app, "a2", "a2@example.com").await.status, StatusCode::CREATED);

    let limited = register(&t.app, "a3", "a3@example.com").await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json["statusCode"], 429);
    assert_eq!(limited.json["success"], false);
}
