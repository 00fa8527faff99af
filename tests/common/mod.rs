//! Shared helpers for integration tests
#![allow(dead_code)]

use reqwest::Client;
use serde_json::{json, Value};

pub const BASE_URL: &str = "http://localhost:8080/api/v1";
pub const JWT_SECRET: &str = "change-this-secret-in-production";

// Fixed ids from scripts/seed.sql
pub const ADMIN_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const LIBRARIAN_ID: &str = "22222222-2222-2222-2222-222222222222";
pub const ALICE_ID: &str = "33333333-3333-3333-3333-333333333333";
pub const BOB_ID: &str = "44444444-4444-4444-4444-444444444444";

#[derive(serde::Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    role: &'a str,
    exp: usize,
}

/// Mint a token the way the external identity service would
pub fn token_for(user_id: &str, role: &str) -> String {
    let claims = TestClaims {
        sub: user_id,
        role,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to encode test token")
}

pub fn admin_token() -> String {
    token_for(ADMIN_ID, "admin")
}

pub fn librarian_token() -> String {
    token_for(LIBRARIAN_ID, "librarian")
}

pub fn alice_token() -> String {
    token_for(ALICE_ID, "user")
}

pub fn bob_token() -> String {
    token_for(BOB_ID, "user")
}

/// Create a book as admin and return its id
pub async fn create_book(client: &Client, title: &str, body: Value) -> String {
    let mut payload = json!({
        "title": title,
        "author": "Test Author",
        "genre": "Testing",
    });
    payload
        .as_object_mut()
        .unwrap()
        .extend(body.as_object().unwrap().clone());

    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&payload)
        .send()
        .await
        .expect("Failed to create book");

    assert_eq!(response.status(), 201, "book creation failed");
    let body: Value = response.json().await.expect("Failed to parse book");
    body["id"].as_str().expect("No book ID").to_string()
}

/// Fetch a book as admin
pub async fn get_book(client: &Client, book_id: &str) -> Value {
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .expect("Failed to get book");

    assert!(response.status().is_success());
    response.json().await.expect("Failed to parse book")
}

/// Borrow a book; returns the raw response
pub async fn borrow(
    client: &Client,
    token: &str,
    book_id: &str,
    return_date: chrono::DateTime<chrono::Utc>,
) -> reqwest::Response {
    client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "book_id": book_id,
            "return_date": return_date.to_rfc3339(),
        }))
        .send()
        .await
        .expect("Failed to send borrow request")
}

/// Reserve a book; returns the raw response
pub async fn reserve(client: &Client, token: &str, book_id: &str) -> reqwest::Response {
    client
        .post(format!("{}/reservations", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send reserve request")
}
