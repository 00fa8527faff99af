//! Circulation engine integration tests
//!
//! Exercise the stock / loan / reservation consistency rules end to
//! end. Run against a server started with the default dev
//! configuration and a database seeded with scripts/seed.sql:
//! cargo test -- --ignored

mod common;

use chrono::{Duration, Utc};
use common::*;
use reqwest::Client;
use serde_json::{json, Value};

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_borrow_return_round_trip() {
    let client = Client::new();
    let book_id = create_book(&client, "Round Trip", json!({ "total_copies": 1 })).await;
    let due = Utc::now() + Duration::days(14);

    // Borrow the only copy
    let response = borrow(&client, &alice_token(), &book_id, due).await;
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.unwrap();
    assert_eq!(loan["status"], "active");
    assert_eq!(loan["source"], "direct");
    let loan_id = loan["id"].as_str().unwrap().to_string();

    let book = get_book(&client, &book_id).await;
    assert_eq!(book["available_copies"], 0);
    assert_eq!(book["available"], false);

    // A second borrower conflicts
    let response = borrow(&client, &bob_token(), &book_id, due).await;
    assert_eq!(response.status(), 409);

    // Return restores the pre-borrow stock
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "returned");
    assert_eq!(body["loan"]["status"], "returned");

    let book = get_book(&client, &book_id).await;
    assert_eq!(book["available_copies"], 1);

    // Returning twice conflicts
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_reservation_rejected_while_copies_available() {
    let client = Client::new();
    let book_id = create_book(&client, "Still On Shelf", json!({ "total_copies": 1 })).await;

    let response = reserve(&client, &alice_token(), &book_id).await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_reservation_blocks_other_borrowers_and_auto_fulfills() {
    let client = Client::new();
    let book_id = create_book(&client, "Queue Jumping", json!({ "total_copies": 1 })).await;
    let due = Utc::now() + Duration::days(14);

    // Alice takes the only copy, Bob queues up
    let response = borrow(&client, &alice_token(), &book_id, due).await;
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.unwrap();
    let loan_id = loan["id"].as_str().unwrap().to_string();

    let response = reserve(&client, &bob_token(), &book_id).await;
    assert_eq!(response.status(), 201);
    let reservation: Value = response.json().await.unwrap();
    assert_eq!(reservation["status"], "pending");
    let reservation_id = reservation["id"].as_str().unwrap().to_string();

    // A duplicate pending reservation is refused
    let response = reserve(&client, &bob_token(), &book_id).await;
    assert_eq!(response.status(), 409);

    // A third party cannot borrow past Bob's reservation
    let response = borrow(&client, &librarian_token(), &book_id, due).await;
    assert_eq!(response.status(), 409);

    // Alice returns; the freed copy is consumed by Bob's reservation
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let book = get_book(&client, &book_id).await;
    assert_eq!(book["available_copies"], 0);

    // Bob now holds a reservation-sourced active loan
    let response = client
        .get(format!("{}/users/{}/loans?active_only=true", BASE_URL, BOB_ID))
        .header("Authorization", format!("Bearer {}", bob_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let loans: Value = response.json().await.unwrap();
    let bob_loan = loans
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["book_id"] == book_id.as_str())
        .expect("Bob has no loan for the book");
    assert_eq!(bob_loan["source"], "reservation");
    assert_eq!(bob_loan["status"], "active");

    // And his reservation is fulfilled
    let response = client
        .get(format!("{}/reservations?book_id={}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let reservations: Value = response.json().await.unwrap();
    let fulfilled = reservations
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == reservation_id.as_str())
        .expect("Reservation disappeared");
    assert_eq!(fulfilled["status"], "fulfilled");
    assert!(fulfilled["fulfilled_at"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_extension_rules() {
    let client = Client::new();
    let book_id = create_book(&client, "Extended Play", json!({ "total_copies": 1 })).await;
    let due = Utc::now() + Duration::days(5);

    let response = borrow(&client, &alice_token(), &book_id, due).await;
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.unwrap();
    let loan_id = loan["id"].as_str().unwrap().to_string();
    let original_due: chrono::DateTime<Utc> =
        loan["return_date"].as_str().unwrap().parse().unwrap();

    // Out-of-range day counts are invalid
    for days in [0, 31] {
        let response = client
            .post(format!("{}/loans/{}/extend", BASE_URL, loan_id))
            .header("Authorization", format!("Bearer {}", alice_token()))
            .json(&json!({ "days": days }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "days={} should be rejected", days);
    }

    // First extension: +7 days
    let response = client
        .post(format!("{}/loans/{}/extend", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .json(&json!({ "days": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["extension_count"], 1);
    let new_due: chrono::DateTime<Utc> = body["return_date"].as_str().unwrap().parse().unwrap();
    assert_eq!(new_due, original_due + Duration::days(7));

    // Second extension reaches the limit
    let response = client
        .post(format!("{}/loans/{}/extend", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .json(&json!({ "days": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["extension_count"], 2);

    // Third extension conflicts regardless of the day count
    let response = client
        .post(format!("{}/loans/{}/extend", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .json(&json!({ "days": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_take_exactly_one_copy() {
    let client = Client::new();
    let book_id = create_book(&client, "Contended", json!({ "total_copies": 1 })).await;
    let due = Utc::now() + Duration::days(14);

    let alice = alice_token();
    let bob = bob_token();
    let (a, b) = tokio::join!(
        borrow(&client, &alice, &book_id, due),
        borrow(&client, &bob, &book_id, due),
    );

    let statuses = [a.status().as_u16(), b.status().as_u16()];
    let wins = statuses.iter().filter(|s| **s == 201).count();
    let conflicts = statuses.iter().filter(|s| **s == 409).count();
    assert_eq!(wins, 1, "exactly one borrower must win: {:?}", statuses);
    assert_eq!(conflicts, 1);

    let book = get_book(&client, &book_id).await;
    assert_eq!(book["available_copies"], 0);
}

#[tokio::test]
#[ignore]
async fn test_change_availability_feeds_the_queue_in_order() {
    let client = Client::new();
    // Two copies, none on the shelf
    let book_id = create_book(
        &client,
        "Back In Stock",
        json!({ "total_copies": 2, "available": false }),
    )
    .await;

    let response = reserve(&client, &alice_token(), &book_id).await;
    assert_eq!(response.status(), 201);
    let response = reserve(&client, &bob_token(), &book_id).await;
    assert_eq!(response.status(), 201);

    // Freeing the copies fulfills both reservations
    let response = client
        .put(format!("{}/books/{}/availability", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&json!({ "available": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["fulfilled_reservations"], 2);
    assert_eq!(body["book"]["available_copies"], 0);

    // Alice queued first, so her loan opened first
    let response = client
        .get(format!("{}/reservations?book_id={}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .unwrap();
    let reservations: Value = response.json().await.unwrap();
    for r in reservations.as_array().unwrap() {
        assert_eq!(r["status"], "fulfilled");
    }
}

#[tokio::test]
#[ignore]
async fn test_availability_cannot_exceed_copies_not_on_loan() {
    let client = Client::new();
    let book_id = create_book(&client, "Overcommitted", json!({ "total_copies": 2 })).await;
    let due = Utc::now() + Duration::days(14);

    let response = borrow(&client, &alice_token(), &book_id, due).await;
    assert_eq!(response.status(), 201);

    // One copy is out; freeing both is a conflict
    let response = client
        .put(format!("{}/books/{}/availability", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&json!({ "available_copies": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Freeing the remaining copy is fine
    let response = client
        .put(format!("{}/books/{}/availability", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&json!({ "available_copies": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
#[ignore]
async fn test_cancel_reservation_authorization() {
    let client = Client::new();
    let book_id = create_book(
        &client,
        "Cancelled Plans",
        json!({ "total_copies": 1, "available": false }),
    )
    .await;

    let response = reserve(&client, &alice_token(), &book_id).await;
    assert_eq!(response.status(), 201);
    let reservation: Value = response.json().await.unwrap();
    let reservation_id = reservation["id"].as_str().unwrap().to_string();

    // Bob cannot cancel Alice's reservation
    let response = client
        .delete(format!("{}/reservations/{}", BASE_URL, reservation_id))
        .header("Authorization", format!("Bearer {}", bob_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Alice can
    let response = client
        .delete(format!("{}/reservations/{}", BASE_URL, reservation_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Cancelled reservations are terminal
    let response = client
        .delete(format!("{}/reservations/{}", BASE_URL, reservation_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_delete_active_loan_releases_stock() {
    let client = Client::new();
    let book_id = create_book(&client, "Struck Off", json!({ "total_copies": 1 })).await;
    let due = Utc::now() + Duration::days(14);

    let response = borrow(&client, &alice_token(), &book_id, due).await;
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.unwrap();
    let loan_id = loan["id"].as_str().unwrap().to_string();

    // Regular users cannot delete loans
    let response = client
        .delete(format!("{}/loans/{}", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", alice_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .delete(format!("{}/loans/{}", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let book = get_book(&client, &book_id).await;
    assert_eq!(book["available_copies"], 1);
}

#[tokio::test]
#[ignore]
async fn test_borrow_requires_future_return_date() {
    let client = Client::new();
    let book_id = create_book(&client, "Time Traveller", json!({ "total_copies": 1 })).await;

    let response = borrow(&client, &alice_token(), &book_id, Utc::now() - Duration::days(1)).await;
    assert_eq!(response.status(), 400);

    // The failed borrow left the stock untouched
    let book = get_book(&client, &book_id).await;
    assert_eq!(book["available_copies"], 1);
}
