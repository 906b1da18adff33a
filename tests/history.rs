pub mod common;

use bus_ticketing::api;
use reqwest::StatusCode;

#[tokio::test]
async fn user_sees_only_own_history() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;

    let ticket = alice.book(12, 22, "ONLINE").await.unwrap();

    let history = alice.history(1, 100).await.unwrap();
    assert!(history.total_count >= history.tickets.len());
    assert!(history.tickets.iter().any(|t| t.id == ticket.id));
    assert!(history
        .tickets
        .iter()
        .all(|t| t.user_id == api::user::Id::from(1)));

    let page = alice.history(1, 1).await.unwrap();
    assert_eq!(page.tickets.len(), 1);
    assert!(page.total_count >= history.total_count);
}

#[tokio::test]
async fn admin_sees_everyone_history() {
    let bob = common::Client::new().auth(common::BOB, common::PASSWORD).await;
    let carol = common::Client::new()
        .auth(common::CAROL, common::PASSWORD)
        .await;

    bob.book(16, 26, "ONLINE").await.unwrap();

    let mine = bob.history(1, 10).await.unwrap();
    let all = carol.history(1, 10).await.unwrap();
    assert!(all.total_count >= mine.total_count);
    assert!(all.tickets.len() <= 10);
}

#[tokio::test]
async fn admin_lists_tickets_by_status() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;
    let carol = common::Client::new()
        .auth(common::CAROL, common::PASSWORD)
        .await;

    let ticket = alice.book(17, 27, "CASH").await.unwrap();

    let pending = carol.tickets_by_status("pending").await.unwrap();
    assert!(pending.iter().any(|t| t.id == ticket.id));
    assert!(pending
        .iter()
        .all(|t| t.status == api::ticket::Status::Pending));

    let status = carol.tickets_by_status("lost").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = alice.tickets_by_status("PENDING").await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn lists_my_booked_tickets_with_details() {
    let bob = common::Client::new().auth(common::BOB, common::PASSWORD).await;

    let pending = bob.book(18, 28, "ONLINE").await.unwrap();
    let booked = bob.book(13, 23, "ONLINE").await.unwrap();
    bob.pay(booked.id, common::BUS_1_SEAT_PRICE).await.unwrap();

    let mine = bob.my_tickets().await.unwrap();
    assert!(mine.iter().all(|t| {
        t.ticket.status == api::ticket::Status::Booked
            && t.ticket.user_id == api::user::Id::from(2)
    }));
    assert!(!mine.iter().any(|t| t.ticket.id == pending.id));

    let details = mine
        .iter()
        .find(|t| t.ticket.id == booked.id)
        .expect("paid ticket is listed");
    assert_eq!(details.seat_number, "A23");
    assert_eq!(details.departure_station.location, "Hà Nội");
    assert_eq!(details.arrival_station.location, "Đà Nẵng");
}

#[tokio::test]
async fn retrieves_ticket_details() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;

    let ticket = alice.book(19, 29, "ONLINE").await.unwrap();
    let details = common::Client::new().ticket(ticket.id).await.unwrap();
    assert_eq!(details.ticket, ticket);
    assert_eq!(details.seat_number, "A29");
    assert_eq!(details.seat_type, api::seat::Type::Standard);
    assert_eq!(details.bus_name, "Limousine 01");
    assert_eq!(details.company_name, "Phương Trang");
    assert_eq!(details.departure_station.name, "Bến xe Giáp Bát");

    let status = alice
        .ticket(api::ticket::Id::from(99_999_999))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fails_when_unauthorized() {
    let client = common::Client::new();
    let status = client.history(1, 10).await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let status = client.my_tickets().await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
