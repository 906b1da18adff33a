pub mod common;

use bus_ticketing::api;
use reqwest::StatusCode;

#[tokio::test]
async fn owner_cancels_pending_ticket() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;
    let bob = common::Client::new().auth(common::BOB, common::PASSWORD).await;

    let ticket = alice.book(8, 18, "ONLINE").await.unwrap();

    let status = bob.cancel(ticket.id, "not mine").await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    let status = alice.cancel(ticket.id, "   ").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let canceled = alice.cancel(ticket.id, "changed plans").await.unwrap();
    assert_eq!(canceled.id, ticket.id);
    assert_eq!(canceled.status, api::ticket::Status::Canceled);
    assert_eq!(canceled.reason.as_deref(), Some("changed plans"));

    let status = alice.cancel(ticket.id, "again").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_cancellation_frees_booked_seat() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;
    let carol = common::Client::new()
        .auth(common::CAROL, common::PASSWORD)
        .await;

    let ticket = alice.book(9, 19, "ONLINE").await.unwrap();
    alice.pay(ticket.id, common::BUS_1_SEAT_PRICE).await.unwrap();
    assert!(!alice.seat_is_offered(1, 19).await);

    let canceled = carol.cancel(ticket.id, "bus breakdown").await.unwrap();
    assert_eq!(canceled.status, api::ticket::Status::Canceled);
    assert!(alice.seat_is_offered(1, 19).await);

    let id = i32::from(ticket.id).to_string();
    let status = alice.payment_status(&id).await.unwrap().status;
    assert_eq!(status, api::ticket::Status::Canceled);
}

#[tokio::test]
async fn admin_restores_canceled_ticket() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;
    let carol = common::Client::new()
        .auth(common::CAROL, common::PASSWORD)
        .await;

    let ticket = alice.book(10, 20, "ONLINE").await.unwrap();
    alice.pay(ticket.id, common::BUS_1_SEAT_PRICE).await.unwrap();
    alice.cancel(ticket.id, "changed plans").await.unwrap();
    assert!(alice.seat_is_offered(1, 20).await);

    let status = alice.restore(ticket.id, "undo").await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    let status = carol.restore(ticket.id, "").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let restored = carol.restore(ticket.id, "customer called").await.unwrap();
    assert_eq!(restored.status, api::ticket::Status::Booked);
    assert_eq!(restored.reason.as_deref(), Some("customer called"));
    assert!(!alice.seat_is_offered(1, 20).await);

    let status = carol.restore(ticket.id, "again").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restore_rejects_seat_booked_meanwhile() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;
    let bob = common::Client::new().auth(common::BOB, common::PASSWORD).await;
    let carol = common::Client::new()
        .auth(common::CAROL, common::PASSWORD)
        .await;

    let first = alice.book(11, 21, "ONLINE").await.unwrap();
    alice.cancel(first.id, "changed plans").await.unwrap();

    let second = bob.book(11, 21, "ONLINE").await.unwrap();
    bob.pay(second.id, common::BUS_1_SEAT_PRICE).await.unwrap();

    let status = carol.restore(first.id, "mistake").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_unknown_ticket() {
    let carol = common::Client::new()
        .auth(common::CAROL, common::PASSWORD)
        .await;
    let id = api::ticket::Id::from(99_999_999);

    let status = carol.cancel(id, "missing").await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
    let status = carol.restore(id, "missing").await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn canceling_unpaid_ticket_keeps_seat_of_paid_one() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;
    let bob = common::Client::new().auth(common::BOB, common::PASSWORD).await;

    let unpaid = alice.book(20, 30, "ONLINE").await.unwrap();
    let paid = bob.book(20, 30, "ONLINE").await.unwrap();
    bob.pay(paid.id, common::BUS_1_SEAT_PRICE).await.unwrap();
    assert!(!alice.seat_is_offered(1, 30).await);

    let canceled = alice.cancel(unpaid.id, "too late").await.unwrap();
    assert_eq!(canceled.status, api::ticket::Status::Canceled);

    assert!(!alice.seat_is_offered(1, 30).await);
    let id = i32::from(paid.id).to_string();
    let status = bob.payment_status(&id).await.unwrap().status;
    assert_eq!(status, api::ticket::Status::Booked);

    let status = alice.book(20, 30, "ONLINE").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_cancel_and_restore_frees_seat_each_time() {
    let alice = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await;
    let carol = common::Client::new()
        .auth(common::CAROL, common::PASSWORD)
        .await;
    let schedule_is_listed = |departures: Vec<api::schedule::Departure>| {
        departures
            .iter()
            .any(|d| d.id == api::schedule::Id::from(21))
    };

    let ticket = alice.book(21, 31, "ONLINE").await.unwrap();
    alice.pay(ticket.id, common::BUS_1_SEAT_PRICE).await.unwrap();

    for cycle in 0..3 {
        let canceled = carol.cancel(ticket.id, "bus swap").await.unwrap();
        assert_eq!(canceled.status, api::ticket::Status::Canceled);
        assert!(alice.seat_is_offered(1, 31).await, "cycle {cycle}");
        let departures = alice.route_schedules("1").await.unwrap();
        assert!(schedule_is_listed(departures), "cycle {cycle}");

        let restored = carol.restore(ticket.id, "swap undone").await.unwrap();
        assert_eq!(restored.status, api::ticket::Status::Booked);
        assert!(!alice.seat_is_offered(1, 31).await, "cycle {cycle}");
    }

    carol.cancel(ticket.id, "trip canceled").await.unwrap();
    assert!(alice.seat_is_offered(1, 31).await);
}
