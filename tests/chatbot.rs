pub mod common;

use reqwest::StatusCode;

const INTENTS: [&str; 5] = [
    "book_ticket",
    "collect_information",
    "booking_help",
    "contact_support",
    "greeting",
];

#[tokio::test]
async fn rejects_blank_message() {
    let status = common::Client::new()
        .chat("   ", Some(1))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn answers_anonymous_message() {
    let reply = common::Client::new().chat("xin chào", None).await.unwrap();
    assert!(INTENTS.contains(&reply.intent.as_str()));
    assert!(!reply.reply.is_empty());
    assert!(reply.data.is_some());
}

#[tokio::test]
async fn clears_conversation_state() {
    let client = common::Client::new();
    client.chat("tôi muốn đặt vé", Some(3)).await.unwrap();
    client.clear_conversation("3").await.unwrap();
    client.clear_conversation("3").await.unwrap();

    let status = client.clear_conversation("abc").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
