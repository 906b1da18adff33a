pub mod common;

use bus_ticketing::api;
use reqwest::StatusCode;

#[tokio::test]
async fn retreieves_current_user() {
    let user = common::Client::new()
        .auth(common::ALICE, common::PASSWORD)
        .await
        .user()
        .await
        .unwrap();
    assert_eq!(user.id, api::user::Id::from(1));
    assert_eq!(user.username, "Alice");
    assert_eq!(user.email, common::ALICE);
    assert_eq!(user.role, api::user::Role::User);
}

#[tokio::test]
async fn reads_admin_role_in_any_case() {
    let user = common::Client::new()
        .auth(common::CAROL, common::PASSWORD)
        .await
        .user()
        .await
        .unwrap();
    assert_eq!(user.role, api::user::Role::Admin);
}

#[tokio::test]
async fn fails_when_unauthorized() {
    let status = common::Client::new().user().await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
