//! E2E tests for the notification store against a fake backend

mod common;

use clipfeed::data::NotificationType;
use clipfeed::store::NotificationStore;
use common::FakeBackend;
use serde_json::json;

struct Fixture {
    backend: FakeBackend,
    ana: String,
}

async fn fixture() -> Fixture {
    let backend = FakeBackend::start().await;
    let ana = backend.create_user("ana@example.com", "secret", "ana");
    let ben = backend.create_user("ben@example.com", "secret", "ben");

    let seeded = [
        ("n1", "like", "liked your video", false),
        ("n2", "follow", "started following you", true),
        ("n3", "comment", "commented: nice", false),
    ];
    for (id, kind, text, read) in seeded {
        backend.seed(
            "notifications",
            json!({
                "id": id,
                "user_id": ana,
                "type": kind,
                "from_user_id": ben,
                "content_id": "v1",
                "text": text,
                "read": read,
            }),
        );
    }
    backend.seed(
        "notifications",
        json!({
            "id": "other",
            "user_id": ben,
            "type": "like",
            "from_user_id": ana,
            "text": "liked your video",
        }),
    );

    Fixture { backend, ana }
}

#[tokio::test]
async fn test_fetch_notifications_counts_unread() {
    let fx = fixture().await;
    let store = NotificationStore::new(fx.backend.client());

    store.fetch_notifications(&fx.ana).await;

    let state = store.snapshot();
    assert!(!state.is_loading);
    assert_eq!(state.error, None);
    let ids: Vec<&str> = state.notifications.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["n3", "n2", "n1"]);
    assert_eq!(state.unread_count, 2);

    let newest = &state.notifications[0];
    assert_eq!(newest.notification_type, NotificationType::Comment);
    assert_eq!(newest.from_username, "ben");
    assert_eq!(newest.from_user_photo_url, "https://img.example.com/ben.png");
    assert_eq!(newest.content_id.as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_mark_as_read_updates_one() {
    let fx = fixture().await;
    let store = NotificationStore::new(fx.backend.client());
    store.fetch_notifications(&fx.ana).await;

    store.mark_as_read("n1").await;

    let state = store.snapshot();
    assert_eq!(state.unread_count, 1);
    assert!(state.notifications.iter().find(|n| n.id == "n1").unwrap().read);
    assert_eq!(fx.backend.row("notifications", "n1")["read"], true);
    assert_eq!(fx.backend.row("notifications", "n3")["read"], false);
}

#[tokio::test]
async fn test_mark_all_as_read_for_current_user() {
    let fx = fixture().await;
    let client = fx.backend.client();
    client
        .sign_in_with_password("ana@example.com", "secret")
        .await
        .unwrap();
    let store = NotificationStore::new(client);
    store.fetch_notifications(&fx.ana).await;

    store.mark_all_as_read().await;

    let state = store.snapshot();
    assert_eq!(state.error, None);
    assert_eq!(state.unread_count, 0);
    assert!(state.notifications.iter().all(|n| n.read));
    assert_eq!(fx.backend.row("notifications", "n3")["read"], true);
    assert_eq!(fx.backend.row("notifications", "other")["read"], false);
}

#[tokio::test]
async fn test_mark_all_as_read_with_revoked_session_is_noop() {
    let fx = fixture().await;
    let client = fx.backend.client();
    client
        .sign_in_with_password("ana@example.com", "secret")
        .await
        .unwrap();
    let store = NotificationStore::new(client);
    store.fetch_notifications(&fx.ana).await;
    fx.backend.revoke_access_tokens();

    store.mark_all_as_read().await;

    let state = store.snapshot();
    assert_eq!(state.error, None);
    assert_eq!(state.unread_count, 2);
    assert_eq!(fx.backend.row("notifications", "n1")["read"], false);
}
