use super::*;
use crate::test_helpers::{MockApi, USER_ID, at, conversation, message};

async fn signed_in() -> (Arc<MockApi>, Session) {
    let api = MockApi::new();
    api.with_backend(|b| {
        b.conversations.push(conversation("c-1", "prop-1", "landlord-9", 2));
        b.conversations.push(conversation("c-2", "prop-2", "landlord-7", 0));
        b.messages.insert(
            "c-1".into(),
            vec![message("m-1", "c-1", "landlord-9", "Hello", 0), message("m-2", "c-1", "landlord-9", "Still there?", 5)],
        );
        b.messages.insert("c-2".into(), vec![message("m-3", "c-2", USER_ID, "Thanks", 1)]);
    });
    let session = Session::new(api.clone(), USER_ID, Duration::from_secs(60));
    session.load().await.unwrap();
    (api, session)
}

fn new_conversation(property_id: &str, partner_id: &str, text: &str) -> NewConversation {
    let template = conversation("", property_id, partner_id, 0);
    NewConversation { property: template.property, partner: template.partner, initial_message: text.into() }
}

#[tokio::test]
async fn open_conversation_reads_and_polls() {
    let (api, session) = signed_in().await;
    session.open_conversation("c-1").await.unwrap();

    assert_eq!(session.conversations().get("c-1").unwrap().unread_count, 0);
    assert_eq!(session.conversations().active().as_deref(), Some("c-1"));
    assert_eq!(session.thread().messages().len(), 2);
    assert!(session.is_polling());
    // The thread fetch doubles as the read acknowledgement.
    assert_eq!(api.calls("get_messages"), 1);
}

#[tokio::test]
async fn open_conversation_syncs_preview_from_thread() {
    let (_api, session) = signed_in().await;
    session.open_conversation("c-1").await.unwrap();

    let preview = session.conversations().get("c-1").unwrap();
    assert_eq!(preview.last_message.as_deref(), Some("Still there?"));
    assert_eq!(preview.last_message_at, Some(at(5)));
}

#[tokio::test]
async fn polled_message_updates_preview() {
    let (api, _) = signed_in().await;
    let session = Session::new(api.clone(), USER_ID, Duration::from_millis(20));
    session.load().await.unwrap();
    session.open_conversation("c-1").await.unwrap();

    let incoming = api.with_backend(|b| b.push_incoming("c-1", "New from landlord"));
    for _ in 0..200 {
        if session.conversations().get("c-1").unwrap().last_message.as_deref() == Some("New from landlord") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let preview = session.conversations().get("c-1").unwrap();
    assert_eq!(preview.last_message.as_deref(), Some("New from landlord"));
    assert_eq!(preview.last_message_at, Some(incoming.timestamp));
}

#[tokio::test]
async fn manual_refresh_updates_preview_and_order() {
    let (api, session) = signed_in().await;
    session.open_conversation("c-2").await.unwrap();
    session.open_conversation("c-1").await.unwrap();
    assert_eq!(session.conversations().conversations()[0].id, "c-1");

    api.with_backend(|b| b.push_incoming("c-1", "Any questions?"));
    session.refresh_thread().await.unwrap();
    assert_eq!(
        session.conversations().get("c-1").unwrap().last_message.as_deref(),
        Some("Any questions?")
    );
    assert_eq!(session.thread().messages().last().unwrap().content, "Any questions?");
}

#[tokio::test]
async fn switching_conversations_replaces_thread() {
    let (_api, session) = signed_in().await;
    session.open_conversation("c-1").await.unwrap();
    session.open_conversation("c-2").await.unwrap();

    let messages = session.thread().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "Thanks");
    assert!(session.is_polling());
}

#[tokio::test]
async fn failed_open_does_not_poll() {
    let (api, session) = signed_in().await;
    api.fail_next("get_messages", ApiError::NotFound("c-1".into()));
    assert!(session.open_conversation("c-1").await.is_err());
    assert!(!session.is_polling());
}

#[tokio::test]
async fn send_updates_thread_and_preview() {
    let (_api, session) = signed_in().await;
    session.open_conversation("c-2").await.unwrap();

    let sent = session.send("When can I view it?").await.unwrap();

    let ids: Vec<String> = session.conversations().conversations().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["c-2", "c-1"]);
    let preview = session.conversations().get("c-2").unwrap();
    assert_eq!(preview.last_message.as_deref(), Some("When can I view it?"));
    assert_eq!(preview.last_message_at, Some(sent.created_at));
    assert_eq!(session.thread().messages().last().unwrap().id, sent.id);
}

#[tokio::test]
async fn failed_send_restores_preview_and_returns_text() {
    let (api, session) = signed_in().await;
    session.open_conversation("c-2").await.unwrap();
    let before_list = session.conversations().conversations();
    let before_thread = session.thread().messages();

    api.fail_next("send_message", ApiError::Network("offline".into()));
    let failure = session.send("hello").await.unwrap_err();

    assert_eq!(failure.content, "hello");
    assert_eq!(session.conversations().conversations(), before_list);
    assert_eq!(session.thread().messages(), before_thread);
}

#[tokio::test]
async fn new_conversation_then_open() {
    let api = MockApi::new();
    let session = Session::new(api.clone(), USER_ID, Duration::from_secs(60));

    let started = session
        .start_conversation(new_conversation("prop-1", "landlord-9", "Is this available?"))
        .await
        .unwrap();
    assert_eq!(started.conversation_id(), "c-1");

    let list = session.conversations().conversations();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].last_message.as_deref(), Some("Is this available?"));
    assert_eq!(list[0].unread_count, 0);

    session.open_conversation(started.conversation_id()).await.unwrap();
    let thread = session.thread().messages();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].sender_id, USER_ID);
}

#[tokio::test]
async fn close_conversation_stops_everything() {
    let (_api, session) = signed_in().await;
    session.open_conversation("c-1").await.unwrap();
    session.close_conversation();

    assert!(!session.is_polling());
    assert!(session.thread().conversation_id().is_none());
    assert!(session.conversations().active().is_none());
}

#[tokio::test]
async fn sign_out_clears_stores() {
    let (_api, session) = signed_in().await;
    session.open_conversation("c-1").await.unwrap();
    let thread = session.thread().clone();
    session.sign_out();
    assert!(thread.messages().is_empty());
    assert!(thread.conversation_id().is_none());
}
