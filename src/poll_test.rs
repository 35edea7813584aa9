use super::*;
use crate::test_helpers::{MockApi, USER_ID, conversation, message};

const FAST: Duration = Duration::from_millis(20);

async fn open_thread() -> (Arc<MockApi>, Arc<MessageThreadStore>) {
    let api = MockApi::new();
    api.with_backend(|b| {
        b.conversations.push(conversation("c-1", "prop-1", "landlord-9", 0));
        b.messages.insert("c-1".into(), vec![message("m-1", "c-1", "landlord-9", "Hello", 0)]);
    });
    let thread = Arc::new(MessageThreadStore::new(api.clone(), USER_ID));
    thread.open("c-1").await.unwrap();
    (api, thread)
}

async fn wait_for(mut ready: impl FnMut() -> bool) {
    for _ in 0..200 {
        if ready() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn polling_merges_new_messages() {
    let (api, thread) = open_thread().await;
    let scheduler = PollingScheduler::new(FAST);
    scheduler.start(thread.clone());
    assert!(scheduler.is_running());

    api.with_backend(|b| b.push_incoming("c-1", "Still available"));
    wait_for(|| thread.messages().len() == 2).await;
    assert_eq!(thread.messages()[1].content, "Still available");
}

#[tokio::test]
async fn merge_callback_receives_newest_message() {
    let (api, thread) = open_thread().await;
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let scheduler = PollingScheduler::new(FAST);
    scheduler.start_with(thread, {
        let seen = seen.clone();
        move |latest| seen.lock().unwrap().push(latest.content.clone())
    });

    api.with_backend(|b| {
        b.push_incoming("c-1", "first");
        b.push_incoming("c-1", "second");
    });
    wait_for(|| !seen.lock().unwrap().is_empty()).await;
    // Ticks with nothing new do not call back.
    tokio::time::sleep(FAST * 4).await;
    assert_eq!(*seen.lock().unwrap(), vec!["second".to_owned()]);
}

#[tokio::test]
async fn first_tick_waits_one_period() {
    let (api, thread) = open_thread().await;
    let scheduler = PollingScheduler::new(Duration::from_millis(200));
    scheduler.start(thread);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(api.calls("get_messages"), 1);
}

#[tokio::test]
async fn stop_before_first_tick_never_refreshes() {
    let (api, thread) = open_thread().await;
    let scheduler = PollingScheduler::new(FAST);
    let token = scheduler.start(thread.clone());
    scheduler.stop();
    thread.close();

    tokio::time::sleep(FAST * 5).await;
    assert!(!token.is_live());
    assert!(!scheduler.is_running());
    assert_eq!(api.calls("get_messages"), 1);
}

#[tokio::test]
async fn restart_replaces_previous_timer() {
    let (_api, thread) = open_thread().await;
    let scheduler = PollingScheduler::new(FAST);
    let first = scheduler.start(thread.clone());
    let second = scheduler.start(thread);
    assert!(!first.is_live());
    assert!(second.is_live());
    assert!(scheduler.is_running());
}

#[tokio::test]
async fn in_flight_refresh_after_close_mutates_nothing() {
    let (api, thread) = open_thread().await;
    let gate = api.gate_next("get_messages");
    let scheduler = PollingScheduler::new(FAST);
    scheduler.start(thread.clone());

    // The poller's refresh is now waiting on the gate.
    wait_for(|| api.calls("get_messages") == 2).await;
    scheduler.stop();
    thread.close();
    api.with_backend(|b| b.push_incoming("c-1", "too late"));
    gate.notify_one();

    tokio::time::sleep(FAST * 3).await;
    assert!(thread.messages().is_empty());
    assert!(thread.conversation_id().is_none());
    assert_eq!(api.calls("get_messages"), 2);
}

#[tokio::test]
async fn dead_token_blocks_refresh_of_reopened_thread() {
    let (api, thread) = open_thread().await;
    let scheduler = PollingScheduler::new(Duration::from_secs(60));
    let token = scheduler.start(thread.clone());

    let gate = api.gate_next("get_messages");
    let pending = tokio::spawn({
        let thread = thread.clone();
        let token = token.clone();
        async move { thread.refresh_if(|| token.is_live()).await }
    });
    wait_for(|| api.calls("get_messages") == 2).await;

    // Polling stops but the same thread stays open.
    scheduler.stop();
    api.with_backend(|b| b.push_incoming("c-1", "ignored"));
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), FetchOutcome::Discarded);
    assert_eq!(thread.messages().len(), 1);
}

#[tokio::test]
async fn drop_stops_polling() {
    let (api, thread) = open_thread().await;
    let scheduler = PollingScheduler::new(FAST);
    let token = scheduler.start(thread);
    drop(scheduler);
    assert!(!token.is_live());
    tokio::time::sleep(FAST * 4).await;
    assert_eq!(api.calls("get_messages"), 1);
}
