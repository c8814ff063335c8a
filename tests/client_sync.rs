use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::mpsc, time::timeout};

use anonchat::{
    client::{ClientErr, Event, RoomClient},
    clock::SystemClock,
    config::Settings,
    error::AppErr,
    room::{Limits, MessageView},
    routes,
    session::RoomService,
    state::AppState,
    sync::{SyncState, SyncStatus},
};

async fn serve() -> String {
    let settings = Settings::from_lookup(|_| None).unwrap();
    let rooms = Arc::new(RoomService::new(Arc::new(SystemClock), Limits::default()));
    let app = routes::app(AppState::new(rooms, &settings));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await
    });
    format!("http://{addr}")
}

fn client(base: &str, agent: &str) -> RoomClient {
    let http = reqwest::Client::builder().user_agent(agent).build().unwrap();
    RoomClient::with_client(http, base)
}

#[tokio::test]
async fn polling_member_sees_messages_then_expiry() {
    let base = serve().await;
    let mut alice = client(&base, "alice-browser");
    let mut bob = client(&base, "bob-browser");

    let created = alice.create("Alice", "sync test").await.unwrap();
    let joined = bob.join(&created.code, "Bob").await.unwrap();
    assert_eq!(joined.room.users.len(), 2);

    let limits = bob.limits().await.unwrap();
    let mut session = SyncState::new(created.code.clone(), joined.client_id.clone(), limits);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = tokio::spawn(async move {
        let status = bob
            .poll(&mut session, Duration::from_millis(50), |e| {
                if let Event::Update(u) = e {
                    let _ = tx.send(u.fresh.clone());
                }
            })
            .await;
        (status, session)
    });

    // first poll renders the whole history
    let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.iter().map(MessageView::text).collect::<Vec<_>>(), ["Bob joined"]);

    // let the clock move past the cursor's second
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    alice.send(&created.code, &created.client_id, "hello bob").await.unwrap();

    let fresh = timeout(Duration::from_secs(5), async {
        loop {
            let batch = rx.recv().await.unwrap();
            if !batch.is_empty() {
                return batch;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].text(), "hello bob");

    alice.kill(&created.code, Some(&created.client_id)).await.unwrap();
    let (status, session) = timeout(Duration::from_secs(5), poller).await.unwrap().unwrap();
    assert_eq!(status, SyncStatus::Expired);
    assert_eq!(session.code(), None);
    assert_eq!(session.client_id(), None);
}

#[tokio::test]
async fn say_folds_own_message_into_session() {
    let base = serve().await;
    let mut alice = client(&base, "alice-browser");

    let created = alice.create("Alice", "").await.unwrap();
    let limits = alice.limits().await.unwrap();
    let mut session = SyncState::new(created.code.clone(), created.client_id.clone(), limits);

    let update = alice.say(&mut session, "<b>first</b> line").await.unwrap();
    assert!(update.reset);
    assert_eq!(update.fresh[0].text(), "first line");
    assert_eq!(update.online, 1);
    assert!(update.time_left > 0);
    assert!(session.cursor() > 0);
}

#[tokio::test]
async fn countdown_ticks_between_polls() {
    let base = serve().await;
    let mut alice = client(&base, "alice-browser");
    let created = alice.create("Alice", "").await.unwrap();
    let limits = alice.limits().await.unwrap();
    let mut session = SyncState::new(created.code.clone(), created.client_id.clone(), limits);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = tokio::spawn(async move {
        alice
            .poll(&mut session, Duration::from_secs(60), |e| {
                let seen = match e {
                    Event::Update(u) => ("update", u.time_left),
                    Event::Tick(c) => ("tick", c.remaining()),
                };
                let _ = tx.send(seen);
            })
            .await
    });

    let (kind, left) = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert_eq!(kind, "update");
    let (kind, ticked) = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert_eq!(kind, "tick");
    assert_eq!(ticked, left - 1);

    poller.abort();
}

#[tokio::test]
async fn closing_a_session_kills_the_room() {
    let base = serve().await;
    let mut alice = client(&base, "alice-browser");
    let created = alice.create("Alice", "").await.unwrap();
    let limits = alice.limits().await.unwrap();
    let mut session = SyncState::new(created.code.clone(), created.client_id.clone(), limits);

    let killed = alice.close(&mut session).await.unwrap();
    assert_eq!(killed.message, "Room deleted successfully");
    assert_eq!(session.status(), SyncStatus::Killed);
    assert_eq!(session.code(), None);
    assert_eq!(session.client_id(), None);

    // nothing left to poll
    let status = timeout(Duration::from_secs(1), alice.poll(&mut session, Duration::from_millis(50), |_| {}))
        .await
        .unwrap();
    assert_eq!(status, SyncStatus::Killed);

    let err = alice.get(&created.code, None).await.unwrap_err();
    assert!(matches!(err, ClientErr::Api(AppErr::NotFound)));
    assert!(matches!(alice.close(&mut session).await, Err(ClientErr::Protocol(_))));
}

#[tokio::test]
async fn failures_map_back_to_error_kinds() {
    let base = serve().await;
    let mut alice = client(&base, "alice-browser");

    let err = alice.get(&"x".repeat(20), None).await.unwrap_err();
    assert!(matches!(err, ClientErr::Api(AppErr::NotFound)));

    let created = alice.create("Alice", "").await.unwrap();
    let err = alice.kill(&created.code, Some("intruder")).await.unwrap_err();
    assert!(matches!(err, ClientErr::Api(AppErr::Forbidden(_))));

    let err = alice.create("Alice", "").await.unwrap_err();
    assert!(matches!(err, ClientErr::Api(ref e) if e.is_retriable()));
}
