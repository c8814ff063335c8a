//! HTTP client for the room API, plus the polling loop that keeps a
//! [`SyncState`] current.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tokio::time;

use crate::{
    clock::{Clock, SystemClock},
    error::AppErr,
    room::Limits,
    routes::room::Bootstrap,
    session::{Created, Joined, Killed, Snapshot},
    sync::{Countdown, SyncState, SyncStatus, Update},
};

/// What [`RoomClient::poll`] reports while it runs.
#[derive(Debug)]
pub enum Event<'a> {
    /// A snapshot arrived; carries only what is new.
    Update(&'a Update),
    /// The local countdown moved by one second.
    Tick(&'a Countdown),
}

#[derive(thiserror::Error, Debug)]
pub enum ClientErr {
    /// The server answered with a failure envelope.
    #[error(transparent)]
    Api(#[from] AppErr),

    /// Transient: the request never got a usable answer.
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("bad reply: {0}")]
    Protocol(String),
}

#[derive(Deserialize)]
struct RawReply {
    success: bool,
    data:    Value,
}

pub struct RoomClient {
    http: Client,
    base: String,
    boot: Option<Bootstrap>,
}

impl RoomClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base)
    }

    pub fn with_client(http: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_owned();
        Self { http, base, boot: None }
    }

    /// Fetches (once) the nonce and server limits.
    pub async fn bootstrap(&mut self) -> Result<&Bootstrap, ClientErr> {
        if self.boot.is_none() {
            let url = format!("{}/api/bootstrap", self.base);
            let boot: Bootstrap = read(self.http.get(url)).await?;
            self.boot = Some(boot);
        }
        self.boot.as_ref().ok_or_else(|| ClientErr::Protocol("no bootstrap".into()))
    }

    pub async fn limits(&mut self) -> Result<Limits, ClientErr> {
        let b = self.bootstrap().await?;
        Ok(Limits { max_lifetime: b.max_lifetime, max_inactivity: b.max_inactivity })
    }

    pub async fn create(&mut self, nickname: &str, room_name: &str) -> Result<Created, ClientErr> {
        let nonce = self.nonce().await?;
        let url = format!("{}/api/rooms", self.base);
        let body = json!({ "nonce": nonce, "nickname": nickname, "room_name": room_name });
        read(self.http.post(url).json(&body)).await
    }

    pub async fn join(&mut self, code: &str, nickname: &str) -> Result<Joined, ClientErr> {
        let nonce = self.nonce().await?;
        let url = format!("{}/api/rooms/{code}/join", self.base);
        read(self.http.post(url).json(&json!({ "nonce": nonce, "nickname": nickname }))).await
    }

    pub async fn send(&mut self, code: &str, client_id: &str, message: &str) -> Result<Snapshot, ClientErr> {
        let nonce = self.nonce().await?;
        let url = format!("{}/api/rooms/{code}/messages", self.base);
        let body = json!({ "nonce": nonce, "client_id": client_id, "message": message });
        read(self.http.post(url).json(&body)).await
    }

    pub async fn get(&self, code: &str, client_id: Option<&str>) -> Result<Snapshot, ClientErr> {
        let url = format!("{}/api/rooms/{code}", self.base);
        let mut req = self.http.get(url);
        if let Some(id) = client_id {
            req = req.query(&[("client_id", id)]);
        }
        read(req).await
    }

    pub async fn kill(&mut self, code: &str, client_id: Option<&str>) -> Result<Killed, ClientErr> {
        let nonce = self.nonce().await?;
        let url = format!("{}/api/rooms/{code}/kill", self.base);
        read(self.http.post(url).json(&json!({ "nonce": nonce, "client_id": client_id }))).await
    }

    /// Sends as the session's member and folds the returned room in.
    pub async fn say(&mut self, session: &mut SyncState, message: &str) -> Result<Update, ClientErr> {
        let (Some(code), Some(id)) = (session.code().map(str::to_owned), session.client_id().map(str::to_owned)) else {
            return Err(ClientErr::Protocol("session has ended".into()));
        };
        match self.send(&code, &id, message).await {
            Ok(snap) => Ok(session.apply(&snap.room, SystemClock.now())),
            Err(ClientErr::Api(e)) => {
                session.fail(&e);
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes the session's room and ends the session as killed.
    pub async fn close(&mut self, session: &mut SyncState) -> Result<Killed, ClientErr> {
        let (Some(code), id) = (session.code().map(str::to_owned), session.client_id().map(str::to_owned)) else {
            return Err(ClientErr::Protocol("session has ended".into()));
        };
        match self.kill(&code, id.as_deref()).await {
            Ok(killed) => {
                session.killed();
                tracing::info!("room deleted, session closed");
                Ok(killed)
            }
            Err(ClientErr::Api(e)) => {
                session.fail(&e);
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Polls every `every` until the room is reported gone, handing each
    /// snapshot's delta to `on_event`, and ticks the countdown once a second
    /// in between. Transient failures are logged and polling goes on. Drop
    /// the future to stop early.
    pub async fn poll<F>(&self, session: &mut SyncState, every: Duration, mut on_event: F) -> SyncStatus
    where
        F: FnMut(Event<'_>),
    {
        let mut poll = time::interval(every);
        poll.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        let mut second = time::interval_at(time::Instant::now() + Duration::from_secs(1), Duration::from_secs(1));
        second.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        while session.is_active() {
            tokio::select! {
                _ = poll.tick() => {
                    let (Some(code), Some(id)) = (session.code().map(str::to_owned), session.client_id().map(str::to_owned)) else {
                        break;
                    };
                    match self.get(&code, Some(&id)).await {
                        Ok(snap) => on_event(Event::Update(&session.apply(&snap.room, SystemClock.now()))),
                        Err(ClientErr::Api(e)) if e.ends_session() => {
                            session.fail(&e);
                            tracing::info!(error = %e, "room gone, polling stopped");
                        }
                        Err(e) => tracing::warn!(error = %e, "poll failed"),
                    }
                }
                _ = second.tick() => {
                    session.tick();
                    on_event(Event::Tick(session.countdown()));
                }
            }
        }
        session.status()
    }

    async fn nonce(&mut self) -> Result<String, ClientErr> {
        Ok(self.bootstrap().await?.nonce.clone())
    }
}

async fn read<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientErr> {
    let resp = req.send().await?;
    let status = resp.status();
    let reply: RawReply = resp.json().await?;
    if reply.success {
        return serde_json::from_value(reply.data).map_err(|e| ClientErr::Protocol(e.to_string()));
    }
    let message = reply
        .data
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let status = axum::http::StatusCode::from_u16(status.as_u16())
        .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    Err(AppErr::from_status(status, message).into())
}
