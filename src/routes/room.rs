//! routes/room.rs
use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::{forbidden, invalid, AppResult},
    routes::{ok, origin::ClientOrigin, Reply},
    session::{Created, Joined, Killed, Snapshot},
    state::Shared,
    sync::POLL_INTERVAL,
    utils::nonce,
};

/// Everything a fresh client needs before its first call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bootstrap {
    pub nonce:             String,
    /// milliseconds
    pub poll_interval:     u64,
    pub max_lifetime:      u64,
    pub max_inactivity:    u64,
    pub button_text_start: String,
    pub button_text_join:  String,
    pub button_color:      String,
}

#[derive(Deserialize)]
struct CreateInput {
    #[serde(default)] nonce:     String,
    #[serde(default)] nickname:  String,
    #[serde(default)] room_name: String,
}

#[derive(Deserialize)]
struct JoinInput {
    #[serde(default)] nonce:    String,
    #[serde(default)] nickname: String,
}

#[derive(Deserialize)]
struct SendInput {
    #[serde(default)] nonce:     String,
    #[serde(default)] client_id: String,
    #[serde(default)] message:   String,
}

#[derive(Deserialize)]
struct KillInput {
    #[serde(default)] nonce:     String,
    #[serde(default)] client_id: Option<String>,
}

#[derive(Deserialize)]
struct GetQuery { client_id: Option<String> }

pub fn router() -> Router {
    Router::new()
        .route("/bootstrap", get(bootstrap))
        .route("/rooms", post(create))
        .route("/rooms/:code", get(poll))
        .route("/rooms/:code/join", post(join))
        .route("/rooms/:code/messages", post(send))
        .route("/rooms/:code/kill", post(kill))
}

/* ---------------- Bootstrap ---------------- */
async fn bootstrap(Extension(st): Extension<Shared>) -> AppResult<Reply<Bootstrap>> {
    let limits = st.rooms.limits();
    Ok(ok(Bootstrap {
        nonce:             nonce::sign(&st.secret)?,
        poll_interval:     POLL_INTERVAL.as_millis() as u64,
        max_lifetime:      limits.max_lifetime,
        max_inactivity:    limits.max_inactivity,
        button_text_start: st.display.button_text_start.clone(),
        button_text_join:  st.display.button_text_join.clone(),
        button_color:      st.display.button_color.clone(),
    }))
}

/* ---------------- Create ---------------- */
async fn create(
    Extension(st): Extension<Shared>,
    ClientOrigin(origin): ClientOrigin,
    body: Result<Json<CreateInput>, JsonRejection>,
) -> AppResult<Reply<Created>> {
    let p = input(body)?;
    guard(&st, &p.nonce)?;
    Ok(ok(st.rooms.create(&p.nickname, &p.room_name, &origin).await?))
}

/* ---------------- Join ---------------- */
async fn join(
    Extension(st): Extension<Shared>,
    ClientOrigin(origin): ClientOrigin,
    Path(code): Path<String>,
    body: Result<Json<JoinInput>, JsonRejection>,
) -> AppResult<Reply<Joined>> {
    let p = input(body)?;
    guard(&st, &p.nonce)?;
    Ok(ok(st.rooms.join(&code, &p.nickname, &origin).await?))
}

/* ---------------- Send ---------------- */
async fn send(
    Extension(st): Extension<Shared>,
    ClientOrigin(origin): ClientOrigin,
    Path(code): Path<String>,
    body: Result<Json<SendInput>, JsonRejection>,
) -> AppResult<Reply<Snapshot>> {
    let p = input(body)?;
    guard(&st, &p.nonce)?;
    Ok(ok(st.rooms.send(&code, &p.client_id, &p.message, &origin).await?))
}

/* ---------------- Poll（唯讀，免 nonce） ---------------- */
async fn poll(
    Extension(st): Extension<Shared>,
    Path(code): Path<String>,
    Query(q): Query<GetQuery>,
) -> AppResult<Reply<Snapshot>> {
    let client_id = q.client_id.filter(|s| !s.is_empty());
    Ok(ok(st.rooms.get(&code, client_id.as_deref()).await?))
}

/* ---------------- Kill ---------------- */
async fn kill(
    Extension(st): Extension<Shared>,
    Path(code): Path<String>,
    body: Result<Json<KillInput>, JsonRejection>,
) -> AppResult<Reply<Killed>> {
    let p = input(body)?;
    guard(&st, &p.nonce)?;
    let client_id = p.client_id.filter(|s| !s.is_empty());
    Ok(ok(st.rooms.kill(&code, client_id.as_deref()).await?))
}

fn input<T: DeserializeOwned>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(p)| p).map_err(|e| invalid(e.body_text()))
}

fn guard(st: &Shared, token: &str) -> AppResult<()> {
    if nonce::verify(token, &st.secret) { Ok(()) } else { Err(forbidden("Invalid security token")) }
}
