//! Room lifecycle: create, join, send, poll and kill.
//!
//! Every operation that reads and then rewrites a room runs under that room's
//! own lock, so concurrent sends or joins on one code serialize instead of
//! overwriting each other. Different rooms never contend.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    clock::Clock,
    error::{forbidden, invalid, AppErr, AppResult},
    rate_limit::{Counter, RateLimiter, CREATE_THROTTLE, ROOM_CAP, SEND_THROTTLE},
    room::{Limits, Room, RoomView, MESSAGE_MAX, NICKNAME_MAX, PRESENCE_WINDOW, ROOM_NAME_MAX},
    store::ExpiringStore,
    utils::{ident, sanitize},
};

/// Who is calling, as far as an anonymous HTTP request tells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub ip:         String,
    pub user_agent: String,
}

impl Origin {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self { ip: ip.into(), user_agent: user_agent.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Created {
    pub code:      String,
    pub client_id: String,
    pub room:      RoomView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Joined {
    pub client_id: String,
    pub room:      RoomView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub room: RoomView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Killed {
    pub message: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Swept {
    pub rooms:    usize,
    pub counters: usize,
}

/* ------------ per-room locks ------------ */
#[derive(Default)]
struct RoomLocks {
    map: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    async fn acquire(&self, code: &str) -> OwnedMutexGuard<()> {
        let lock = self.map.lock().await.entry(code.to_owned()).or_default().clone();
        lock.lock_owned().await
    }

    // a lock only the map still references has no waiter and no holder
    async fn prune(&self) {
        self.map.lock().await.retain(|_, l| Arc::strong_count(l) > 1);
    }
}

pub struct RoomService {
    rooms:   ExpiringStore<Room>,
    limiter: RateLimiter,
    clock:   Arc<dyn Clock>,
    limits:  Limits,
    locks:   RoomLocks,
}

impl RoomService {
    pub fn new(clock: Arc<dyn Clock>, limits: Limits) -> Self {
        let counters: ExpiringStore<Counter> = ExpiringStore::new(clock.clone());
        Self {
            rooms: ExpiringStore::new(clock.clone()),
            limiter: RateLimiter::new(counters, clock.clone()),
            clock,
            limits,
            locks: RoomLocks::default(),
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /* ---------------- Create ---------------- */
    pub async fn create(&self, nickname: &str, room_name: &str, origin: &Origin) -> AppResult<Created> {
        if !self.limiter.allow_by(&ident::rate_key(&origin.ip, "create"), CREATE_THROTTLE).await {
            tracing::warn!(ip = %origin.ip, "room creation throttled");
            return Err(AppErr::RateLimited("Please wait before creating another room".into()));
        }
        let cap_key = ident::ip_key(&origin.ip);
        if !self.limiter.within(&cap_key, ROOM_CAP.max).await {
            tracing::warn!(ip = %origin.ip, "room cap reached");
            return Err(AppErr::RateLimited("Maximum rooms per IP reached".into()));
        }
        let nickname = nickname_field(nickname)?;
        let name = sanitize::truncate(&sanitize::text_field(room_name), ROOM_NAME_MAX);

        let now = self.clock.now();
        let code = self.fresh_code().await;
        let client_id = ident::client_id(&origin.ip, &origin.user_agent, now);
        let room = Room::new(code.clone(), name, client_id.clone(), nickname, origin.ip.clone(), now);

        self.store(&room).await;
        self.limiter.record(&cap_key, ROOM_CAP.window).await;
        tracing::info!(code = %short(&code), "room created");

        Ok(Created { code, client_id, room: room.view() })
    }

    /* ---------------- Join ---------------- */
    pub async fn join(&self, code: &str, nickname: &str, origin: &Origin) -> AppResult<Joined> {
        check_code(code)?;
        let _guard = self.locks.acquire(code).await;
        let now = self.clock.now();
        let mut room = self.load_live(code, now).await?;
        let nickname = nickname_field(nickname)?;

        let client_id = ident::client_id(&origin.ip, &origin.user_agent, now);
        if room.admit(&client_id, &nickname, now) {
            tracing::debug!(code = %short(code), "member joined");
        }
        room.touch(&client_id, now);
        self.store(&room).await;

        Ok(Joined { client_id, room: room.view() })
    }

    /* ---------------- Send ---------------- */
    pub async fn send(&self, code: &str, client_id: &str, message: &str, origin: &Origin) -> AppResult<Snapshot> {
        check_code(code)?;
        if !self.limiter.allow_by(&ident::rate_key(&origin.ip, "message"), SEND_THROTTLE).await {
            tracing::warn!(ip = %origin.ip, "send throttled");
            return Err(AppErr::RateLimited("Rate limit exceeded".into()));
        }
        let message = sanitize::text_field(message);
        if message.is_empty() || sanitize::char_len(&message) > MESSAGE_MAX {
            return Err(invalid("Invalid message (max 500 characters)"));
        }

        let _guard = self.locks.acquire(code).await;
        let now = self.clock.now();
        let mut room = self.load_live(code, now).await?;
        if !room.post(client_id, message, now) {
            return Err(forbidden("Not a member of this room"));
        }
        room.touch(client_id, now);
        self.store(&room).await;
        tracing::debug!(code = %short(code), messages = room.messages.len(), "message posted");

        Ok(Snapshot { room: room.view() })
    }

    /* ---------------- Get (poll) ---------------- */
    pub async fn get(&self, code: &str, client_id: Option<&str>) -> AppResult<Snapshot> {
        check_code(code)?;
        let _guard = self.locks.acquire(code).await;
        let now = self.clock.now();
        let mut room = self.load_live(code, now).await?;

        let touched = client_id.is_some_and(|id| room.touch(id, now));
        let pruned = room.prune_absent(now, PRESENCE_WINDOW);
        if pruned > 0 {
            tracing::debug!(code = %short(code), pruned, "absent members pruned");
        }
        if touched || pruned > 0 {
            self.store(&room).await;
        }

        Ok(Snapshot { room: room.view() })
    }

    /* ---------------- Kill ---------------- */
    /// Without a client_id anyone holding the code may delete the room.
    pub async fn kill(&self, code: &str, client_id: Option<&str>) -> AppResult<Killed> {
        check_code(code)?;
        let _guard = self.locks.acquire(code).await;
        let key = ident::room_key(code);
        let room = self.rooms.get(&key).await.ok_or(AppErr::NotFound)?;
        if client_id.is_some_and(|id| !room.is_member(id)) {
            return Err(forbidden("Not authorized to delete this room"));
        }
        self.rooms.delete(&key).await;
        tracing::info!(code = %short(code), "room killed");

        Ok(Killed { message: "Room deleted successfully".into() })
    }

    pub async fn sweep(&self) -> Swept {
        let swept = Swept {
            rooms:    self.rooms.sweep().await,
            counters: self.limiter.sweep().await,
        };
        self.locks.prune().await;
        swept
    }

    /* ------------ helpers ------------ */

    /// Loads a room, deleting it and failing `Expired` if it has aged out.
    async fn load_live(&self, code: &str, now: i64) -> AppResult<Room> {
        let key = ident::room_key(code);
        let room = self.rooms.get(&key).await.ok_or(AppErr::NotFound)?;
        if room.is_expired(now, self.limits) {
            self.rooms.delete(&key).await;
            tracing::info!(code = %short(code), "room expired");
            return Err(AppErr::Expired);
        }
        Ok(room)
    }

    async fn store(&self, room: &Room) {
        self.rooms
            .put(&ident::room_key(&room.code), room.clone(), self.limits.max_lifetime)
            .await;
    }

    async fn fresh_code(&self) -> String {
        loop {
            let code = ident::room_code();
            if self.rooms.get(&ident::room_key(&code)).await.is_none() {
                return code;
            }
        }
    }
}

fn check_code(code: &str) -> AppResult<()> {
    if ident::is_room_code(code) { Ok(()) } else { Err(invalid("Invalid code")) }
}

fn nickname_field(raw: &str) -> AppResult<String> {
    let nick = sanitize::text_field(raw);
    if nick.is_empty() || sanitize::char_len(&nick) > NICKNAME_MAX {
        return Err(invalid("Invalid nickname (max 30 characters)"));
    }
    Ok(nick)
}

// enough of a code to correlate log lines without handing it out
fn short(code: &str) -> &str {
    code.get(..6).unwrap_or(code)
}
