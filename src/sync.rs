//! What a polling client keeps between requests.
//!
//! A client remembers its room code, its client_id and a cursor: the newest
//! message time it has already shown. Snapshots from polls or from its own
//! sends are folded in through [`SyncState::apply`], which hands back only
//! what is new. Timestamps are whole seconds, so a message that lands in the
//! cursor's own second after that snapshot was taken is never surfaced.

use std::time::Duration;

use crate::{
    error::AppErr,
    room::{Limits, MessageView, RoomView},
};

pub const POLL_INTERVAL: Duration = Duration::from_millis(2200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Active,
    /// The server reported the room gone; polling must stop.
    Expired,
    /// This client deleted the room.
    Killed,
}

/// Result of folding one snapshot into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// True on the first render: `fresh` is the full history, not a delta.
    pub reset:     bool,
    pub fresh:     Vec<MessageView>,
    pub online:    usize,
    pub time_left: i64,
}

#[derive(Debug, Clone)]
pub struct SyncState {
    code:      Option<String>,
    client_id: Option<String>,
    cursor:    i64,
    status:    SyncStatus,
    limits:    Limits,
    countdown: Countdown,
}

impl SyncState {
    pub fn new(code: impl Into<String>, client_id: impl Into<String>, limits: Limits) -> Self {
        Self {
            code: Some(code.into()),
            client_id: Some(client_id.into()),
            cursor: 0,
            status: SyncStatus::Active,
            limits,
            countdown: Countdown::default(),
        }
    }

    pub fn code(&self) -> Option<&str> { self.code.as_deref() }
    pub fn client_id(&self) -> Option<&str> { self.client_id.as_deref() }
    pub fn cursor(&self) -> i64 { self.cursor }
    pub fn status(&self) -> SyncStatus { self.status }
    pub fn countdown(&self) -> &Countdown { &self.countdown }

    pub fn is_active(&self) -> bool {
        self.status == SyncStatus::Active
    }

    /// Folds a snapshot in, advancing the cursor and resyncing the countdown.
    pub fn apply(&mut self, room: &RoomView, now: i64) -> Update {
        let reset = self.cursor == 0;
        let fresh: Vec<MessageView> = room
            .messages
            .iter()
            .filter(|m| reset || m.time() > self.cursor)
            .cloned()
            .collect();
        if let Some(max) = fresh.iter().map(MessageView::time).max() {
            self.cursor = self.cursor.max(max);
        }
        self.countdown.resync(room, now, self.limits);

        Update { reset, fresh, online: room.users.len(), time_left: self.countdown.remaining() }
    }

    /// Reacts to a failed call; true when polling must stop.
    pub fn fail(&mut self, err: &AppErr) -> bool {
        if err.ends_session() {
            self.end(SyncStatus::Expired);
            return true;
        }
        false
    }

    pub fn killed(&mut self) {
        self.end(SyncStatus::Killed);
    }

    /// One second of local countdown between snapshots.
    pub fn tick(&mut self) -> i64 {
        self.countdown.tick()
    }

    fn end(&mut self, status: SyncStatus) {
        self.status = status;
        self.code = None;
        self.client_id = None;
    }
}

/* ------------ countdown ------------ */

/// Seconds until the room dies by lifetime or by inactivity, whichever first.
pub fn time_left(created: i64, last_activity: i64, now: i64, limits: Limits) -> i64 {
    let lifetime_left = limits.lifetime().saturating_sub(now - created);
    let inactivity_left = limits.inactivity().saturating_sub(now - last_activity);
    lifetime_left.min(inactivity_left).max(0)
}

/// Local estimate ticked every second, corrected by every snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: i64,
}

impl Countdown {
    pub fn remaining(&self) -> i64 { self.remaining }

    pub fn tick(&mut self) -> i64 {
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        self.remaining
    }

    pub fn resync(&mut self, room: &RoomView, now: i64, limits: Limits) {
        self.remaining = time_left(room.created, room.last_activity, now, limits);
    }

    pub fn label(&self) -> String {
        format_time(self.remaining)
    }
}

/// `42s`, `17m`, `5h 3m`.
pub fn format_time(secs: i64) -> String {
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}
