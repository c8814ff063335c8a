use std::{sync::Arc, time::Duration};

use tokio::time;

use crate::session::RoomService;

/// Periodic sweep of expired rooms, counters and idle room locks.
pub async fn task(rooms: Arc<RoomService>, every: Duration) {
    let mut tick = time::interval(every);
    tick.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let swept = rooms.sweep().await;
        if swept.rooms + swept.counters > 0 {
            tracing::debug!(rooms = swept.rooms, counters = swept.counters, "swept expired entries");
        }
    }
}
