use std::sync::Arc;

use crate::{config::{Display, Settings}, session::RoomService};

/* ------------ 共享狀態 ------------ */
pub struct AppState {
    pub rooms:   Arc<RoomService>,
    pub secret:  String,
    pub display: Display,
}

pub type Shared = Arc<AppState>;

impl AppState {
    pub fn new(rooms: Arc<RoomService>, settings: &Settings) -> Shared {
        Arc::new(Self {
            rooms,
            secret:  settings.secret.clone(),
            display: settings.display.clone(),
        })
    }
}
