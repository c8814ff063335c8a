//! Disposable anonymous chat rooms behind a polling JSON API.
//!
//! Rooms live only in memory, addressed by a 20-character code, and vanish
//! after a fixed lifetime or a stretch of silence. Clients keep in sync by
//! polling; see [`sync`] for the client-side rules and [`client`] for a
//! ready-made poller.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod room;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;
pub mod utils {
    pub mod clean;
    pub mod ident;
    pub mod nonce;
    pub mod sanitize;
}

pub use error::{AppErr, AppResult};
pub use session::{Origin, RoomService};
