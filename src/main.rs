use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use anonchat::{
    clock::SystemClock,
    config::Settings,
    routes,
    session::RoomService,
    state::AppState,
    utils::clean,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env().context("loading settings")?;
    let rooms = Arc::new(RoomService::new(Arc::new(SystemClock), settings.limits));

    tokio::spawn(clean::task(rooms.clone(), settings.sweep_every));  // 啟動清道夫

    let app = routes::app(AppState::new(rooms, &settings));

    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("binding {}", settings.bind))?;
    tracing::info!(addr = %settings.bind, "anonchat listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
