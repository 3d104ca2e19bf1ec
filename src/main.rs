use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod state;
mod db;
mod routes;

mod crypto {
    pub mod password;
    pub mod token;
}

mod models {
    pub mod user;
    pub mod interest;
    pub mod session;
}

mod repositories {
    pub mod store;
    pub mod table;
    pub mod postgres;
    pub mod memory;
    pub mod session;
    pub mod user;
    pub mod interest;
}

mod services {
    pub mod session;
}

mod handlers {
    pub mod auth;
    pub mod users;
    pub mod interests;
}

mod middleware_layer {
    pub mod auth;
}

mod validation {
    pub mod auth;
}

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized ({:?} backend)", config.backend);

    let app = routes::router(state);

    let addr = config.bind_addr;
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
