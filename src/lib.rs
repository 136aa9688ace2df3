pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export logic types
pub use logic::{DocumentConverter, Expander, PathResolver, UpdatePathProjector, WriteProcessor};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, Store};

/// Build the store the configuration asks for
pub fn build_store(config: &crate::config::AppConfig) -> anyhow::Result<MemoryStore> {
    if config.service.load_demo_data {
        seed::demo_store()
    } else {
        Ok(MemoryStore::new(seed::demo_schema()?))
    }
}

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = crate::config::AppConfig::load()?;
    let store = build_store(&config)?;

    let app = crate::api::routes::create_router()
        .with_state(crate::api::handlers::app_state(store, config.service_root()));

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;

    serve(listener, app).await?;

    Ok(())
}
