use axum::serve;
use odata_bridge_rust::api::handlers::app_state;
use odata_bridge_rust::api::routes::create_router;
use odata_bridge_rust::build_store;
use odata_bridge_rust::config::AppConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    println!("OData bridge: entity materialization server");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}, service root={}",
        config.server.host,
        config.server.port,
        config.service_root()
    );

    let store = build_store(&config)?;
    println!("Store ready with {} entity sets", store.entity_sets().len());

    let app = create_router().with_state(app_state(store, config.service_root()));
    run_server(app, &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!("OData bridge running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
