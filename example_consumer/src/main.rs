//! Example consumer: serves the resources in `RESOURCES_PATH` from `DATABASE_URL`.
//!
//! Run from repo root: `cargo run -p example-consumer`

use resource_kit::{
    common_routes, init_tracing, load_from_path, resolve, resource_routes_with_limit, AppState, PgStore,
    Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_tracing();

    let config = load_from_path(&settings.resources_path).await?;
    let model = Arc::new(resolve(&config)?);
    tracing::info!(resources = model.resources.len(), flavor = ?settings.flavor, "resource model loaded");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(settings.require_database_url()?)
        .await?;
    let store = Arc::new(PgStore::new(pool, model.clone()));
    let state = AppState::new(store, model, settings.flavor);

    let app = common_routes().merge(resource_routes_with_limit(state, settings.body_limit));
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
