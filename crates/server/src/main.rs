mod error;
mod routes;
mod state;

use anyhow::Result;
use state::AppState;
use std::sync::Arc;
use vault_core::expiration::SqliteExpirationStore;
use vault_core::processor::OcrProcessor;
use vault_core::{config, setup};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = config::load(None)?;
    let pool = storage::connect(&cfg.database.path).await?;
    storage::migrate(&pool).await?;

    let registry = setup::build_registry(&cfg);
    let processor = Arc::new(OcrProcessor::new(
        pool.clone(),
        cfg.ocr.clone(),
        registry,
        Arc::new(SqliteExpirationStore::new(pool)),
    ));

    let app = routes::api_router(AppState { processor });
    let listener = tokio::net::TcpListener::bind(&cfg.server.bind).await?;
    tracing::info!(addr = %cfg.server.bind, "vault ocr server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
