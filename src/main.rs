mod analysis;
mod app;
mod config;
mod messages;
mod pipeline;
mod preview;
mod recommendations;
mod store;
mod validation;
mod view;

use analysis::HttpAnalyzer;
use app::App;
use config::Config;
use store::SessionStore;

use anyhow::Result;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting auscult heartbeat triage client");

    let config = Config::load()?;
    config.validate()?;

    let backend = Arc::new(HttpAnalyzer::new(&config)?);
    let store = SessionStore::new();

    // LocalSet because the preview handle owns a rodio output stream,
    // which is !Send
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let app = App::new(backend, store, Box::new(preview::attach));
            app.run().await
        })
        .await
}
