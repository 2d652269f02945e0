mod config;
mod handlers;
mod models;
mod server;
mod services;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use server::create_router;
use services::ClaudeVisionService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load environment variables
    dotenv().ok();

    log::info!("🚀 Starting Tippy dev server...");

    let config = Config::from_env();

    let analyzer = Arc::new(ClaudeVisionService::new(&config)?);
    log::info!("✅ Claude vision service initialized with model: {}", analyzer.model());
    if config.strict_receipts {
        log::info!("🧾 Strict receipt validation enabled");
    }

    let app = create_router(analyzer, &config);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("📂 Serving static files from {}", config.static_dir.display());
    println!("Tippy dev server on http://localhost:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("🛑 Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for Ctrl+C: {}", e);
    }
}
