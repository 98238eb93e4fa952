//! Tic-tac-toe lobby: presence, challenges, and rooms for browser clients.
//!
//! Configured entirely through the environment:
//!
//! ```text
//! GAMBIT_WS_ADDR            WebSocket listen address   (127.0.0.1:8080)
//! GAMBIT_HTTP_ADDR          HTTP listen address        (127.0.0.1:3000)
//! GAMBIT_IDLE_TIMEOUT_SECS  idle connection timeout    (60)
//! GAMBIT_LEDGER             JSON-lines results file    (unset: in memory)
//! RUST_LOG                  log filter                 (info)
//! ```

use gambit::prelude::*;
use tracing_subscriber::EnvFilter;

async fn serve<P: PersistenceSink>(
    config: ServerConfig,
    sink: P,
) -> Result<(), GambitError> {
    let server = gambit::GambitServerBuilder::new()
        .config(config)
        .build(TrustedIdentity, sink)
        .await?;

    tracing::info!(
        ws = ?server.local_addr().ok(),
        http = ?server.http_addr().ok(),
        "lobby listening"
    );
    server.run().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env()?;
    match config.ledger_path.clone() {
        Some(path) => {
            let sink = LedgerSink::open(&path).await?;
            serve(config, sink).await?;
        }
        None => {
            tracing::warn!(
                "GAMBIT_LEDGER not set, results are kept in memory only"
            );
            serve(config, MemorySink::new()).await?;
        }
    }
    Ok(())
}
