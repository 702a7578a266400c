//! Scripted encounter over an in-memory scene.
//!
//! Plays one short fight through the tracker and prints the published order
//! after every step. Logs go to stderr; `RUST_LOG` tunes them.
mod encounter;

use anyhow::Result;
use tracker_runtime::TrackerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = TrackerConfig::from_env();
    tracing::info!(namespace = %config.namespace, "starting scripted encounter");

    encounter::run(config).await
}
