//! `tombola-server`: runs a Tombola server.
//!
//! The bind address comes from `TOMBOLA_BIND` (default `0.0.0.0:3000`) and
//! the log filter from `RUST_LOG` (default `info`).

use tombola::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const BIND_ENV: &str = "TOMBOLA_BIND";
const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<(), TombolaError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let server = TombolaServer::builder().bind(&addr).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server.run().await
}
