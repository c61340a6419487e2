//! wakeonpi - camera controller entry point

use std::path::PathBuf;

use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    init_logging(&settings.logging);

    info!("=== wakeonpi v{} ===", env!("CARGO_PKG_VERSION"));
    run_server(settings).await?;

    Ok(())
}
