use anyhow::{Context, Result};
use charforge_backend::config::ForgeConfig;
use charforge_backend::runtime::ForgeRuntime;
use charforge_backend::server::serve_backend;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,charforge_backend=debug")),
        )
        .init();

    let config = ForgeConfig::load();
    if std::env::args().skip(1).any(|arg| arg == "--write-config") {
        let path = config.save().context("failed to write config")?;
        println!("wrote {}", path.display());
        return Ok(());
    }
    let runtime = ForgeRuntime::bootstrap(config).context("failed to bootstrap backend runtime")?;

    tracing::info!(
        "Starting character backend service (set CHARFORGE_BACKEND_TOKEN + optional CHARFORGE_BACKEND_BIND; auth mode via CHARFORGE_BACKEND_AUTH_MODE)"
    );

    let server_rt = tokio::runtime::Runtime::new().context("failed to start server runtime")?;
    server_rt.block_on(serve_backend(runtime))
}
