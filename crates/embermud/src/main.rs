use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use embermud::{MudError, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), MudError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Ok(addr) = std::env::var("EMBERMUD_ADDR") {
        config.bind_addr = addr;
    }
    if let Ok(dir) = std::env::var("EMBERMUD_DATA") {
        config.data_dir = PathBuf::from(dir);
    }

    let server = Server::bind(config).await?;
    server.run().await
}
