use tracing_subscriber::EnvFilter;

use vidfetch::config::Config;
use vidfetch::server::run_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vidfetch=info,tower_http=info")),
        )
        .init();

    run_server(Config::from_env()).await
}
