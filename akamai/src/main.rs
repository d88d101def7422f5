use akamai::AkamaiProvider;
use tfplug::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> tfplug::Result<()> {
    // stdout carries the plugin handshake
    let filter = EnvFilter::try_from_env("TF_LOG_PROVIDER")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tfplug::serve(AkamaiProvider::new(), ServerConfig::default()).await
}
