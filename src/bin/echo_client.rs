use clap::Parser;
use echo_toy::client::{Client, LogHandler};

/// TCP echo client: connects, sends a greeting, logs whatever comes
/// back, and blocks until the connection closes.
#[derive(Parser, Debug)]
struct Cli {
    /// server to connect to
    host: String,
    /// server port
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let client = Client::connect(&cli.host, cli.port).await?;
    let mut handler = LogHandler::default();
    client.run(&mut handler).await?;
    Ok(())
}
