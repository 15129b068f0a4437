use clap::Parser;
use pki_server::{serve, AppState, DEFAULT_FIRST_ID};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "pki-mock-server")]
#[command(about = "In-memory certificate request service", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Request id handed out to the first submission
    #[arg(long, default_value_t = DEFAULT_FIRST_ID)]
    first_id: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    serve(listener, AppState::new(args.first_id)).await?;

    Ok(())
}
