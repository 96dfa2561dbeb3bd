use clap::Parser;

use motion_recorder_lib::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("motion-recorder starting up...");

    motion_recorder_lib::run(Args::parse()).await
}
