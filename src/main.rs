use anyhow::Result;
use clap::Parser;
use log::info;
use print_proxy::{
    config::Config,
    runtime::ProxyRuntime,
};
use std::{
    net::IpAddr,
    path::PathBuf,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// A transparent relay that stamps raw print jobs with accounting
/// credentials before they reach the printer
struct Cli {
    /// What address to bind the listeners and the credential gateway to
    #[clap(short, long, default_value = "127.0.0.1", env = "PRINT_PROXY_ADDRESS")]
    address: IpAddr,
    /// Path to the JSON configuration file
    #[clap(
        short,
        long,
        default_value = "print_proxy.config.json",
        env = "PRINT_PROXY_CONFIG"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let config = Config::load(&args.config)?;

    info!(
        "Starting print proxy on {} with {} listener(s)",
        args.address,
        config.listeners.len()
    );

    ProxyRuntime::new(config)?.run(args.address).await
}
