use clap::Parser;
use tracing_subscriber::EnvFilter;
use valuation_mc::api::{Cli, Command, run_cli, run_http_server};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve { port } => {
            if let Err(e) = run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Run(args) => match run_cli(args) {
            Ok(json) => println!("{json}"),
            Err(msg) => {
                eprintln!("Error: {msg}");
                std::process::exit(1);
            }
        },
    }
}
