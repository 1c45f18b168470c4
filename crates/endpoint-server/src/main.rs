//! endpoint-visualiser
//!
//! Usage:
//!   endpoint-visualiser --config config.json
//!   endpoint-visualiser --port 8080 --no-keyboard --log-level debug

use clap::Parser;
use endpoint_server::Cli;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    let code = match endpoint_server::run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "Endpoint visualiser failed");
            1
        }
    };
    // a blocked stdin read would otherwise keep the runtime alive
    std::process::exit(code);
}
