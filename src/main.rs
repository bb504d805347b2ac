use std::env;
use std::path::Path;
use std::process;

use impot::api::{CliError, run_cli, run_http_server};
use impot::core::TaxYearConfig;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        let config = match TaxYearConfig::load(raw_args.get(3).map(Path::new)) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                process::exit(1);
            }
        };
        if let Err(e) = run_http_server(port, config).await {
            error!("server error: {e}");
            process::exit(1);
        }
        return;
    }

    match run_cli(raw_args) {
        Ok(json) => println!("{json}"),
        Err(CliError::Usage(e)) => e.exit(),
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}
