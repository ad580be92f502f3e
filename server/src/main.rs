use locshare_server::config::{generate_config_template, Config};
use locshare_server::{server, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    server::init_tracing(config.json_logs);

    tracing::info!(
        "Location relay v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    server::serve(config).await
}
