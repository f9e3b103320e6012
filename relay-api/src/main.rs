use anyhow::{Context, anyhow};
use relay_api::startup::Application;
use relay_config::load_config;
use relay_telemetry::tracing::init_tracing;
use std::env;
use tracing::{error, info};

/// Entry point for the relay API service.
///
/// Initializes tracing and starts the Actix web server, with a `migrate`
/// command for applying database migrations.
fn main() -> anyhow::Result<()> {
    init_tracing(env!("CARGO_BIN_NAME"))?;

    actix_web::rt::System::new().block_on(async_main())?;

    Ok(())
}

/// Main async function that handles command-line arguments and starts the
/// service.
///
/// Supports two modes: server mode (no arguments) and migration mode
/// ("migrate" argument).
async fn async_main() -> anyhow::Result<()> {
    let config = load_config().context("loading relay configuration")?;

    let mut args = env::args();
    match args.len() {
        // Run the application server.
        1 => {
            let application = Application::build(config).await?;
            application.run_until_stopped().await?;
        }
        // Handle single commands.
        2 => {
            let command = args.nth(1).unwrap();
            match command.as_str() {
                "migrate" => {
                    Application::migrate_database(&config).await?;
                    info!("database migrated successfully");
                }
                _ => {
                    error!(%command, "invalid command");
                    return Err(anyhow!("invalid command: {command}"));
                }
            }
        }
        _ => {
            error!("invalid number of command line arguments");
            return Err(anyhow!("invalid number of command line arguments"));
        }
    }

    Ok(())
}
