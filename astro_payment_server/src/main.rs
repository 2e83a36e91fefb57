use std::process::ExitCode;

use astro_payment_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};
use dotenvy::dotenv;
use log::{error, info};

#[actix_web::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        // Help was printed; nothing to serve.
        return ExitCode::SUCCESS;
    }
    let config = ServerConfig::from_env_or_default();
    info!("🚀️ Astro payment gateway starting on {}:{}", config.host, config.port);
    if let Err(e) = run_server(config).await {
        error!("🚀️ The server shut down with an error: {e}");
        return ExitCode::FAILURE;
    }
    info!("🚀️ The server has shut down cleanly. Bye!");
    ExitCode::SUCCESS
}
