use std::env;
use std::process::ExitCode;

use storefront::config::Config;
use storefront::gateway::Gateways;
use storefront::service::PaymentService;
use storefront::storage::{SqliteStorage, SqliteStorageConfig};
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

fn parse_config_path() -> String {
    for arg in env::args().skip(1) {
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn parse_payment_status_arg() -> Option<String> {
    env::args()
        .skip(1)
        .find_map(|arg| arg.strip_prefix("--payment-status=").map(str::to_string))
}

fn init_tracing(log_level: Option<&str>) {
    let level = match log_level {
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") | Some("warning") => Level::WARN,
        Some("error") => Level::ERROR,
        Some("trace") => Level::TRACE,
        _ => Level::INFO,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config_path = parse_config_path();
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.app.log_level.as_deref());

    let storage = match SqliteStorage::new(SqliteStorageConfig::from(&config.storage)).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, path = %config.storage.path, "Failed to open storage");
            return ExitCode::FAILURE;
        }
    };

    let gateways = match Gateways::from_config(&config.payment) {
        Ok(g) => g,
        Err(e) => {
            error!(error = %e, "Failed to build payment gateways");
            storage.close().await;
            return ExitCode::FAILURE;
        }
    };

    let providers: Vec<String> = gateways.enabled().iter().map(|m| m.to_string()).collect();
    info!(
        app = %config.app.name,
        env = %config.app.env,
        config = %config_path,
        providers = ?providers,
        "Storefront initialized"
    );

    let mut code = ExitCode::SUCCESS;

    if let Some(arg) = parse_payment_status_arg() {
        let payments = PaymentService::new(storage.clone(), gateways);

        match arg.parse::<i64>() {
            Ok(payment_id) => match payments.query_payment_status(payment_id).await {
                Ok(status) => println!("{}", status),
                Err(e) => {
                    error!(payment_id, error = %e, "Payment status lookup failed");
                    code = ExitCode::FAILURE;
                }
            },
            Err(_) => {
                eprintln!("Invalid payment id: {}", arg);
                code = ExitCode::FAILURE;
            }
        }
    }

    storage.close().await;
    code
}
