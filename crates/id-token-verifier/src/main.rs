//! ID token verifier CLI
//!
//! Reads a token from stdin, verifies it against the configured project, and
//! prints the verified claims as JSON.
//!
//! Configuration comes from `ID_TOKEN_*` environment variables (see
//! `Config::from_env`). Set `ID_TOKEN_LOG_JSON=true` for JSON logs.

use id_token_verifier::{Config, TokenVerificationService};
use std::io::Read;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    info!(
        project_id = %config.project_id,
        cert_url = %config.cert_url,
        clock_skew_seconds = config.clock_skew.as_secs(),
        "Configuration loaded successfully"
    );

    let mut token = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut token) {
        error!("Failed to read token from stdin: {}", e);
        return ExitCode::from(2);
    }

    let service = match TokenVerificationService::new(&config) {
        Ok(service) => service,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    match service.verify(token.trim()).await {
        Ok(verified) => match serde_json::to_string_pretty(&verified) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to serialize verified claims: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(
                stage = %e.stage(),
                error_type = e.error_type(),
                error = %e,
                "Token verification failed"
            );
            eprintln!("{}", e.public_message());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "idtoken=info,id_token_verifier=info,id_token_verify=info".into());

    let json = std::env::var("ID_TOKEN_LOG_JSON").is_ok_and(|v| v.eq_ignore_ascii_case("true"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
