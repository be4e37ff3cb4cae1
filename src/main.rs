use std::env;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "serve".to_string());
    if cmd != "serve" {
        eprintln!("Usage: canvas-relay serve [--config <path>]");
        std::process::exit(2);
    }

    let mut config_path = None;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(v) = args.next() {
                config_path = Some(v);
            }
        }
    }

    let loaded = match &config_path {
        Some(path) => relay_config::load_with_file(path),
        None => relay_config::load_from_env(),
    };
    let cfg = match loaded {
        Ok(v) => v,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    info!(
        api_base_url = %cfg.platform.api_base_url,
        access_token = if cfg.platform.access_token.is_some() { "configured" } else { "not configured" },
        webhook = if cfg.automation.webhook_url.is_some() { "configured" } else { "not configured" },
        signature_check = cfg.platform.client_secret.is_some(),
        "configuration loaded"
    );

    if let Err(e) = relay_server::serve(cfg).await {
        error!("server exited with error: {e}");
        std::process::exit(1);
    }
}
