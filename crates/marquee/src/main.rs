//! Marquee - Entry point

use std::path::PathBuf;

use tracing::{error, info};

use marquee::{EdgeServer, MarqueeConfig};
use marquee_telemetry::{init_telemetry, LogConfig, MetricsConfig, TelemetryConfig};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("marquee {}", marquee::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Marquee - embed metadata at the edge

USAGE:
    marquee [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    STATIC_ORIGIN              Static content origin URL (required)
    API_ORIGIN                 Metadata API URL (required)
    MARQUEE_LISTEN_ADDR        Listen address (default: 0.0.0.0)
    MARQUEE_LISTEN_PORT        Listen port (default: 8787)
    MARQUEE_OEMBED_ENDPOINT    oEmbed discovery endpoint (default: $API_ORIGIN/oembed)
    MARQUEE_CACHE_TTL          Edge cache TTL, e.g. 300s or 5m (default: 5m)
    MARQUEE_CACHE_ENABLED      Enable the edge cache (default: true)
    MARQUEE_LOG_LEVEL          Log filter directive (default: info)
    MARQUEE_JSON_LOGS          JSON log lines (default: true)
    RUST_LOG                   Overrides MARQUEE_LOG_LEVEL when set

EXAMPLES:
    # Run with configuration file
    marquee --config /etc/marquee/marquee.toml

    # Run with environment variables
    STATIC_ORIGIN=https://static.example API_ORIGIN=https://api.example marquee
"
    );
}

fn telemetry_config(config: &MarqueeConfig) -> TelemetryConfig {
    let settings = &config.telemetry;
    let base = if settings.json_logs {
        LogConfig::production()
    } else {
        LogConfig::development()
    };
    let logging = LogConfig {
        level: settings.log_level.clone(),
        ..base
    };

    TelemetryConfig::builder()
        .service_name(&settings.service_name)
        .logging(logging)
        .metrics(MetricsConfig {
            enabled: settings.metrics_enabled,
        })
        .build()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load configuration
    let loaded = match &args.config {
        Some(path) => MarqueeConfig::from_file(path),
        None => Ok(MarqueeConfig::default()),
    };

    let config = match loaded.and_then(|c| c.with_env_overrides().validate()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&telemetry_config(&config)) {
        eprintln!("Failed to initialize telemetry: {e}");
        std::process::exit(1);
    }

    match &args.config {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("using default configuration with environment overrides"),
    }
    info!(version = marquee::VERSION, "starting marquee");

    let server = match EdgeServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to create server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    info!("marquee stopped");
}
