use ambient_controller::config::{Config, load_dotenv};
use ambient_controller::input::mqtt::AmbientIntegration;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status when the configuration cannot be read.
const EXIT_CONFIG: u8 = 1;
/// Exit status when the broker cannot be reached at startup.
const EXIT_CONNECT: u8 = 2;

#[derive(Parser)]
#[command(name = "ambient-controller")]
#[command(about = "Drive ambient lighting from door and gate sensors over MQTT")]
struct Cli {
    /// Dotenv file to load before reading configuration from the environment
    #[arg(long, env = "AMBIENT_ENV_FILE", default_value = ".env")]
    env_file: PathBuf,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env file before the runtime spawns any threads
    let loaded = load_dotenv(&cli.env_file);

    init_logger();
    if loaded > 0 {
        info!("Loaded {} variable(s) from {}", loaded, cli.env_file.display());
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if cli.print_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{}", json);
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                error!("Failed to serialize configuration: {}", e);
                return ExitCode::from(EXIT_CONFIG);
            }
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: Config) -> ExitCode {
    info!("Starting ambient controller");
    info!(
        "  Broker: {}:{} as {}",
        config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.client_id
    );
    info!(
        "  Sensors: {} ({}, {})",
        config.sensors.topic_prefix, config.sensors.polarity, config.sensors.subscription
    );
    info!("  Ambient topic: {}", config.ambient_topic);

    let integration = match AmbientIntegration::new(config).start().await {
        Ok(integration) => integration,
        Err(e) => {
            error!("Failed to connect: {}", e);
            return ExitCode::from(EXIT_CONNECT);
        }
    };

    info!("Ambient controller is running, press Ctrl+C to exit");
    wait_for_shutdown().await;

    // The last ambient command stays retained on the broker
    integration.shutdown().await;
    info!("Ambient controller stopped");
    ExitCode::SUCCESS
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!("Failed to listen for SIGTERM: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
