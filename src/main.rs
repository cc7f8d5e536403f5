//! Sensor Hub Client - command line shell
//!
//! Wires configuration, the settings store, the MQTT transport and the
//! connection manager together for the terminal.

use clap::{Parser, Subcommand};
use sensor_hub_client::broadcast::{ChannelObserver, EventBroadcaster, HubEvent};
use sensor_hub_client::config::AppConfig;
use sensor_hub_client::directory::{DeviceDirectory, HttpDeviceDirectory};
use sensor_hub_client::error::{HubError, HubResult};
use sensor_hub_client::manager::{ConnectionManager, ManagerConfig};
use sensor_hub_client::observability::{init_default_logging, init_logging, LogFormat};
use sensor_hub_client::presenter::{LogPresenter, Notification};
use sensor_hub_client::protocol::DeviceCommand;
use sensor_hub_client::settings::{ConnectionSettings, FileSettingsStore, SettingsStore};
use sensor_hub_client::transport::mqtt::RumqttTransport;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::{signal, time::Duration};
use tracing::{error, info, warn, Instrument, Level};

const DEFAULT_CONFIG_PATHS: &[&str] = &["sensor-hub.toml", "config/sensor-hub.toml"];

/// How long `send` waits for the device to answer
const RESPONSE_WAIT: Duration = Duration::from_secs(5);

/// Home security sensor hub client
#[derive(Parser)]
#[command(name = "sensor-hub-client")]
#[command(about = "MQTT client for the home security sensor hub")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and report alarms until interrupted
    Run,
    /// Show, edit or reset the persisted broker settings
    Settings {
        #[arg(long)]
        show: bool,
        #[arg(
            long,
            conflicts_with_all = ["host", "port", "client_id", "username", "password", "secure"]
        )]
        reset: bool,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, env = "SENSOR_HUB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        secure: Option<bool>,
    },
    /// Publish one command to a device and wait briefly for its response
    Send {
        device: String,
        /// arm, disarm, reset or status
        command: DeviceCommand,
    },
    /// List devices from the hub's REST API
    Devices {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Validate the configuration
    Config {
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match verbosity_level(cli.verbose) {
        Some(level) => {
            let format = LogFormat::parse(&std::env::var("LOG_FORMAT").unwrap_or_default());
            init_logging(level, format, false);
        }
        None => init_default_logging(),
    }

    let config = match load_configuration(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e.user_message());
            process::exit(e.exit_code());
        }
    };

    let result = match cli.command {
        Commands::Run => run_client(config).await,
        Commands::Settings {
            show,
            reset,
            host,
            port,
            client_id,
            username,
            password,
            secure,
        } => {
            let edits = SettingsEdits {
                host,
                port,
                client_id,
                username,
                password,
                secure,
            };
            handle_settings_command(&config, show, reset, edits)
        }
        Commands::Send { device, command } => send_command(config, &device, command).await,
        Commands::Devices { page } => list_devices(&config, page).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e.user_message());
        process::exit(e.exit_code());
    }
}

fn verbosity_level(verbose: u8) -> Option<Level> {
    match verbose {
        0 => None,
        1 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

fn load_configuration(config_path: Option<&PathBuf>) -> HubResult<AppConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(AppConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(AppConfig::load_from_file(&path)?);
        }
    }

    warn!("No configuration file found, using built-in defaults");
    let config = AppConfig::default();
    config.validate()?;
    Ok(config)
}

fn build_manager(config: &AppConfig, manager_config: ManagerConfig) -> ConnectionManager {
    let store = Arc::new(FileSettingsStore::new(config.settings.path.clone()));
    let broadcaster = Arc::new(EventBroadcaster::new());
    ConnectionManager::new(
        manager_config,
        store,
        Arc::new(RumqttTransport::new()),
        broadcaster,
    )
}

async fn run_client(config: AppConfig) -> HubResult<()> {
    let manager = build_manager(&config, ManagerConfig::from_app_config(&config));
    manager.broadcaster().attach(Arc::new(LogPresenter));

    let span = sensor_hub_client::lifecycle_span!(topic_root = %config.hub.topic_root);
    async {
        manager.start();

        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        info!("Monitoring alarms, press Ctrl-C to exit");

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }

        manager.shutdown().await;
        info!("Client shutdown complete");
        Ok::<(), HubError>(())
    }
    .instrument(span)
    .await
}

struct SettingsEdits {
    host: Option<String>,
    port: Option<u16>,
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    secure: Option<bool>,
}

impl SettingsEdits {
    fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.port.is_none()
            && self.client_id.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.secure.is_none()
    }

    fn apply(self, current: &ConnectionSettings) -> ConnectionSettings {
        let mut updated = current.clone();
        if let Some(host) = self.host {
            updated.host = host;
        }
        if let Some(port) = self.port {
            updated.port = port;
        }
        if let Some(client_id) = self.client_id {
            updated.client_id = client_id;
        }
        if let Some(username) = self.username {
            updated.username = Some(username).filter(|u| !u.is_empty());
        }
        if let Some(password) = self.password {
            updated.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Some(secure) = self.secure {
            updated.use_secure_transport = secure;
        }
        updated
    }
}

fn handle_settings_command(
    config: &AppConfig,
    show: bool,
    reset: bool,
    edits: SettingsEdits,
) -> HubResult<()> {
    let store = FileSettingsStore::new(config.settings.path.clone());

    if reset {
        store.reset_to_defaults()?;
        info!(path = %store.path().display(), "Settings reset to defaults");
    } else if !edits.is_empty() {
        let updated = edits.apply(&store.load()?);
        store.save(&updated)?;
    }

    if show || !reset {
        print_settings(&store.load()?);
    }
    Ok(())
}

fn print_settings(settings: &ConnectionSettings) {
    println!("Broker:             {}", settings.broker_url());
    println!("Client ID:          {}", settings.client_id);
    println!(
        "Username:           {}",
        settings.username.as_deref().unwrap_or("(none)")
    );
    println!(
        "Password:           {}",
        if settings.password.is_some() { "***" } else { "(none)" }
    );
    println!("Secure transport:   {}", settings.use_secure_transport);
    println!("Connection timeout: {}s", settings.connection_timeout_secs);
    println!("Keep-alive:         {}s", settings.keep_alive_secs);
}

async fn send_command(config: AppConfig, device: &str, command: DeviceCommand) -> HubResult<()> {
    let mut manager_config = ManagerConfig::from_app_config(&config);
    // A fixed id would kick a running client off the broker
    manager_config.unique_client_id = true;

    let manager = build_manager(&config, manager_config);
    let (observer, mut events) = ChannelObserver::new();
    manager.broadcaster().attach(Arc::new(observer));

    let connect_wait = FileSettingsStore::new(config.settings.path.clone())
        .load()?
        .connection_timeout()
        + Duration::from_secs(1);

    manager.start();
    let mut state = manager.state_receiver();
    let connected = matches!(
        tokio::time::timeout(connect_wait, state.wait_for(|s| s.is_connected())).await,
        Ok(Ok(_))
    );
    if !connected {
        manager.shutdown().await;
        let failure = Notification::for_publish_failure(
            command.as_str(),
            &HubError::invalid_input("could not connect to the broker"),
        );
        println!("{failure}");
        return Err(HubError::invalid_input(format!(
            "not connected after {}s",
            connect_wait.as_secs()
        )));
    }

    if let Err(e) = manager.publish_command(device, command).await {
        println!("{}", Notification::for_publish_failure(command.as_str(), &e));
        manager.shutdown().await;
        return Err(e.into());
    }
    info!(device, command = %command, "Command sent");

    let response = tokio::time::timeout(RESPONSE_WAIT, async {
        while let Some(event) = events.recv().await {
            if let HubEvent::CommandResponse(response) = event {
                if response.device.as_deref() == Some(device) {
                    return Some(response);
                }
            }
        }
        None
    })
    .await;

    match response {
        Ok(Some(response)) => println!("{}", Notification::for_command_response(&response)),
        _ => warn!(device, "No command response within {}s", RESPONSE_WAIT.as_secs()),
    }

    manager.shutdown().await;
    Ok(())
}

async fn list_devices(config: &AppConfig, page: u32) -> HubResult<()> {
    let section = config
        .directory
        .as_ref()
        .ok_or_else(|| HubError::invalid_input("no [directory] section in configuration"))?;

    let directory = HttpDeviceDirectory::new(section)?;
    let devices = directory.fetch_page(page).await?;

    if devices.data.is_empty() {
        println!("No devices on page {page}");
        return Ok(());
    }

    for device in &devices.data {
        println!(
            "{:>4}  {:<20} {:<16} {}",
            device.id,
            device.name,
            device.location.as_deref().unwrap_or("-"),
            device.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn handle_config_command(config: &AppConfig, show: bool) -> HubResult<()> {
    if show {
        let rendered = toml::to_string_pretty(config)
            .map_err(sensor_hub_client::config::ConfigError::from)?;
        println!("Current configuration:");
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}
