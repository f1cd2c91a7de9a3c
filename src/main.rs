pub mod config;
pub mod mqtt;
pub mod persistence;
pub mod session;
pub mod ui;

use crate::config::AppConfig;
use crate::mqtt::mqtt_handler::RumqttcClient;
use crate::persistence::kv_store::TomlFileStore;
use crate::persistence::settings_store::SettingsStore;
use crate::session::console::Console;
use crate::session::dispatcher::Dispatcher;
use crate::ui::MClientUI;
use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use tokio::runtime::Handle;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const FALLBACK_SETTINGS_FILE: &str = "mclient-settings.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load();
    let level = config
        .as_ref()
        .map(AppConfig::tracing_level)
        .unwrap_or(Level::INFO);
    setup(level)?;
    let config = config.unwrap_or_else(|e| {
        warn!("{}, using default configuration", e);
        AppConfig::default()
    });

    let store = SettingsStore::new(open_settings(&config)?);
    let client = RumqttcClient::new(Handle::current(), config.request_capacity);
    let dispatcher = Dispatcher::new(client, store, Console::new(config.max_log_lines));

    info!("Starting UI");
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("MQTT Client")
            .with_inner_size([960.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "MQTT Client",
        native_options,
        Box::new(|cc| Ok(Box::new(MClientUI::new(cc, dispatcher)))),
    )
    .map_err(|e| eyre!("Failed to run UI: {}", e))?;

    info!("UI closed");
    Ok(())
}

fn setup(level: Level) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", level.as_str().to_lowercase())
    }
    setup_logging_env(level);
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// Opens the configured settings file, falling back to one in the temp dir.
fn open_settings(config: &AppConfig) -> Result<TomlFileStore> {
    let path = config.settings_path();
    match TomlFileStore::open(&path) {
        Ok(store) => Ok(store),
        Err(e) => {
            warn!("Could not open settings at {}: {}", path.display(), e);
            let fallback = std::env::temp_dir().join(FALLBACK_SETTINGS_FILE);
            TomlFileStore::open(&fallback)
                .map_err(|e| eyre!("Failed to open settings at {}: {}", fallback.display(), e))
        }
    }
}
