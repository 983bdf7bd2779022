//! Configuration management
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `config.{toml,json,yaml}` in the config directory, then `NARROWCAST_*`
//! environment variables (`__` separates nesting levels, e.g.
//! `NARROWCAST_BACKEND__BASE_URL`).

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub pages: PagesConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub room: RoomConfig,

    #[serde(default)]
    pub rfid: RfidConfig,

    #[serde(default)]
    pub pos: PosConfig,

    #[serde(default)]
    pub strings: Strings,
}

fn default_port() -> u16 {
    8090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            backend: BackendConfig::default(),
            pages: PagesConfig::default(),
            scheduler: SchedulerConfig::default(),
            room: RoomConfig::default(),
            rfid: RfidConfig::default(),
            pos: PosConfig::default(),
            strings: Strings::default(),
        }
    }
}

/// Association website backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_path: String,
    pub timeout_secs: u64,
    /// Public media host that `/site_media/data` picture paths are rewritten to
    pub media_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_path: "/api/".to_string(),
            timeout_secs: 10,
            media_url: "https://media.ia.utwente.nl/amelie/data".to_string(),
        }
    }
}

impl BackendConfig {
    /// Absolute URL for a path on the backend
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn api_url(&self) -> String {
        self.url(&self.api_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which page controllers to run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    pub narrowcast: bool,
    pub tv: bool,
    pub room: bool,
    pub pos: bool,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            narrowcast: true,
            tv: false,
            room: false,
            pos: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of full default-widget cycles before a rotation widget is shown
    pub defaults_before_widget: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            defaults_before_widget: 14,
        }
    }
}

/// Room dashboard endpoints and jingle behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Base path of the room page; the PC status and Spotify endpoints live below it
    pub page_path: String,
    /// Spotify accounts shown in the now-playing panel
    pub spotify_identifiers: Vec<String>,
    /// Account that plays in the room itself (paused for the jingle)
    pub room_player: String,
    /// Device name on which the room account is paused for the jingle
    pub pause_device: String,
    /// Length of the four o'clock jingle
    pub jingle_secs: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            page_path: "/narrowcasting/room/".to_string(),
            spotify_identifiers: vec!["inter-actief".to_string()],
            room_player: "inter-actief".to_string(),
            pause_device: "guus".to_string(),
            jingle_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RfidConfig {
    pub enabled: bool,
    pub url: String,
    /// Some reader bridges refuse connections without the `nfc` subprotocol
    pub subprotocol: Option<String>,
}

impl Default for RfidConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "ws://localhost:3000".to_string(),
            subprotocol: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PosConfig {
    pub rfid_login_path: String,
    pub checkout_path: String,
    pub logout_path: String,
    /// Login status endpoint for the current pending login, if any
    pub token_check_path: Option<String>,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            rfid_login_path: "/personal_tab/pos/process_rfid/".to_string(),
            checkout_path: "/personal_tab/pos/shop/".to_string(),
            logout_path: "/personal_tab/pos/user_logout/".to_string(),
            token_check_path: None,
        }
    }
}

/// Translatable UI strings shown on the screens
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Strings {
    pub next_activity_future: String,
    pub next_activity_today: String,
    pub next_activity_past: String,
    pub no_activities: String,
    pub loading_activities: String,
    pub four_o_clock: String,
    pub no_room_duty_today: String,
    pub no_room_duty_scheduled: String,
    pub not_playing: String,
    pub spotify_error: String,
    pub not_associated: String,
    pub unknown_artist: String,
}

impl Default for Strings {
    fn default() -> Self {
        Self {
            next_activity_future: "Next activity ".to_string(),
            next_activity_today: "Next activity starts now".to_string(),
            next_activity_past: "Activity started ".to_string(),
            no_activities: "No upcoming activities".to_string(),
            loading_activities: "Loading activities...".to_string(),
            four_o_clock: "Four o'clock".to_string(),
            no_room_duty_today: "No room duty today".to_string(),
            no_room_duty_scheduled: "Nobody scheduled".to_string(),
            not_playing: "Not playing".to_string(),
            spotify_error: "Could not reach Spotify".to_string(),
            not_associated: "Not linked to Spotify, click to set up".to_string(),
            unknown_artist: "Unknown artist".to_string(),
        }
    }
}

/// Get config directory (NARROWCAST_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NARROWCAST_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/amelie-narrowcast");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("amelie-narrowcast");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config/amelie-narrowcast");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("amelie-narrowcast");
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

/// Get data directory (NARROWCAST_DATA_DIR, XDG_DATA_HOME or platform default)
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NARROWCAST_DATA_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("amelie-narrowcast");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/share/amelie-narrowcast");
        }
    }

    PathBuf::from("./data")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        .set_default("port", default_port() as i64)?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (NARROWCAST_PORT, NARROWCAST_PAGES__ROOM, etc.)
        .add_source(
            ::config::Environment::with_prefix("NARROWCAST")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("room.spotify_identifiers")
                .try_parsing(true),
        );

    // Port precedence: NARROWCAST_PORT > PORT > config file > default
    if let Ok(port) = std::env::var("NARROWCAST_PORT") {
        if let Ok(port_num) = port.parse::<u16>() {
            builder = builder.set_override("port", port_num as i64)?;
        }
    } else if let Ok(port) = std::env::var("PORT") {
        if let Ok(port_num) = port.parse::<u16>() {
            builder = builder.set_override("port", port_num as i64)?;
        }
    }

    let config: Config = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// A day of default cycles at the default photo duration
const MAX_DEFAULTS_BEFORE_WIDGET: u32 = 4320;

impl Config {
    /// Reject settings the controllers cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DEFAULTS_BEFORE_WIDGET).contains(&self.scheduler.defaults_before_widget) {
            return Err(anyhow!(
                "scheduler.defaults_before_widget must be between 1 and {}",
                MAX_DEFAULTS_BEFORE_WIDGET
            ));
        }
        url::Url::parse(&self.backend.base_url)
            .map_err(|e| anyhow!("invalid backend.base_url {:?}: {}", self.backend.base_url, e))?;
        if self.rfid.enabled {
            let url = url::Url::parse(&self.rfid.url)
                .map_err(|e| anyhow!("invalid rfid.url {:?}: {}", self.rfid.url, e))?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(anyhow!("rfid.url must be a ws:// or wss:// URL"));
            }
        }
        Ok(())
    }
}
