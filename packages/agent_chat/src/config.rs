use std::path::{Path, PathBuf};
use std::time::Duration;

use chat_transport::TransportConfig;
use serde::{Deserialize, Serialize};

// =============================================================================
// Widget config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     url = "wss://chat.example.com/ws"
//                    [transport]
//                    heartbeat_interval_ms = 5000
//
//   env var:         AGENT_CHAT_TRANSPORT__HEARTBEAT_INTERVAL_MS=5000
//                    (double underscore = nesting)

pub const DEFAULT_URL: &str = "wss://localhost:8080";
pub const DEFAULT_OWN_ID: &str = "me";

/// Everything a mounted widget needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Author id of the local participant.
    #[serde(default = "default_own_id")]
    pub own_id: String,
    #[serde(default)]
    pub chat_name: String,
    #[serde(default = "default_send_button_text")]
    pub send_button_text: String,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Shown when input is too short. Defaults to `Min characters allowed: <min>`.
    #[serde(default)]
    pub min_length_error_text: Option<String>,
    /// Shown when input is too long. Defaults to `Max characters allowed: <max>`.
    #[serde(default)]
    pub max_length_error_text: Option<String>,
    #[serde(default = "default_theme_switcher_name")]
    pub theme_switcher_name: String,
    #[serde(default)]
    pub show_tool_calls: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub transport: TransportSection,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            own_id: default_own_id(),
            chat_name: String::new(),
            send_button_text: default_send_button_text(),
            min_length: default_min_length(),
            max_length: default_max_length(),
            min_length_error_text: None,
            max_length_error_text: None,
            theme_switcher_name: default_theme_switcher_name(),
            show_tool_calls: false,
            disabled: false,
            transport: TransportSection::default(),
        }
    }
}

/// Transport timing knobs (lives under `[transport]` in config.toml).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportSection {
    #[serde(default = "default_initial_reconnect_delay_ms")]
    pub initial_reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            initial_reconnect_delay_ms: default_initial_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            backoff_factor: default_backoff_factor(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl TransportSection {
    pub fn to_transport_config(&self) -> TransportConfig {
        TransportConfig {
            initial_reconnect_delay: Duration::from_millis(self.initial_reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(self.max_reconnect_delay_ms),
            backoff_factor: self.backoff_factor,
            // A zero period would make tokio's interval panic.
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms.max(1)),
        }
    }
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_own_id() -> String {
    DEFAULT_OWN_ID.to_string()
}

fn default_send_button_text() -> String {
    "Send".to_string()
}

fn default_min_length() -> usize {
    3
}

fn default_max_length() -> usize {
    10_000
}

fn default_theme_switcher_name() -> String {
    "Light theme:".to_string()
}

fn default_initial_reconnect_delay_ms() -> u64 {
    20_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    1.5
}

fn default_heartbeat_interval_ms() -> u64 {
    1_000
}

/// `<config dir>/agent-chat/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("agent-chat").join("config.toml"))
}

/// Build a figment that layers: defaults → config.toml → AGENT_CHAT_* env vars.
///
/// A missing config file is not an error; the layer is simply empty. With no
/// path at all the file layer is skipped.
///
/// Env vars use double-underscore for nesting into sections:
///   `AGENT_CHAT_URL=wss://host/ws`  →  `url = "wss://host/ws"`
///   `AGENT_CHAT_TRANSPORT__BACKOFF_FACTOR=2`  →  `transport.backoff_factor = 2`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(WidgetConfig::default()));
    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("AGENT_CHAT_").split("__"))
}
