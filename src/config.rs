use crate::cli::SettingsOverrides;
use crate::error::OverlayResult;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::{Display, EnumString};
use tracing::Level;

const TRACE_LEVELS: [&'static str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
const LOCAL_SETTINGS_YAML_FILE: &str = ".env.local.yaml";
const ENV_PREFIX: &str = "OVERLAY_";

/// Where leaderboard and builds come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataSourceKind {
    /// Precomputed JSON dump written by the offline collector.
    Dump,
    /// Best-effort HTML scraping of the analytics site.
    Scrape,
}

/// How outgoing requests leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProxyMode {
    /// Host bridge capability, requests go out unrestricted.
    Bridge,
    /// Public CORS relay first, then a direct request.
    Relay,
}

// All settings may be configured via environment variables prefixed with
// OVERLAY_. Example: OVERLAY_DATA_SOURCE="scrape" would set data_source.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_trace_level")]
    trace_level: String,
    #[serde(default = "default_data_source")]
    pub data_source: DataSourceKind,
    #[serde(default = "default_site_base_url")]
    pub site_base_url: String,
    #[serde(default = "default_dump_location")]
    pub dump_location: String,
    #[serde(default = "default_proxy_mode")]
    pub proxy_mode: ProxyMode,
    #[serde(default = "default_cors_relay_prefix")]
    pub cors_relay_prefix: String,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
    #[serde(default = "default_leaderboard_ttl_sec")]
    pub leaderboard_ttl_sec: u64,
    #[serde(default = "default_builds_ttl_sec")]
    pub builds_ttl_sec: u64,
    // Cache entries live in memory only when unset.
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_refresh_schedule")]
    pub refresh_schedule: String,
}

impl Settings {
    /// Defaults, then the local yaml file if present, then environment, then command line.
    pub fn load(overrides: &SettingsOverrides) -> OverlayResult<Self> {
        let mut figment = Figment::new();
        if Path::new(LOCAL_SETTINGS_YAML_FILE).exists() {
            println!(
                "\n######################################\n\
                   ##   Found '.env.local.yaml' file,  ##\n\
                   ##   loading local configuration.   ##\n\
                   ######################################\n\
                "
            );
            figment = figment.merge(Yaml::file(LOCAL_SETTINGS_YAML_FILE));
        }
        let figment = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> OverlayResult<Self> {
        Ok(figment.extract()?)
    }

    pub fn get_trace_level(&self) -> Level {
        get_trace_level(&self.trace_level)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    pub fn leaderboard_ttl(&self) -> Duration {
        Duration::from_secs(self.leaderboard_ttl_sec)
    }

    pub fn builds_ttl(&self) -> Duration {
        Duration::from_secs(self.builds_ttl_sec)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            trace_level: default_trace_level(),
            data_source: default_data_source(),
            site_base_url: default_site_base_url(),
            dump_location: default_dump_location(),
            proxy_mode: default_proxy_mode(),
            cors_relay_prefix: default_cors_relay_prefix(),
            request_timeout_sec: default_request_timeout_sec(),
            leaderboard_ttl_sec: default_leaderboard_ttl_sec(),
            builds_ttl_sec: default_builds_ttl_sec(),
            cache_dir: None,
            max_concurrent_requests: default_max_concurrent_requests(),
            batch_delay_ms: default_batch_delay_ms(),
            debounce_ms: default_debounce_ms(),
            refresh_schedule: default_refresh_schedule(),
        }
    }
}

fn get_trace_level(level_str: &str) -> Level {
    match level_str.to_uppercase().as_str() {
        level if level == TRACE_LEVELS[0] => Level::TRACE,
        level if level == TRACE_LEVELS[1] => Level::DEBUG,
        level if level == TRACE_LEVELS[2] => Level::INFO,
        level if level == TRACE_LEVELS[3] => Level::WARN,
        level if level == TRACE_LEVELS[4] => Level::ERROR,
        // Default trace level
        _ => Level::INFO,
    }
}

fn default_trace_level() -> String {
    "INFO".to_string()
}

fn default_data_source() -> DataSourceKind {
    DataSourceKind::Dump
}

fn default_site_base_url() -> String {
    "https://illuvilytics.web.app".to_string()
}

fn default_dump_location() -> String {
    "latest_illuvium_builds.json".to_string()
}

fn default_proxy_mode() -> ProxyMode {
    ProxyMode::Bridge
}

fn default_cors_relay_prefix() -> String {
    "https://cors-anywhere.herokuapp.com/".to_string()
}

fn default_request_timeout_sec() -> u64 {
    15
}

fn default_leaderboard_ttl_sec() -> u64 {
    10 * 60
}

fn default_builds_ttl_sec() -> u64 {
    5 * 60
}

fn default_max_concurrent_requests() -> usize {
    3
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    1000
}

// Every 5 minutes, at second 0.
fn default_refresh_schedule() -> String {
    "0 */5 * * * *".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::from_figment(Figment::new()).unwrap();
        assert_eq!(settings.data_source, DataSourceKind::Dump);
        assert_eq!(settings.proxy_mode, ProxyMode::Bridge);
        assert_eq!(settings.request_timeout(), Duration::from_secs(15));
        assert_eq!(settings.leaderboard_ttl(), Duration::from_secs(600));
        assert_eq!(settings.builds_ttl(), Duration::from_secs(300));
        assert_eq!(settings.max_concurrent_requests, 3);
        assert_eq!(settings.batch_delay(), Duration::from_millis(500));
        assert_eq!(settings.debounce_delay(), Duration::from_millis(1000));
        assert!(settings.cache_dir.is_none());
        assert_eq!(settings.get_trace_level(), Level::INFO);
    }

    #[test]
    fn yaml_then_overrides() {
        let yaml = "data_source: scrape\ntrace_level: debug\nbuilds_ttl_sec: 60\n";
        let overrides = SettingsOverrides {
            data_source: None,
            dump_location: Some("/tmp/dump.json".to_string()),
            cache_dir: None,
            proxy_mode: Some(ProxyMode::Relay),
        };
        let figment = Figment::new()
            .merge(Yaml::string(yaml))
            .merge(Serialized::defaults(&overrides));
        let settings = Settings::from_figment(figment).unwrap();

        assert_eq!(settings.data_source, DataSourceKind::Scrape);
        assert_eq!(settings.get_trace_level(), Level::DEBUG);
        assert_eq!(settings.builds_ttl(), Duration::from_secs(60));
        assert_eq!(settings.dump_location, "/tmp/dump.json");
        assert_eq!(settings.proxy_mode, ProxyMode::Relay);
    }

    #[test]
    fn unknown_trace_level_falls_back_to_info() {
        assert_eq!(get_trace_level("chatty"), Level::INFO);
        assert_eq!(get_trace_level("WARN"), Level::WARN);
    }
}
