use crate::attendance::scan::{
    DEFAULT_CAMERA_MAX_RETRIES, DEFAULT_CAMERA_RETRY_DELAY, DEFAULT_SCAN_COOLDOWN,
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    Duration::from_millis(env_u64(name, default.as_millis() as u64))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub cooldown: Duration,
    pub camera_max_retries: u32,
    pub camera_retry_delay: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_SCAN_COOLDOWN,
            camera_max_retries: DEFAULT_CAMERA_MAX_RETRIES,
            camera_retry_delay: DEFAULT_CAMERA_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Settings for the IPC daemon, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api: Option<ApiConfig>,
    pub scan: ScanConfig,
    pub version_url: Option<String>,
    pub version_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: None,
            scan: ScanConfig::default(),
            version_url: None,
            version_poll_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let api = env_string("ROLLCALL_API_BASE").map(|base_url| ApiConfig {
            base_url,
            token: env_string("ROLLCALL_API_TOKEN"),
            timeout: env_duration_ms("ROLLCALL_API_TIMEOUT_MS", Duration::from_secs(15)),
        });
        let defaults = ScanConfig::default();
        Self {
            api,
            scan: ScanConfig {
                cooldown: env_duration_ms("ROLLCALL_SCAN_COOLDOWN_MS", defaults.cooldown),
                camera_max_retries: u32::try_from(env_u64(
                    "ROLLCALL_CAMERA_MAX_RETRIES",
                    defaults.camera_max_retries as u64,
                ))
                .unwrap_or(defaults.camera_max_retries),
                camera_retry_delay: env_duration_ms(
                    "ROLLCALL_CAMERA_RETRY_DELAY_MS",
                    defaults.camera_retry_delay,
                ),
            },
            version_url: env_string("ROLLCALL_VERSION_URL"),
            version_poll_interval: Duration::from_secs(env_u64("ROLLCALL_VERSION_POLL_SECS", 60)),
        }
    }
}

/// Settings for the static asset server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub port: u16,
    pub dist_dir: PathBuf,
    pub compression_min_bytes: usize,
    pub version: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            dist_dir: PathBuf::from("build"),
            compression_min_bytes: 1024,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = env_u64("PORT", defaults.port as u64);
        Self {
            port: u16::try_from(port).unwrap_or(defaults.port),
            dist_dir: env_string("ROLLCALL_DIST_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.dist_dir),
            compression_min_bytes: env_u64(
                "ROLLCALL_COMPRESSION_MIN_BYTES",
                defaults.compression_min_bytes as u64,
            ) as usize,
            version: env_string("ROLLCALL_APP_VERSION").unwrap_or(defaults.version),
        }
    }
}
