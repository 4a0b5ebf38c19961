//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use vidgen_vendor::VendorConfig;

/// Runtime configuration for vidgen-server.
///
/// Every field has a default so the server starts without any environment
/// set; without `MINIMAX_API_KEY` every proxy call answers with a
/// configuration error instead.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// Vendor bearer token (`MINIMAX_API_KEY`).
    pub api_key: Option<String>,

    /// Vendor scheme and host (default: `"https://api.minimax.io"`).
    pub vendor_base_url: String,

    /// Model identifier sent with generation requests.
    pub vendor_model: String,

    /// Per-request timeout for vendor calls, in seconds.
    pub vendor_timeout_secs: u64,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for a daily-rolling log file, in addition to stdout.
    pub log_dir: Option<String>,

    /// Comma-separated list of allowed CORS origins. `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("VIDGEN_BIND", "0.0.0.0:3000"),
            api_key: env_opt("MINIMAX_API_KEY"),
            vendor_base_url: env_or("VIDGEN_VENDOR_BASE_URL", "https://api.minimax.io"),
            vendor_model: env_or("VIDGEN_VENDOR_MODEL", vidgen_types::DEFAULT_MODEL),
            vendor_timeout_secs: parse_env("VIDGEN_VENDOR_TIMEOUT_SECS", 30),
            log_level: env_or("VIDGEN_LOG", "info"),
            log_json: env_flag("VIDGEN_LOG_JSON", false),
            log_dir: env_opt("VIDGEN_LOG_DIR"),
            cors_allowed_origins: env_opt("VIDGEN_CORS_ORIGINS"),
            enable_swagger: env_flag("VIDGEN_ENABLE_SWAGGER", true),
        }
    }

    pub fn vendor(&self) -> VendorConfig {
        VendorConfig {
            base_url: self.vendor_base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.vendor_model.clone(),
            timeout: Duration::from_secs(self.vendor_timeout_secs),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("vendor_base_url", &self.vendor_base_url)
            .field("vendor_model", &self.vendor_model)
            .field("vendor_timeout_secs", &self.vendor_timeout_secs)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("log_dir", &self.log_dir)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("enable_swagger", &self.enable_swagger)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            api_key: None,
            vendor_base_url: "https://api.minimax.io".to_owned(),
            vendor_model: vidgen_types::DEFAULT_MODEL.to_owned(),
            vendor_timeout_secs: 30,
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: None,
            enable_swagger: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v).unwrap_or(default))
        .unwrap_or(default)
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim() {
        "1" => Some(true),
        "0" => Some(false),
        s if s.eq_ignore_ascii_case("true") => Some(true),
        s if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
