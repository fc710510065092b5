use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "HealthMate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_COUNTRY_CODE: &str = "91";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_SOS_HOSPITAL_DELAY_SECS: u64 = 10;
pub const DEFAULT_HOSPITAL_SEARCH_RADIUS_M: u32 = 5000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Value shipped in the sample `.env`; treated as "no key".
const GOOGLE_KEY_PLACEHOLDER: &str = "YOUR_GOOGLE_MAPS_API_KEY";

/// Get the application data directory
/// ~/HealthMate/ when a home directory exists, else the working directory.
pub fn app_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(APP_NAME),
        None => PathBuf::from(APP_NAME),
    }
}

/// Default location of the SQLite file.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("healthmate.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "healthmate_lib=info,healthmate=info,tower_http=info,warn"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    Development,
    Production,
}

impl RuntimeEnv {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Twilio credentials. Only built when all three values are present.
#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub twilio: Option<TwilioConfig>,
    pub google_maps_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub default_country_code: String,
    pub env: RuntimeEnv,
    pub sos_hospital_delay: Duration,
    pub hospital_search_radius_m: u32,
    pub http_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("database_path", &self.database_path)
            .field("twilio", &self.twilio)
            .field("google_maps_api_key", &self.google_maps_api_key.as_ref().map(|_| "<set>"))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<set>"))
            .field("gemini_model", &self.gemini_model)
            .field("default_country_code", &self.default_country_code)
            .field("env", &self.env)
            .field("sos_hospital_delay", &self.sos_hospital_delay)
            .field("hospital_search_radius_m", &self.hospital_search_radius_m)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            database_path: default_database_path(),
            twilio: None,
            google_maps_api_key: None,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            env: RuntimeEnv::Development,
            sos_hospital_delay: Duration::from_secs(DEFAULT_SOS_HOSPITAL_DELAY_SECS),
            hospital_search_radius_m: DEFAULT_HOSPITAL_SEARCH_RADIUS_M,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Read the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset; values that
    /// fail to parse fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Self {
            bind_addr: parsed(&get, "BIND_ADDR", defaults.bind_addr),
            port: parsed(&get, "PORT", defaults.port),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            twilio,
            google_maps_api_key: get("GOOGLE_MAPS_API_KEY").filter(|k| k != GOOGLE_KEY_PLACEHOLDER),
            gemini_api_key: get("G_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            default_country_code: get("DEFAULT_COUNTRY_CODE")
                .map(|cc| cc.trim_start_matches('+').to_string())
                .filter(|cc| !cc.is_empty() && cc.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(defaults.default_country_code),
            env: get("APP_ENV").map(|v| RuntimeEnv::parse(&v)).unwrap_or(defaults.env),
            sos_hospital_delay: Duration::from_secs(parsed(
                &get,
                "SOS_HOSPITAL_DELAY_SECS",
                DEFAULT_SOS_HOSPITAL_DELAY_SECS,
            )),
            hospital_search_radius_m: parsed(
                &get,
                "HOSPITAL_SEARCH_RADIUS_M",
                defaults.hospital_search_radius_m,
            ),
            http_timeout_secs: parsed(&get, "HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parsed<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            default
        }),
        None => default,
    }
}
