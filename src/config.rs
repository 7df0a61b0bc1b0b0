use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    // Mongo is only used when a URI is configured; otherwise alerts go to a JSON file.
    pub mongodb_uri: Option<String>,
    pub mongodb_db: String,
    pub alerts_file: String,

    pub monitor_interval_ms: u64,
    pub default_cooldown_ms: i64,
    pub volume_window: usize,
    pub event_buffer: usize,

    pub finnhub_api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: "127.0.0.1".to_string(),
            port: 3000,
            mongodb_uri: None,
            mongodb_db: "alertwatch".to_string(),
            alerts_file: "alerts.json".to_string(),
            monitor_interval_ms: 5_000,
            default_cooldown_ms: 300_000,
            volume_window: 20,
            event_buffer: 256,
            finnhub_api_key: String::new(),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(fallback)
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let defaults = Settings::default();

    let host = env::var("HOST").unwrap_or(defaults.host);
    let port = parsed("PORT", defaults.port);

    let mongodb_uri = env::var("MONGODB_URI")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let mongodb_db = env::var("MONGODB_DB").unwrap_or(defaults.mongodb_db);
    let alerts_file = env::var("ALERTS_FILE").unwrap_or(defaults.alerts_file);

    let monitor_interval_ms = parsed("MONITOR_INTERVAL_MS", defaults.monitor_interval_ms).max(1);
    let default_cooldown_ms = parsed("DEFAULT_COOLDOWN_MS", defaults.default_cooldown_ms).max(0);
    let volume_window = parsed("VOLUME_WINDOW", defaults.volume_window).max(1);
    let event_buffer = parsed("EVENT_BUFFER", defaults.event_buffer).max(1);

    let finnhub_api_key = env::var("FINNHUB_API_KEY").unwrap_or_default();

    Settings {
        host,
        port,
        mongodb_uri,
        mongodb_db,
        alerts_file,
        monitor_interval_ms,
        default_cooldown_ms,
        volume_window,
        event_buffer,
        finnhub_api_key,
    }
}
