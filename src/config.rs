use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

pub const DEFAULT_ROOMS: [&str; 6] = ["A1", "A2", "B1", "B2", "C1", "C2"];

/// Runtime settings, read from `ROOMBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Rooms the console offers when booking.
    pub rooms: Vec<String>,
    /// `None` disables the per-call store timeout.
    pub store_timeout: Option<Duration>,
    pub metrics_port: Option<u16>,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            rooms: DEFAULT_ROOMS.iter().map(|r| r.to_string()).collect(),
            store_timeout: Some(Duration::from_millis(5000)),
            metrics_port: None,
            log_level: Level::WARN,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the default for that setting.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let data_dir = lookup("ROOMBOOK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let rooms = lookup("ROOMBOOK_ROOMS")
            .map(|s| parse_rooms(&s))
            .filter(|rooms| !rooms.is_empty())
            .unwrap_or(defaults.rooms);
        let store_timeout_ms =
            lookup("ROOMBOOK_STORE_TIMEOUT_MS").and_then(|s| s.trim().parse::<u64>().ok());
        let store_timeout = match store_timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.store_timeout,
        };
        let metrics_port = lookup("ROOMBOOK_METRICS_PORT").and_then(|s| s.trim().parse().ok());
        let log_level = lookup("ROOMBOOK_LOG_LEVEL")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.log_level);

        Self {
            data_dir,
            rooms,
            store_timeout,
            metrics_port,
            log_level,
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("reservations.wal")
    }
}

/// Comma-separated, trimmed, blanks and repeats dropped, order kept.
fn parse_rooms(s: &str) -> Vec<String> {
    let mut rooms: Vec<String> = Vec::new();
    for room in s.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        if !rooms.iter().any(|r| r == room) {
            rooms.push(room.to_string());
        }
    }
    rooms
}
