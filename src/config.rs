use std::env;
use std::path::PathBuf;

pub const DEFAULT_MAX_UPLOAD_FILES: usize = 10;
pub const DEFAULT_MAX_UPLOAD_FILE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub run_migrations: bool,
    pub uploads: UploadSettings,
}

/// Where uploaded images land and how large a request may get.
#[derive(Clone, Debug)]
pub struct UploadSettings {
    pub dir: PathBuf,
    /// Prefix for returned URLs; empty means relative (`/uploads/...`).
    pub public_base_url: String,
    pub max_files: usize,
    pub max_file_bytes: usize,
    pub timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./uploads"),
            public_base_url: String::new(),
            max_files: DEFAULT_MAX_UPLOAD_FILES,
            max_file_bytes: DEFAULT_MAX_UPLOAD_FILE_BYTES,
            timeout_secs: 120,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env_parse::<i64>("SESSION_TTL_HOURS").unwrap_or(24);
        let run_migrations = env_parse::<bool>("RUN_MIGRATIONS").unwrap_or(true);

        let defaults = UploadSettings::default();
        let uploads = UploadSettings {
            dir: env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.dir),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            max_files: env_parse::<usize>("UPLOAD_MAX_FILES")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_files),
            max_file_bytes: env_parse::<usize>("UPLOAD_MAX_FILE_BYTES")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_file_bytes),
            timeout_secs: env_parse::<u64>("UPLOAD_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            run_migrations,
            uploads,
        })
    }
}
