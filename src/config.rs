// Runtime configuration: defaults plus VIDFETCH_* environment overrides

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Staging area for intermediate and final files. Everything the
    /// service writes or serves lives under this root.
    pub staging_dir: PathBuf,
    /// Explicit yt-dlp binary path; discovered when unset.
    pub ytdlp_path: Option<String>,
    /// Explicit ffmpeg binary path; "ffmpeg" from PATH when unset.
    pub ffmpeg_path: Option<String>,
    pub probe_timeout: Duration,
    pub fetch_timeout: Duration,
    pub mux_timeout: Duration,
    pub artifact_ttl: Duration,
    pub artifact_size_budget: u64,
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let staging_dir = dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("vidfetch");
        Self {
            bind_addr: ([127, 0, 0, 1], 8090).into(),
            staging_dir,
            ytdlp_path: None,
            ffmpeg_path: None,
            probe_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(900),
            mux_timeout: Duration::from_secs(300),
            artifact_ttl: Duration::from_secs(3600),
            artifact_size_budget: 4 * 1024 * 1024 * 1024,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Build a configuration from defaults, letting the environment
    /// override individual fields.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = env::var("VIDFETCH_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(_) => warn!(%addr, "ignoring unparseable VIDFETCH_ADDR"),
            }
        }
        if let Ok(dir) = env::var("VIDFETCH_STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var("VIDFETCH_YTDLP") {
            config.ytdlp_path = Some(path);
        }
        if let Ok(path) = env::var("VIDFETCH_FFMPEG") {
            config.ffmpeg_path = Some(path);
        }
        if let Some(secs) = env_secs("VIDFETCH_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = secs;
        }
        if let Some(secs) = env_secs("VIDFETCH_ARTIFACT_TTL_SECS") {
            config.artifact_ttl = secs;
        }
        if let Ok(mb) = env::var("VIDFETCH_ARTIFACT_BUDGET_MB") {
            match mb.parse::<u64>() {
                Ok(parsed) => config.artifact_size_budget = parsed * 1024 * 1024,
                Err(_) => warn!(%mb, "ignoring unparseable VIDFETCH_ARTIFACT_BUDGET_MB"),
            }
        }

        config
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    let value = env::var(name).ok()?;
    match value.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!(name, %value, "ignoring unparseable duration override");
            None
        }
    }
}
