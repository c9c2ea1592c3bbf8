// Application configuration, loaded from environment variables and CLI flags.

use std::time::Duration;

pub const DEFAULT_ORACLE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_ORACLE_MODEL: &str = "meta-llama/llama-3.1-8b-instruct:free";
const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 20;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// OpenRouter key. Without one the oracle runs offline and every
    /// draft uses its fallback.
    pub openrouter_api_key: Option<String>,
    pub oracle_api_url: String,
    pub oracle_model: String,
    pub oracle_timeout: Duration,
    /// Per-player limits on oracle-backed actions and raids.
    pub rate_limit_enabled: bool,
    /// Shared secret required as `Authorization: Bearer <secret>`.
    pub webhook_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:rift.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `OPENROUTER_API_KEY` - generator key (unset = offline fallbacks)
    /// - `ORACLE_API_URL`, `ORACLE_MODEL` - chat completion endpoint and model
    /// - `ORACLE_TIMEOUT_SECS` - per-call timeout (default: 20)
    /// - `RIFT_RATE_LIMIT` - set to `off` to disable rate limiting
    /// - `WEBHOOK_SECRET` - require a bearer secret on action routes
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--db <URL>` - Override the database URL
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let database_url = Self::parse_cli_value(args, "--db")
            .or_else(|| non_empty("DATABASE_URL"))
            .unwrap_or_else(|| "sqlite:rift.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let oracle_timeout = env("ORACLE_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS));

        let rate_limit_enabled = env("RIFT_RATE_LIMIT")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "off" | "false" | "0"))
            .unwrap_or(true);

        Config {
            database_url,
            port,
            openrouter_api_key: non_empty("OPENROUTER_API_KEY"),
            oracle_api_url: non_empty("ORACLE_API_URL")
                .unwrap_or_else(|| DEFAULT_ORACLE_URL.to_string()),
            oracle_model: non_empty("ORACLE_MODEL")
                .unwrap_or_else(|| DEFAULT_ORACLE_MODEL.to_string()),
            oracle_timeout,
            rate_limit_enabled,
            webhook_secret: non_empty("WEBHOOK_SECRET"),
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
