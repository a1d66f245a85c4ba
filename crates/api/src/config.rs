use crate::auth::jwt::JwtConfig;

/// HTTP server settings.
///
/// Everything except the JWT secret has a local-development default.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the embedded dispatcher to drain.
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Run the workflow dispatcher inside the API process.
    pub embedded_worker: bool,
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173";

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} has an invalid value '{raw}'")),
        Err(_) => default,
    }
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `EMBEDDED_WORKER`       | `true`                  |
    ///
    /// `JWT_SECRET` is required; see [`JwtConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed("PORT", 3000),
            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into()),
            ),
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: parsed("SHUTDOWN_TIMEOUT_SECS", 30),
            jwt: JwtConfig::from_env(),
            embedded_worker: parsed("EMBEDDED_WORKER", true),
        }
    }
}
