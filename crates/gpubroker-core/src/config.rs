//! Configuration types for gpubroker

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{slot_port, BrokerError, BrokerResult};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// API server configuration
    pub api: ApiConfig,
    /// GPU pool configuration
    pub pool: PoolConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl BrokerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> BrokerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BrokerError::Config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| BrokerError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Defaults, overlaid with `path` when given, then the process environment
    pub fn load(path: Option<&Path>) -> BrokerResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay environment-style settings looked up through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> BrokerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GPU_COUNT") {
            self.pool.gpu_count = parse_env("GPU_COUNT", &v)?;
        }
        if let Some(v) = get("BASE_PORT") {
            self.pool.base_port = parse_env("BASE_PORT", &v)?;
        }
        if let Some(v) = get("SESSION_TIMEOUT") {
            self.pool.lease_timeout_secs = parse_duration(&v)
                .map_err(|e| BrokerError::Config(format!(
                    "SESSION_TIMEOUT: {} (use whole seconds or units {}, e.g. 4h or 1.5h)",
                    e, DURATION_UNITS
                )))?
                .as_secs();
        }
        if let Some(v) = get("LISTEN_ADDR") {
            self.api.address = v;
        }
        if let Some(v) = get("PORT") {
            self.api.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = get("DASHBOARD_DIR") {
            self.api.dashboard_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Reject settings the pool cannot be built from
    pub fn validate(&self) -> BrokerResult<()> {
        self.pool.validate()
    }
}

fn parse_env<T>(key: &str, value: &str) -> BrokerResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| BrokerError::Config(format!("{} must be a valid number: {}", key, e)))
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind the REST API server
    pub address: String,
    /// Port for the REST API server
    pub port: u16,
    /// Directory of static dashboard assets, served for unmatched paths
    pub dashboard_dir: Option<PathBuf>,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            dashboard_dir: None,
            cors_enabled: false,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// GPU pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of GPUs in the pool
    pub gpu_count: u32,
    /// Streaming port of slot 0
    pub base_port: u16,
    /// Lease lifetime in seconds before the sweep reclaims it
    pub lease_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            gpu_count: 1,
            base_port: 47984,
            lease_timeout_secs: 4 * 60 * 60,
        }
    }
}

impl PoolConfig {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    pub fn validate(&self) -> BrokerResult<()> {
        if self.gpu_count == 0 {
            return Err(BrokerError::Config(
                "gpu_count must be at least 1".to_string(),
            ));
        }
        if self.lease_timeout_secs == 0 {
            return Err(BrokerError::Config(
                "lease timeout must be at least one second".to_string(),
            ));
        }
        if slot_port(self.base_port, self.gpu_count - 1).is_none() {
            return Err(BrokerError::Config(format!(
                "{} GPUs starting at port {} run past port 65535",
                self.gpu_count, self.base_port
            )));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Units accepted by [`parse_duration`]
pub const DURATION_UNITS: &str = "h, m, s, ms";

/// Parse a duration such as `4h`, `1.5h`, `90m`, `1h30m`, `45s`, `500ms` or
/// bare seconds
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let (number, tail) = rest.split_at(rest.find(|c| !is_number(c)).unwrap_or(rest.len()));
        let (unit, tail) = tail.split_at(tail.find(is_number).unwrap_or(tail.len()));

        let value: f64 = number
            .parse()
            .map_err(|_| format!("missing number before {:?} in {:?}", unit, input))?;
        let scale = match unit {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            "" => return Err(format!("missing unit after {} in {:?}", number, input)),
            other => {
                return Err(format!(
                    "unknown unit {:?} in {:?}, expected one of {}",
                    other, input, DURATION_UNITS
                ))
            }
        };
        total += value * scale;
        rest = tail;
    }

    Duration::try_from_secs_f64(total).map_err(|_| format!("duration {:?} is out of range", input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.pool.gpu_count, 1);
        assert_eq!(config.pool.base_port, 47984);
        assert_eq!(config.pool.lease_timeout(), Duration::from_secs(4 * 3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
[pool]
gpu_count = 4

[api]
dashboard_dir = "./dashboard/dist"
"#;
        let config: BrokerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pool.gpu_count, 4);
        assert_eq!(config.pool.base_port, 47984);
        assert_eq!(
            config.api.dashboard_dir,
            Some(PathBuf::from("./dashboard/dist"))
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pool]\nbase_port = 50000\nlease_timeout_secs = 600").unwrap();

        let config = BrokerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pool.base_port, 50000);
        assert_eq!(config.pool.lease_timeout_secs, 600);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pool\ngpu_count = ").unwrap();
        let err = BrokerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }

    #[test]
    fn test_env_overlay() {
        let vars = env(&[
            ("GPU_COUNT", "3"),
            ("BASE_PORT", "48000"),
            ("SESSION_TIMEOUT", "1h30m"),
            ("PORT", "9000"),
            ("DASHBOARD_DIR", ""),
        ]);
        let mut config = BrokerConfig::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.pool.gpu_count, 3);
        assert_eq!(config.pool.base_port, 48000);
        assert_eq!(config.pool.lease_timeout_secs, 5400);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.dashboard_dir, None);
    }

    #[test]
    fn test_env_overlay_rejects_bad_number() {
        let vars = env(&[("GPU_COUNT", "lots")]);
        let mut config = BrokerConfig::default();
        let err = config.apply_env_from(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("GPU_COUNT"));
    }

    #[test]
    fn test_validate() {
        let mut pool = PoolConfig::default();
        pool.gpu_count = 0;
        assert!(pool.validate().is_err());

        let pool = PoolConfig {
            gpu_count: 2,
            base_port: 65530,
            lease_timeout_secs: 60,
        };
        assert!(pool.validate().is_err());

        let pool = PoolConfig {
            gpu_count: 1,
            base_port: 65530,
            lease_timeout_secs: 60,
        };
        assert!(pool.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("4h"), Ok(Duration::from_secs(14400)));
        assert_eq!(parse_duration("90m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1h30m15s"), Ok(Duration::from_secs(5415)));
        assert_eq!(parse_duration("300"), Ok(Duration::from_secs(300)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("4d").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("1h30").is_err());
    }

    #[test]
    fn test_parse_duration_fractions_and_millis() {
        assert_eq!(parse_duration("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("2h45.5m"), Ok(Duration::from_secs(9930)));
        assert_eq!(parse_duration("1500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("1m500ms"), Ok(Duration::from_millis(60_500)));
        assert!(parse_duration("1..5h").is_err());
        assert!(parse_duration(".h").is_err());
    }

    #[test]
    fn test_env_overlay_fractional_timeout() {
        let vars = env(&[("SESSION_TIMEOUT", "0.5h")]);
        let mut config = BrokerConfig::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.pool.lease_timeout_secs, 1800);

        let vars = env(&[("SESSION_TIMEOUT", "4 days")]);
        let err = config.apply_env_from(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("h, m, s, ms"));
    }
}
