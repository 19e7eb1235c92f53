use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "salesd.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Port for length-prefixed JSON frames
    pub framed_port: u16,
    /// Port for line-delimited JSON-RPC
    pub rpc_port: u16,
    /// Concurrent connections allowed per transport
    pub max_connections: usize,
    /// Seconds a connection may stay silent before it is closed
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            framed_port: 50051,
            rpc_port: 8000,
            max_connections: 100,
            idle_timeout_secs: 300, // 5 minutes
        }
    }
}

impl ServerConfig {
    pub fn framed_addr(&self) -> String {
        format!("{}:{}", self.host, self.framed_port)
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.host, self.rpc_port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV export the record store is built from
    pub source: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("sales_data.csv"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
}

impl Config {
    /// Load config from TOML file, with environment variable and CLI
    /// overrides. Falls back to defaults if the file is not found.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        ConfigLoader::from_process().load(path)
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves configuration from file, CLI args, and environment variables.
pub struct ConfigLoader {
    args: Vec<String>,
    env: EnvLookup,
}

impl ConfigLoader {
    pub fn from_process() -> Self {
        Self {
            args: env::args().collect(),
            env: Box::new(|key| env::var(key).ok()),
        }
    }

    /// Loader over explicit arguments and a custom variable lookup.
    pub fn new<F>(args: Vec<String>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            args,
            env: Box::new(env),
        }
    }

    pub fn load<P: AsRef<Path>>(&self, default_path: P) -> anyhow::Result<Config> {
        let mut cfg_path = self.resolve_config_path(default_path);

        // SALES_CONFIG overrides any arg/default
        if let Some(env_path) = (self.env)("SALES_CONFIG") {
            cfg_path = PathBuf::from(env_path);
        }

        let mut cfg = match fs::read_to_string(&cfg_path) {
            Ok(s) => toml::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", cfg_path.display());
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        self.apply_env_overrides(&mut cfg);
        if let Some(source) = find_flag(&self.args, "--data", None) {
            cfg.data.source = PathBuf::from(source);
        }

        Ok(cfg)
    }

    fn resolve_config_path<P: AsRef<Path>>(&self, default_path: P) -> PathBuf {
        match find_flag(&self.args, "--config", Some("-c")) {
            Some(p) => PathBuf::from(p),
            None => default_path.as_ref().to_path_buf(),
        }
    }

    /// Apply SALES_* environment variable overrides.
    fn apply_env_overrides(&self, cfg: &mut Config) {
        if let Some(v) = (self.env)("SALES_HOST") {
            cfg.server.host = v;
        }

        if let Some(v) = (self.env)("SALES_FRAMED_PORT")
            && let Ok(p) = v.parse::<u16>()
        {
            cfg.server.framed_port = p;
        }

        if let Some(v) = (self.env)("SALES_RPC_PORT")
            && let Ok(p) = v.parse::<u16>()
        {
            cfg.server.rpc_port = p;
        }

        if let Some(v) = (self.env)("SALES_DATA") {
            cfg.data.source = PathBuf::from(v);
        }
    }
}

/// Value of `--flag value`, `--flag=value` or the short form.
fn find_flag(args: &[String], long: &str, short: Option<&str>) -> Option<String> {
    let is_flag = |a: &str| a == long || Some(a) == short;

    let mut iter = args.iter().peekable();
    while let Some(a) = iter.next() {
        if let Some((name, val)) = a.split_once('=')
            && is_flag(name)
        {
            return Some(val.to_string());
        } else if is_flag(a)
            && let Some(next) = iter.peek()
        {
            return Some((*next).clone());
        }
    }
    None
}
