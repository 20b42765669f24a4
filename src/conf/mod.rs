use crate::cluster;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// The default configuration path searched when the embedding service does not
/// supply one.
const DEFAULT_CONFIG_PATH: &str = "/etc/armada/armada.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub general: General,
    pub server: Server,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct General {
    /// Turns on extra debug logging and other conveniences for development.
    pub dev_mode: bool,
    pub log_level: String,
}

impl Default for General {
    fn default() -> Self {
        General {
            dev_mode: false,
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub storage_path: String,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            storage_path: "/tmp/armada.db".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub engine: cluster::Engine,
}

impl Config {
    /// Layered configuration load: built-in defaults, then the TOML file
    /// (caller path override or the default location), then `ARMADA_`
    /// prefixed environment variables which always win. Nested keys are
    /// addressed in env vars with a double underscore,
    /// e.g. `ARMADA_GENERAL__LOG_LEVEL=debug`.
    pub fn load(path_override: Option<&str>) -> Result<Config, figment::Error> {
        let path = path_override.unwrap_or(DEFAULT_CONFIG_PATH);

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ARMADA_").split("__"))
            .extract()
    }
}

/// Install the global tracing subscriber. Called once by the embedding
/// service before any armada operation runs.
pub fn init_logging(config: &General) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.dev_mode {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    }
}
