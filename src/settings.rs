// src/settings.rs

use std::{net::SocketAddr, path::Path, path::PathBuf};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "127.0.0.1:5000";
const ENV_PREFIX: &str = "TRUFEED";

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// JSON array of event documents to load into the event store before serving.
    #[arg(long, value_name = "EVENTS_JSON")]
    pub import: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LlmSettings {
    pub ollama_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub database: DatabaseSettings,
    pub llm: LlmSettings,
}

impl Settings {
    /// Load settings from the optional TOML file and `TRUFEED_*` environment
    /// variables, with sane defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::<DefaultState>::default()
            .set_default("web.address", DEFAULT_ADDR)?
            .set_default("database.path", "trufeed.db")?
            .set_default("llm.ollama_url", "http://127.0.0.1:11434")?
            .set_default("llm.model", "llama3.1:8b")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        cfg.try_deserialize()
    }
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.web.address, DEFAULT_ADDR.parse().unwrap());
        assert_eq!(settings.database.path, PathBuf::from("trufeed.db"));
        assert_eq!(settings.llm.ollama_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[web]\naddress = \"0.0.0.0:8080\"\n\n[llm]\nollama_url = \"http://gpu-box:11434\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.web.address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(settings.llm.ollama_url, "http://gpu-box:11434");
        assert_eq!(settings.database.path, PathBuf::from("trufeed.db"));
    }

    // Only this test reads or sets `llm.model`; the environment is process-wide.
    #[test]
    fn environment_overrides_file_and_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[llm]\nmodel = \"qwen3:8b\"").unwrap();

        std::env::set_var("TRUFEED_LLM__MODEL", "mistral:7b");
        let from_file = Settings::load(Some(file.path()));
        let from_defaults = Settings::load(None);
        std::env::remove_var("TRUFEED_LLM__MODEL");

        assert_eq!(from_file.unwrap().llm.model, "mistral:7b");
        assert_eq!(from_defaults.unwrap().llm.model, "mistral:7b");
    }

    #[test]
    fn bad_address_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[web]\naddress = \"not-an-address\"").unwrap();

        assert!(Settings::load(Some(file.path())).is_err());
    }
}
