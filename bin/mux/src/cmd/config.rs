use clap::Args;
use ethereum_consensus::networks::Network;
use eyre::WrapErr;
use relay_mux::Config as BoostConfig;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub network: Network,
    pub boost: Option<BoostConfig>,
}

impl Config {
    pub fn from_toml_file<P: AsRef<Path> + fmt::Display>(path: P) -> eyre::Result<Config> {
        tracing::info!("loading config from `{path}`...");

        let config_data = std::fs::read_to_string(path.as_ref())
            .wrap_err_with(|| format!("could not read config from `{path}`"))?;

        toml::from_str(&config_data).wrap_err("could not parse TOML")
    }
}

#[derive(Debug, Args)]
#[clap(about = "🔬 (debug) utility to verify configuration")]
pub struct Command {
    #[clap(env)]
    config_file: String,
}

impl Command {
    pub async fn execute(self) -> eyre::Result<()> {
        let config = Config::from_toml_file(&self.config_file)?;
        info!("{config:#?}");

        Ok(())
    }
}
