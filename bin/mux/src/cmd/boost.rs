use crate::cmd::config::Config;
use clap::Args;
use relay_mux::Service;
use tracing::info;

#[derive(Debug, Args)]
#[clap(about = "🚀 connecting proposers to the external builder network")]
pub struct Command {
    #[clap(env, default_value = "config.toml")]
    config_file: String,
}

impl Command {
    pub async fn execute(self) -> eyre::Result<()> {
        let config = Config::from_toml_file(&self.config_file)?;

        let network = config.network;
        info!("configured for {network}");

        let Some(config) = config.boost else {
            return Err(eyre::eyre!("missing boost config from file provided"))
        };
        let handle = Service::from(network, config).spawn(None).await?;
        info!(address = %handle.local_addr(), "serving the Builder API");
        Ok(handle.await?)
    }
}
