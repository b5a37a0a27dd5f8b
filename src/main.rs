mod cli;
mod host;
mod logging;

use std::process::ExitCode;

use cli::Cli;
use color_eyre::eyre::Result;
use ollama_panel::config::ConfigManager;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse_args();

    let mut config = match &cli.config_dir {
        Some(dir) => ConfigManager::with_dir(dir),
        None => ConfigManager::new()?,
    };

    // Command line wins over config.toml
    let general = &mut config.app_config_mut().general;
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    if cli.timeout.is_some() {
        general.request_timeout_secs = cli.timeout;
    }
    if let Some(backend) = cli.keystore {
        config.app_config_mut().keystore.backend = Some(backend);
    }

    let general = &config.app_config().general;
    let _log_guard = logging::init(&general.log_level, general.log_file.as_deref())?;
    tracing::debug!("Using config dir {}", config.config_dir().display());

    let host = host::Host::open(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(host.run(cli.command))
}
