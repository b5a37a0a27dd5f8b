use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ollama_panel::config::{FimTemplate, KeyStoreBackend};

/// Ollama-Panel: manage the settings used to talk to a local Ollama server
#[derive(Parser, Debug, Clone)]
#[command(name = "ollama-panel")]
#[command(author = "RidgetopAI")]
#[command(version)]
#[command(about = "Configure host, model, API key and code completions for Ollama", long_about = None)]
pub struct Cli {
    /// Configuration directory (defaults to the platform config dir)
    #[arg(long, value_name = "DIR", env = "OLLAMA_PANEL_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config.toml.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Model list request timeout in seconds. Unset waits for the server.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Credential backend. Overrides config.toml.
    #[arg(long, value_enum)]
    pub keystore: Option<KeyStoreBackend>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the persisted settings
    Show,

    /// Fetch and list the models available on the host
    Models {
        /// Query this host instead of the saved one (not saved)
        #[arg(long)]
        host: Option<String>,
    },

    /// Edit settings and save them when anything changed
    Set(SetArgs),

    /// Print the completion prompt built by the saved FIM template
    Fim {
        #[arg(long, default_value = "")]
        prefix: String,

        #[arg(long, default_value = "")]
        suffix: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SetArgs {
    /// Base URL of the Ollama server
    #[arg(long)]
    pub host: Option<String>,

    /// Model to select; must be listed by the host
    #[arg(long)]
    pub model: Option<String>,

    /// Enable or disable code completions
    #[arg(long, value_name = "on|off", value_parser = parse_toggle)]
    pub code_completions: Option<bool>,

    /// Fill-in-the-middle prompt template
    #[arg(long)]
    pub fim_template: Option<FimTemplate>,

    /// API key sent as a bearer token
    #[arg(long, conflicts_with_all = ["prompt_api_key", "clear_api_key"])]
    pub api_key: Option<String>,

    /// Read the API key from the terminal without echo
    #[arg(long, conflicts_with = "clear_api_key")]
    pub prompt_api_key: bool,

    /// Remove the stored API key
    #[arg(long)]
    pub clear_api_key: bool,
}

fn parse_toggle(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_show() {
        let cli = Cli::parse_from(["ollama-panel", "show"]);
        assert!(matches!(cli.command, Command::Show));
        assert!(cli.log_level.is_none());
        assert!(cli.timeout.is_none());
        assert!(cli.keystore.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from([
            "ollama-panel",
            "--config-dir",
            "/tmp/panel",
            "--timeout",
            "10",
            "--keystore",
            "file",
            "models",
            "--host",
            "http://gpu:11434",
        ]);
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/panel")));
        assert_eq!(cli.timeout, Some(10));
        assert_eq!(cli.keystore, Some(KeyStoreBackend::EncryptedFile));
        match cli.command {
            Command::Models { host } => assert_eq!(host.as_deref(), Some("http://gpu:11434")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_set_args() {
        let cli = Cli::parse_from([
            "ollama-panel",
            "set",
            "--model",
            "mistral",
            "--code-completions",
            "on",
            "--fim-template",
            "starcoder",
            "--clear-api-key",
        ]);
        let Command::Set(args) = cli.command else {
            panic!("expected set");
        };
        assert_eq!(args.model.as_deref(), Some("mistral"));
        assert_eq!(args.code_completions, Some(true));
        assert_eq!(args.fim_template, Some(FimTemplate::Starcoder));
        assert!(args.clear_api_key);
        assert!(args.api_key.is_none());
    }

    #[test]
    fn test_api_key_conflicts_with_clear() {
        let result = Cli::try_parse_from([
            "ollama-panel",
            "set",
            "--api-key",
            "k",
            "--clear-api-key",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toggle() {
        assert_eq!(parse_toggle("ON"), Ok(true));
        assert_eq!(parse_toggle("off"), Ok(false));
        assert!(parse_toggle("maybe").is_err());
    }
}
