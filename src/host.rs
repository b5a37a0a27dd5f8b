//! Terminal host for the settings controller
//!
//! Each subcommand opens a draft, edits it the way a settings panel would,
//! and prints the outcome. Notifications raised along the way go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use color_eyre::eyre::{bail, Result};
use ollama_panel::config::{prompt_password, ConfigManager, KeyStore, KeyStoreBackend};
use ollama_panel::notification::NotificationLog;
use ollama_panel::ollama::OllamaDirectory;
use ollama_panel::{DraftState, ModelListStatus, SettingsController};

use crate::cli::{Command, SetArgs};

const MASTER_PASSWORD_ENV: &str = "OLLAMA_PANEL_MASTER_PASSWORD";

pub struct Host {
    controller: SettingsController,
    notifications: NotificationLog,
}

impl Host {
    pub fn open(config: &ConfigManager) -> Result<Self> {
        config.write_default_configs()?;

        let keystore = open_keystore(config.keystore())?;
        let notifications = NotificationLog::new();
        let directory = Arc::new(OllamaDirectory::new(config.app_config().general.request_timeout()));
        let controller = SettingsController::new(
            config.settings_file(),
            keystore,
            directory,
            Arc::new(notifications.clone()),
        );

        Ok(Self {
            controller,
            notifications,
        })
    }

    pub async fn run(mut self, command: Command) -> Result<ExitCode> {
        let outcome = match command {
            Command::Show => self.show(),
            Command::Models { host } => self.models(host).await,
            Command::Set(args) => self.set(args).await,
            Command::Fim { prefix, suffix } => self.fim(&prefix, &suffix),
        };
        self.flush_notifications();
        outcome
    }

    fn show(&self) -> Result<ExitCode> {
        let draft = self.controller.load()?;
        println!("host:             {}", draft.host());
        println!("model:            {}", display_or_none(draft.model()));
        println!(
            "code completions: {}",
            if draft.code_completions_enabled() { "on" } else { "off" }
        );
        println!("fim template:     {}", draft.fim_template().label());
        println!(
            "api key:          {}",
            if draft.api_key().is_some() { "set" } else { "unset" }
        );
        let cached = draft.available_models();
        if !cached.is_empty() {
            println!("cached models:    {}", cached.join(", "));
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn models(&mut self, host: Option<String>) -> Result<ExitCode> {
        let mut draft = self.controller.load()?;
        if let Some(host) = host {
            draft.set_host(host);
        }

        self.controller.refresh_models(&mut draft).await?;
        print_model_list(&draft);

        Ok(if refresh_failed(draft.model_list()) {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    async fn set(&mut self, args: SetArgs) -> Result<ExitCode> {
        let mut draft = self.controller.load()?;

        if let Some(host) = args.host {
            draft.set_host(host);
        }
        if let Some(enabled) = args.code_completions {
            draft.set_code_completions_enabled(enabled);
        }
        if let Some(template) = args.fim_template {
            draft.set_fim_template(template);
        }
        if let Some(api_key) = args.api_key {
            draft.set_api_key(api_key);
        } else if args.prompt_api_key {
            draft.set_api_key(prompt_password("Ollama API key: ")?);
        } else if args.clear_api_key {
            draft.set_api_key("");
        }

        if let Some(model) = args.model {
            self.controller.refresh_models(&mut draft).await?;
            if let ModelListStatus::Error(message) = draft.model_list() {
                bail!("Cannot select '{}': {}", model, message);
            }
            if let Err(e) = draft.select_model(&model) {
                print_model_list(&draft);
                return Err(e.into());
            }
        }

        if !self.controller.is_modified(&draft)? {
            println!("No changes");
            return Ok(ExitCode::SUCCESS);
        }

        self.controller.apply(&draft)?;
        self.notifications.info("Ollama settings saved");
        Ok(ExitCode::SUCCESS)
    }

    fn fim(&self, prefix: &str, suffix: &str) -> Result<ExitCode> {
        let draft = self.controller.load()?;
        if !draft.code_completions_enabled() {
            tracing::warn!("Code completions are disabled; printing the prompt anyway");
        }
        println!("{}", draft.fim_template().build_prompt(prefix, suffix));
        Ok(ExitCode::SUCCESS)
    }

    fn flush_notifications(&self) {
        for notification in self.notifications.drain() {
            eprintln!("{} {}", notification.level.icon(), notification.message);
        }
    }
}

/// Unlock the encrypted file store, creating it on first use
fn open_keystore(mut keystore: KeyStore) -> Result<KeyStore> {
    if keystore.backend() != KeyStoreBackend::EncryptedFile || keystore.is_unlocked() {
        return Ok(keystore);
    }

    let password = match std::env::var(MASTER_PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ if keystore.is_initialized() => prompt_password("Master password: ")?,
        _ => {
            let password = prompt_password("New master password: ")?;
            let confirm = prompt_password("Confirm master password: ")?;
            if password != confirm {
                bail!("Passwords do not match");
            }
            password
        }
    };

    if keystore.is_initialized() {
        keystore.unlock(&password)?;
    } else {
        keystore.init_encrypted(&password)?;
    }
    Ok(keystore)
}

fn print_model_list(draft: &DraftState) {
    let status = draft.model_list();
    if let Some(placeholder) = status.placeholder() {
        match status {
            ModelListStatus::Error(message) => println!("{} ({})", placeholder, message),
            _ => println!("{}", placeholder),
        }
        return;
    }

    let selected = draft.effective_model();
    for model in status.models() {
        let marker = if model == selected { "*" } else { " " };
        println!("{} {}", marker, model);
    }
}

fn refresh_failed(status: &ModelListStatus) -> bool {
    matches!(status, ModelListStatus::Error(_))
}

fn display_or_none(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_or_none() {
        assert_eq!(display_or_none(""), "(none)");
        assert_eq!(display_or_none("llama3"), "llama3");
    }

    #[test]
    fn test_failed_refresh_exits_nonzero() {
        assert!(refresh_failed(&ModelListStatus::Error("x".to_string())));
        assert!(!refresh_failed(&ModelListStatus::Empty));
        assert!(!refresh_failed(&ModelListStatus::Loaded(vec!["a".to_string()])));
    }

    #[tokio::test]
    async fn test_set_saves_and_notifies() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = ConfigManager::with_dir(temp_dir.path());
        config.app_config_mut().keystore.backend = Some(KeyStoreBackend::EncryptedFile);
        config.write_default_configs().unwrap();
        let mut keystore = config.keystore();
        keystore.init_encrypted("pw").unwrap();

        let notifications = NotificationLog::new();
        let mut host = Host {
            controller: SettingsController::new(
                config.settings_file(),
                keystore,
                Arc::new(OllamaDirectory::default()),
                Arc::new(notifications.clone()),
            ),
            notifications: notifications.clone(),
        };

        let args = SetArgs {
            code_completions: Some(true),
            api_key: Some("secret".to_string()),
            ..SetArgs::default()
        };
        host.set(args).await.unwrap();

        let saved = host.controller.load().unwrap();
        assert!(saved.code_completions_enabled());
        assert_eq!(saved.api_key(), Some("secret"));
        let messages: Vec<String> = notifications.drain().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["Ollama settings saved".to_string()]);
    }
}
