//! SettingsController - mediates between a draft and persisted settings
//!
//! Owns the collaborators (settings record, credential store, model
//! directory, notification sink) and drives the model refresh workflow.
//! All draft mutation happens on the caller's thread; only the HTTP fetch
//! runs on the async runtime.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::draft::{DraftState, ModelListStatus};
use super::refresh::{PendingRefresh, RefreshResult};
use crate::config::{CredentialKey, PersistentSettings, SecretStore, SecretString};
use crate::error::{Result, SettingsError};
use crate::notification::{NotificationLevel, NotificationSink};
use crate::ollama::ModelDirectory;

const API_KEY: CredentialKey = CredentialKey::OllamaApiKey;

pub struct SettingsController {
    settings: Box<dyn PersistentSettings>,
    secrets: Box<dyn SecretStore>,
    directory: Arc<dyn ModelDirectory>,
    notifier: Arc<dyn NotificationSink>,
    /// Runtime for fetches started outside of an async context
    runtime: Option<Handle>,
}

impl SettingsController {
    pub fn new(
        settings: impl PersistentSettings + 'static,
        secrets: impl SecretStore + 'static,
        directory: Arc<dyn ModelDirectory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            settings: Box::new(settings),
            secrets: Box::new(secrets),
            directory,
            notifier,
            runtime: None,
        }
    }

    /// Run fetches on this runtime instead of the ambient one
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build a fresh draft from persisted values
    pub fn load(&self) -> Result<DraftState> {
        let settings = self.settings.get()?;
        let api_key = self.secrets.get(&API_KEY)?;
        Ok(DraftState::from_persisted(settings, api_key))
    }

    /// Discard unsaved edits; the model list is left as it is
    pub fn reset(&self, draft: &mut DraftState) -> Result<()> {
        let settings = self.settings.get()?;
        let api_key = self.secrets.get(&API_KEY)?;

        draft.host = settings.host;
        draft.model = settings.model;
        draft.code_completions_enabled = settings.code_completions_enabled;
        draft.fim_template = settings.fim_template;
        draft.available_models = settings.available_models;
        draft.api_key = SecretString::new(api_key.unwrap_or_default());
        Ok(())
    }

    pub fn is_modified(&self, draft: &DraftState) -> Result<bool> {
        let settings = self.settings.get()?;
        let stored_key = self.secrets.get(&API_KEY)?;

        Ok(draft.host != settings.host
            || draft.model != settings.model
            || draft.code_completions_enabled != settings.code_completions_enabled
            || draft.fim_template != settings.fim_template
            || draft.api_key() != stored_key.as_deref())
    }

    /// Persist the draft; an empty API key removes the stored credential
    pub fn apply(&mut self, draft: &DraftState) -> Result<()> {
        let mut settings = self.settings.get()?;
        settings.host = draft.host.clone();
        settings.model = draft.model.clone();
        settings.code_completions_enabled = draft.code_completions_enabled;
        settings.fim_template = draft.fim_template;
        self.settings.set(settings)?;

        self.secrets.set(&API_KEY, draft.api_key())?;
        tracing::info!("Applied Ollama settings for {}", draft.host);
        Ok(())
    }

    /// Selected model if the picker is enabled and holds it, else empty
    pub fn effective_model<'a>(&self, draft: &'a DraftState) -> &'a str {
        draft.effective_model()
    }

    /// Start fetching the model list for the draft's host
    ///
    /// Fails with [`SettingsError::RefreshInProgress`] while a previous fetch
    /// for this draft is still pending. A dropped [`PendingRefresh`] no longer
    /// counts as pending.
    pub fn begin_refresh(&self, draft: &mut DraftState) -> Result<PendingRefresh> {
        if draft.is_refreshing() {
            return Err(SettingsError::RefreshInProgress);
        }

        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|e| {
                SettingsError::Runtime(format!("No async runtime for model refresh: {}", e))
            })?,
        };

        let in_flight = draft.start_loading();

        let host = draft.host.clone();
        let api_key = draft.api_key().map(SecretString::new);
        let directory = Arc::clone(&self.directory);
        let (tx, rx) = oneshot::channel();

        tracing::info!("Refreshing models from {}", host);
        let task_host = host.clone();
        runtime.spawn(async move {
            let outcome = directory
                .list_models(&task_host, api_key.as_ref().map(SecretString::expose))
                .await;
            // Receiver gone means the panel was closed
            let _ = tx.send(outcome);
        });

        Ok(PendingRefresh::new(host, rx, in_flight))
    }

    /// Apply a finished fetch to the draft
    ///
    /// Fetch failures end up in the draft and the notification sink; only a
    /// failure to persist the model cache is returned.
    pub fn complete_refresh(&mut self, draft: &mut DraftState, result: RefreshResult) -> Result<()> {
        if result.host != draft.host {
            tracing::debug!(
                "Model list for {} arrived after host changed to {}",
                result.host,
                draft.host
            );
        }

        let models = match result.outcome {
            Ok(models) => models,
            Err(e) => {
                let message = e.user_message().to_string();
                tracing::error!("Failed to load models from {}: {}", result.host, e);
                self.notifier.show(&message, NotificationLevel::Error);
                draft.finish_loading(ModelListStatus::Error(message));
                return Ok(());
            }
        };

        tracing::info!("Loaded {} models from {}", models.len(), result.host);
        draft.available_models = models.clone();
        if models.is_empty() {
            draft.finish_loading(ModelListStatus::Empty);
        } else {
            if !models.contains(&draft.model) {
                draft.model.clear();
            }
            draft.finish_loading(ModelListStatus::Loaded(models.clone()));
        }

        let mut settings = self.settings.get()?;
        settings.available_models = models;
        self.settings.set(settings)
    }

    /// Fetch the model list and apply it to the draft
    pub async fn refresh_models(&mut self, draft: &mut DraftState) -> Result<()> {
        let pending = self.begin_refresh(draft)?;
        let result = pending.wait().await;
        self.complete_refresh(draft, result)
    }
}
