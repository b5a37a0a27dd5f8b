use std::sync::{Arc, Weak};

use crate::config::{FimTemplate, OllamaSettings, SecretString};
use crate::error::{Result, SettingsError};

/// Shown while `Loading` is left behind by a refresh nobody will complete
static ABANDONED: ModelListStatus = ModelListStatus::Disabled;

/// Availability of the model picker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelListStatus {
    /// Nothing fetched for the current host
    #[default]
    Disabled,
    /// A fetch is in flight
    Loading,
    Loaded(Vec<String>),
    /// The server answered with no models
    Empty,
    /// The last fetch failed; carries the message shown to the user
    Error(String),
}

impl ModelListStatus {
    /// Text the picker shows instead of model names
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            ModelListStatus::Disabled => Some("Hit refresh to see models for this host"),
            ModelListStatus::Loading => Some("Loading"),
            ModelListStatus::Loaded(_) => None,
            ModelListStatus::Empty => Some("No models"),
            ModelListStatus::Error(_) => Some("Unable to load models"),
        }
    }

    pub fn is_selectable(&self) -> bool {
        matches!(self, ModelListStatus::Loaded(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ModelListStatus::Loading)
    }

    pub fn models(&self) -> &[String] {
        match self {
            ModelListStatus::Loaded(models) => models,
            _ => &[],
        }
    }
}

/// Unsaved state of an open settings panel
#[derive(Debug, Clone)]
pub struct DraftState {
    pub(super) host: String,
    pub(super) model: String,
    pub(super) code_completions_enabled: bool,
    pub(super) fim_template: FimTemplate,
    pub(super) available_models: Vec<String>,
    pub(super) api_key: SecretString,
    pub(super) model_list: ModelListStatus,
    /// Held strongly by the pending refresh until its result is applied
    pub(super) in_flight: Option<Weak<()>>,
}

// The in-flight marker is bookkeeping, not part of the draft's value
impl PartialEq for DraftState {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.model == other.model
            && self.code_completions_enabled == other.code_completions_enabled
            && self.fim_template == other.fim_template
            && self.available_models == other.available_models
            && self.api_key == other.api_key
            && self.model_list() == other.model_list()
    }
}

impl Eq for DraftState {}

impl DraftState {
    pub(super) fn from_persisted(settings: OllamaSettings, api_key: Option<String>) -> Self {
        Self {
            host: settings.host,
            model: settings.model,
            code_completions_enabled: settings.code_completions_enabled,
            fim_template: settings.fim_template,
            available_models: settings.available_models,
            api_key: SecretString::new(api_key.unwrap_or_default()),
            model_list: ModelListStatus::Disabled,
            in_flight: None,
        }
    }

    /// Mark a refresh as started; the returned token keeps it alive
    pub(super) fn start_loading(&mut self) -> Arc<()> {
        let token = Arc::new(());
        self.in_flight = Some(Arc::downgrade(&token));
        self.model_list = ModelListStatus::Loading;
        token
    }

    pub(super) fn finish_loading(&mut self, status: ModelListStatus) {
        self.in_flight = None;
        self.model_list = status;
    }

    /// `Loading` whose pending refresh was dropped before completing
    fn refresh_abandoned(&self) -> bool {
        self.model_list.is_loading()
            && self
                .in_flight
                .as_ref()
                .map_or(true, |token| token.strong_count() == 0)
    }

    /// A refresh is running and its result can still be applied
    pub(super) fn is_refreshing(&self) -> bool {
        self.model_list.is_loading() && !self.refresh_abandoned()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Edit the host; a new value invalidates the fetched model list
    pub fn set_host(&mut self, host: impl Into<String>) {
        let host = host.into();
        if host == self.host {
            return;
        }
        self.host = host;
        self.model.clear();
        self.model_list = ModelListStatus::Disabled;
    }

    /// Selected model as held by the picker, regardless of its state
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Selected model if the picker is enabled and holds it, else empty
    pub fn effective_model(&self) -> &str {
        match &self.model_list {
            ModelListStatus::Loaded(models) if models.contains(&self.model) => &self.model,
            _ => "",
        }
    }

    /// Pick a model from the loaded list
    pub fn select_model(&mut self, model: &str) -> Result<()> {
        if !self.model_list.models().iter().any(|m| m == model) {
            return Err(SettingsError::ModelNotAvailable(model.to_string()));
        }
        self.model = model.to_string();
        Ok(())
    }

    pub fn code_completions_enabled(&self) -> bool {
        self.code_completions_enabled
    }

    pub fn set_code_completions_enabled(&mut self, enabled: bool) {
        self.code_completions_enabled = enabled;
    }

    pub fn fim_template(&self) -> FimTemplate {
        self.fim_template
    }

    pub fn set_fim_template(&mut self, template: FimTemplate) {
        self.fim_template = template;
    }

    /// Last model list reported by the server
    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    /// API key, `None` when the field is empty
    pub fn api_key(&self) -> Option<&str> {
        Some(self.api_key.expose()).filter(|k| !k.is_empty())
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = SecretString::new(api_key);
    }

    pub fn model_list(&self) -> &ModelListStatus {
        if self.refresh_abandoned() {
            return &ABANDONED;
        }
        &self.model_list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_draft(models: &[&str]) -> DraftState {
        let mut draft = DraftState::from_persisted(OllamaSettings::default(), None);
        draft.model_list = ModelListStatus::Loaded(models.iter().map(|m| m.to_string()).collect());
        draft
    }

    #[test]
    fn test_from_persisted_starts_disabled() {
        let settings = OllamaSettings {
            model: "llama3".to_string(),
            ..OllamaSettings::default()
        };
        let draft = DraftState::from_persisted(settings, Some("key".to_string()));
        assert_eq!(draft.model_list(), &ModelListStatus::Disabled);
        assert_eq!(draft.model(), "llama3");
        assert_eq!(draft.effective_model(), "");
        assert_eq!(draft.api_key(), Some("key"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            ModelListStatus::Disabled.placeholder(),
            Some("Hit refresh to see models for this host")
        );
        assert_eq!(ModelListStatus::Loading.placeholder(), Some("Loading"));
        assert_eq!(ModelListStatus::Empty.placeholder(), Some("No models"));
        assert_eq!(
            ModelListStatus::Error("x".to_string()).placeholder(),
            Some("Unable to load models")
        );
        assert_eq!(ModelListStatus::Loaded(vec![]).placeholder(), None);
    }

    #[test]
    fn test_only_loaded_is_selectable() {
        assert!(ModelListStatus::Loaded(vec!["a".to_string()]).is_selectable());
        assert!(!ModelListStatus::Disabled.is_selectable());
        assert!(!ModelListStatus::Loading.is_selectable());
        assert!(!ModelListStatus::Empty.is_selectable());
        assert!(!ModelListStatus::Error(String::new()).is_selectable());
    }

    #[test]
    fn test_host_edit_disables_list_and_clears_model() {
        let mut draft = loaded_draft(&["a", "b"]);
        draft.select_model("b").unwrap();
        assert_eq!(draft.effective_model(), "b");

        draft.set_host("http://other:11434");

        assert_eq!(draft.model_list(), &ModelListStatus::Disabled);
        assert_eq!(draft.model(), "");
        assert_eq!(draft.effective_model(), "");
    }

    #[test]
    fn test_setting_same_host_keeps_list() {
        let mut draft = loaded_draft(&["a"]);
        draft.select_model("a").unwrap();
        let host = draft.host().to_string();

        draft.set_host(host);

        assert!(draft.model_list().is_selectable());
        assert_eq!(draft.effective_model(), "a");
    }

    #[test]
    fn test_select_model_outside_list_fails() {
        let mut draft = loaded_draft(&["a"]);
        let err = draft.select_model("zzz").unwrap_err();
        assert!(matches!(err, SettingsError::ModelNotAvailable(m) if m == "zzz"));
        assert_eq!(draft.model(), "");

        let mut disabled = DraftState::from_persisted(OllamaSettings::default(), None);
        assert!(disabled.select_model("a").is_err());
    }

    #[test]
    fn test_empty_api_key_reads_as_none() {
        let mut draft = DraftState::from_persisted(OllamaSettings::default(), None);
        assert_eq!(draft.api_key(), None);
        draft.set_api_key("secret");
        assert_eq!(draft.api_key(), Some("secret"));
        draft.set_api_key("");
        assert_eq!(draft.api_key(), None);
    }

    #[test]
    fn test_loading_without_live_token_reads_as_disabled() {
        let mut draft = DraftState::from_persisted(OllamaSettings::default(), None);
        let token = draft.start_loading();
        assert!(draft.is_refreshing());
        assert_eq!(draft.model_list(), &ModelListStatus::Loading);

        drop(token);
        assert!(!draft.is_refreshing());
        assert_eq!(draft.model_list(), &ModelListStatus::Disabled);

        let token = draft.start_loading();
        draft.finish_loading(ModelListStatus::Empty);
        drop(token);
        assert_eq!(draft.model_list(), &ModelListStatus::Empty);
    }

    #[test]
    fn test_debug_hides_api_key() {
        let draft = DraftState::from_persisted(OllamaSettings::default(), Some("sk-123".to_string()));
        assert!(!format!("{:?}", draft).contains("sk-123"));
    }
}
