use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::errors::{ClickSightError, ClickSightResult};
use crate::grounding::openai_compatible::OpenAiCompatibleGrounder;
use crate::grounding::provider::GroundingModel;
use crate::grounding::types::CallConfig;

/// Registry of configured grounding models, keyed by their config.toml identifier.
pub struct GrounderRegistry {
    providers: HashMap<String, Arc<dyn GroundingModel>>,
    active: String,
}

impl GrounderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn GroundingModel>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> ClickSightResult<Arc<dyn GroundingModel>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            ClickSightError::Model(format!(
                "active grounding provider '{}' is not configured",
                self.active
            ))
        })
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a registry from the `[model]` config section.
    /// API keys are read from environment variables named `CLICKSIGHT_<ID>_API_KEY`.
    pub fn from_config(config: &ModelConfig) -> Self {
        let mut registry = Self::new(config.active_provider.clone());
        for (id, entry) in &config.providers {
            let api_key = std::env::var(format!("CLICKSIGHT_{}_API_KEY", id.to_uppercase()))
                .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
            let call = CallConfig {
                model: entry.model.clone(),
                temperature: entry.temperature,
                max_tokens: entry.max_tokens,
                stream: entry.stream,
            };
            tracing::debug!(
                provider = %id,
                display_name = %entry.display_name,
                model = %entry.model,
                stream = entry.stream,
                "registering grounding provider"
            );
            registry.register(Arc::new(OpenAiCompatibleGrounder::new(
                id.clone(),
                entry.api_base.clone(),
                api_key,
                call,
            )));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderEntry;

    fn entry() -> ProviderEntry {
        ProviderEntry {
            display_name: "ShowUI".into(),
            api_base: "http://localhost:8000/v1/chat/completions".into(),
            model: "showlab/ShowUI-2B".into(),
            temperature: 0.1,
            max_tokens: 128,
            stream: false,
            api_key: None,
        }
    }

    #[test]
    fn active_provider_is_resolved() {
        let mut cfg = ModelConfig {
            active_provider: "showui".into(),
            ..ModelConfig::default()
        };
        cfg.providers.insert("showui".into(), entry());
        cfg.providers.insert("backup".into(), entry());
        let registry = GrounderRegistry::from_config(&cfg);
        assert_eq!(registry.list_names(), vec!["backup", "showui"]);
        assert_eq!(registry.get_active().unwrap().name(), "showui");
    }

    #[test]
    fn missing_active_provider_is_a_model_error() {
        let registry = GrounderRegistry::from_config(&ModelConfig::default());
        assert_eq!(registry.get_active().err().unwrap().kind(), "model");
    }
}
