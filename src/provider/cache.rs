//! Provider resolution and the per-context client cache.

use super::{EdgequakeProvider, ModelProvider, OpenAiCompatProvider, DEFAULT_OPENAI_BASE_URL};
use crate::config::ImportConfig;
use crate::error::ImportError;
use edgequake_llm::ProviderFactory;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Which backend to build, with every input that distinguishes one client
/// from another. Doubles as the cache key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ProviderSpec {
    OpenAiCompat {
        base_url: String,
        api_key: Option<String>,
        model: String,
    },
    Edgequake {
        /// `None` lets `ProviderFactory::from_env` pick.
        name: Option<String>,
        model: String,
    },
}

impl std::fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderSpec::OpenAiCompat {
                base_url, model, ..
            } => f
                .debug_struct("OpenAiCompat")
                .field("base_url", base_url)
                .field("model", model)
                .finish_non_exhaustive(),
            ProviderSpec::Edgequake { name, model } => f
                .debug_struct("Edgequake")
                .field("name", name)
                .field("model", model)
                .finish(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn env_non_empty(key: &str) -> Option<String> {
    non_empty(std::env::var(key).ok().as_deref())
}

/// Decide which backend a config asks for, from most to least specific:
///
/// 1. **Named provider** (`provider_name`): `openai` / `openai-compatible`
///    use the REST client; any other name goes to `edgequake-llm`.
/// 2. **Explicit endpoint** (`base_url`) → REST client.
/// 3. **API key** (`api_key`, then `OPENAI_API_KEY`) → REST client against
///    the OpenAI endpoint.
/// 4. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 5. **Auto-detection** via `ProviderFactory::from_env`.
///
/// A pre-built `config.provider` bypasses resolution entirely and is
/// handled by [`ProviderCache::get_or_create`].
pub fn resolve_provider_spec(config: &ImportConfig) -> Result<ProviderSpec, ImportError> {
    let model = config.model.clone();
    let base_url = non_empty(config.base_url.as_deref());
    let api_key = non_empty(config.api_key.as_deref()).or_else(|| env_non_empty("OPENAI_API_KEY"));

    if let Some(name) = non_empty(config.provider_name.as_deref()) {
        return match name.to_ascii_lowercase().as_str() {
            "openai" => {
                if api_key.is_none() {
                    return Err(ImportError::ProviderNotConfigured {
                        provider: name,
                        hint: "Set OPENAI_API_KEY or pass --api-key.".to_string(),
                    });
                }
                Ok(ProviderSpec::OpenAiCompat {
                    base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                    api_key,
                    model,
                })
            }
            "openai-compatible" | "openai_compatible" | "custom" => match base_url {
                Some(base_url) => Ok(ProviderSpec::OpenAiCompat {
                    base_url,
                    api_key,
                    model,
                }),
                None => Err(ImportError::ProviderNotConfigured {
                    provider: name,
                    hint: "An OpenAI-compatible provider needs --base-url.".to_string(),
                }),
            },
            _ => Ok(ProviderSpec::Edgequake {
                name: Some(name),
                model,
            }),
        };
    }

    if let Some(base_url) = base_url {
        return Ok(ProviderSpec::OpenAiCompat {
            base_url,
            api_key,
            model,
        });
    }

    if api_key.is_some() {
        return Ok(ProviderSpec::OpenAiCompat {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key,
            model,
        });
    }

    if let (Some(name), Some(env_model)) = (
        env_non_empty("EDGEQUAKE_LLM_PROVIDER"),
        env_non_empty("EDGEQUAKE_MODEL"),
    ) {
        return Ok(ProviderSpec::Edgequake {
            name: Some(name),
            model: env_model,
        });
    }

    Ok(ProviderSpec::Edgequake { name: None, model })
}

fn build_provider(
    spec: &ProviderSpec,
    api_timeout: Duration,
) -> Result<Arc<dyn ModelProvider>, ImportError> {
    match spec {
        ProviderSpec::OpenAiCompat {
            base_url, api_key, ..
        } => {
            let http = Client::builder()
                .timeout(api_timeout)
                .build()
                .map_err(|e| ImportError::Internal(format!("failed to build API client: {e}")))?;
            Ok(Arc::new(OpenAiCompatProvider::new(
                http,
                base_url.clone(),
                api_key.clone(),
            )))
        }
        ProviderSpec::Edgequake {
            name: Some(name),
            model,
        } => {
            let llm = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
                ImportError::ProviderNotConfigured {
                    provider: name.clone(),
                    hint: format!("{e}"),
                }
            })?;
            Ok(Arc::new(EdgequakeProvider::new(name.clone(), llm)))
        }
        ProviderSpec::Edgequake { name: None, .. } => {
            let (llm, _embedding) =
                ProviderFactory::from_env().map_err(|e| ImportError::ProviderNotConfigured {
                    provider: "auto".to_string(),
                    hint: format!(
                        "No LLM provider could be auto-detected from environment.\n\
                        Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                        Error: {e}"
                    ),
                })?;
            Ok(Arc::new(EdgequakeProvider::new("auto", llm)))
        }
    }
}

/// Memoised provider clients, one per [`ProviderSpec`].
///
/// Holds no request state. Call [`ProviderCache::invalidate`] after
/// credentials change.
#[derive(Default)]
pub struct ProviderCache {
    entries: Mutex<HashMap<ProviderSpec, Arc<dyn ModelProvider>>>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider for `config`, building it on first use.
    pub fn get_or_create(&self, config: &ImportConfig) -> Result<Arc<dyn ModelProvider>, ImportError> {
        if let Some(provider) = &config.provider {
            return Ok(Arc::clone(provider));
        }

        let spec = resolve_provider_spec(config)?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(provider) = entries.get(&spec) {
            debug!(?spec, "reusing cached provider");
            return Ok(Arc::clone(provider));
        }

        let provider = build_provider(&spec, Duration::from_secs(config.api_timeout_secs))?;
        info!(provider = provider.name(), model = %config.model, "LLM provider ready");
        entries.insert(spec, Arc::clone(&provider));
        Ok(provider)
    }

    /// Drop every cached client.
    pub fn invalidate(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ProviderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, key: &str) -> ImportConfig {
        ImportConfig {
            provider_name: Some("openai-compatible".into()),
            base_url: Some(base_url.into()),
            api_key: Some(key.into()),
            ..ImportConfig::default()
        }
    }

    #[test]
    fn named_compat_provider_needs_base_url() {
        let cfg = ImportConfig {
            provider_name: Some("openai-compatible".into()),
            ..ImportConfig::default()
        };
        let err = resolve_provider_spec(&cfg).unwrap_err();
        assert!(matches!(err, ImportError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn other_names_route_to_edgequake() {
        let cfg = ImportConfig {
            provider_name: Some("anthropic".into()),
            model: "claude-sonnet-4".into(),
            ..ImportConfig::default()
        };
        assert_eq!(
            resolve_provider_spec(&cfg).unwrap(),
            ProviderSpec::Edgequake {
                name: Some("anthropic".into()),
                model: "claude-sonnet-4".into()
            }
        );
    }

    #[test]
    fn base_url_alone_selects_rest_client() {
        let cfg = ImportConfig {
            base_url: Some("http://localhost:11434/v1".into()),
            api_key: Some("k".into()),
            ..ImportConfig::default()
        };
        assert!(matches!(
            resolve_provider_spec(&cfg).unwrap(),
            ProviderSpec::OpenAiCompat { .. }
        ));
    }

    #[test]
    fn cache_reuses_and_invalidates() {
        let cache = ProviderCache::new();
        let a = cache.get_or_create(&config("http://localhost:1/v1", "k1")).unwrap();
        let b = cache.get_or_create(&config("http://localhost:1/v1", "k1")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        cache.get_or_create(&config("http://localhost:1/v1", "k2")).unwrap();
        assert_eq!(cache.len(), 2);

        cache.invalidate();
        assert!(cache.is_empty());
        let c = cache.get_or_create(&config("http://localhost:1/v1", "k1")).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn spec_debug_hides_key() {
        let spec = resolve_provider_spec(&config("http://x/v1", "sk-secret")).unwrap();
        assert!(!format!("{spec:?}").contains("sk-secret"));
    }
}
