use crate::ProviderError;
use secrecy::SecretString;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub base_url: String,
    pub token: SecretString,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Reads configuration values through `get` so tests never touch the
    /// process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, ProviderError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let token = get("HEALTH_PROVIDER_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::Config("HEALTH_PROVIDER_TOKEN missing".into()))?;
        let base_url = get("HEALTH_PROVIDER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        Ok(Self {
            base_url,
            token: SecretString::new(token.into()),
        })
    }
}
