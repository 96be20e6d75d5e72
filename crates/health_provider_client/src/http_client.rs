//! HTTP adapter for a local health-data gateway.
//!
//! This module provides a reqwest-based implementation of the [`HealthProvider`](crate::HealthProvider) trait.
//! Gateway payloads use snake_case field names throughout.

use crate::config::ProviderConfig;
use crate::{
    BodyCompositionRecord, ExerciseRecord, HealthProvider, PermissionSet, ProviderError,
    ReadRequest,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const SINCE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Serialize, Deserialize)]
struct PermissionsBody {
    permissions: PermissionSet,
}

#[derive(Deserialize)]
struct DataBody<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Gateway client using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestHealthProvider {
    base_url: String,
    token: SecretString,
    client: reqwest::Client,
}

impl ReqwestHealthProvider {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - Gateway root (e.g., "http://127.0.0.1:8787")
    /// * `token` - Bearer token issued by the gateway
    pub fn new(base_url: &str, token: SecretString) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(&config.base_url, config.token.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .bearer_auth(self.token.expose_secret())
    }

    fn post_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(self.token.expose_secret())
    }

    /// Execute a request and expect a JSON response.
    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp).await);
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    /// Extract error information from a failed response.
    async fn error_from_response(resp: reqwest::Response) -> ProviderError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        ProviderError::from_status(status, body_snippet)
    }

    async fn permissions(
        &self,
        path: &str,
        scopes: &PermissionSet,
    ) -> Result<PermissionSet, ProviderError> {
        let body = PermissionsBody {
            permissions: scopes.clone(),
        };
        let resp: PermissionsBody = self
            .execute_json(self.post_request(path).json(&body))
            .await?;
        Ok(resp.permissions)
    }

    async fn read<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        request: &ReadRequest,
    ) -> Result<Vec<T>, ProviderError> {
        let since = request.window.since.format(SINCE_FORMAT).to_string();
        let req = self
            .get_request(path)
            .query(&[("since", since.as_str()), ("ordering", request.ordering.as_query())]);
        let body: DataBody<T> = self.execute_json(req).await?;
        tracing::debug!(path, records = body.data.len(), "gateway read complete");
        Ok(body.data)
    }
}

#[async_trait]
impl HealthProvider for ReqwestHealthProvider {
    async fn connect(&self) -> Result<(), ProviderError> {
        let resp = self
            .get_request("/v1/status")
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(ProviderError::Unavailable(format!(
                "gateway status endpoint answered {status}"
            )));
        }
        Ok(())
    }

    async fn get_granted_permissions(
        &self,
        scopes: &PermissionSet,
    ) -> Result<PermissionSet, ProviderError> {
        self.permissions("/v1/permissions/granted", scopes).await
    }

    async fn request_permissions(
        &self,
        scopes: &PermissionSet,
    ) -> Result<PermissionSet, ProviderError> {
        self.permissions("/v1/permissions/request", scopes).await
    }

    async fn read_body_composition(
        &self,
        request: &ReadRequest,
    ) -> Result<Vec<BodyCompositionRecord>, ProviderError> {
        self.read("/v1/data/body-composition", request).await
    }

    async fn read_exercise(
        &self,
        request: &ReadRequest,
    ) -> Result<Vec<ExerciseRecord>, ProviderError> {
        self.read("/v1/data/exercise", request).await
    }
}
