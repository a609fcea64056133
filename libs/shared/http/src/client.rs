use reqwest::{multipart::Form, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::ApiError;

/// Thin JSON client for the NextOpinion backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        if config.api_base_url.is_empty() {
            return Err(ApiError::NotConfigured("api_base_url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::NotConfigured(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn builder(&self, method: Method, path: &str, auth_token: Option<&str>) -> RequestBuilder {
        let url = self.url(path);
        debug!("Making {} request to {}", method, url);

        let req = self.client.request(method, &url);
        match auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let mut req = self.builder(method, path, auth_token);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        self.send_json(req).await
    }

    pub async fn get_with_query<T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth_token: Option<&str>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let req = self.builder(Method::GET, path, auth_token).query(query);
        self.send_json(req).await
    }

    pub async fn upload_multipart<T>(
        &self,
        path: &str,
        form: Form,
        auth_token: Option<&str>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let req = self.builder(Method::POST, path, auth_token).multipart(form);
        self.send_json(req).await
    }

    pub async fn download(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth_token: Option<&str>,
    ) -> Result<Vec<u8>, ApiError> {
        let req = self.builder(Method::GET, path, auth_token).query(query);
        let response = req.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.map_err(transport_error)?;
            error!("API error ({}): {}", status, error_text);
            return Err(ApiError::from_status(status.as_u16(), &error_text));
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        debug!("Downloaded {} bytes from {}", bytes.len(), path);
        Ok(bytes.to_vec())
    }

    async fn send_json<T>(&self, req: RequestBuilder) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = req.send().await.map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            error!("API error ({}): {}", status, text);
            return Err(ApiError::from_status(status.as_u16(), &text));
        }

        serde_json::from_str::<T>(&text).map_err(|e| {
            error!("Failed to decode response body: {}", e);
            ApiError::Decode(e.to_string())
        })
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}
