//! Common utilities for the Metal API client
//!
//! Provides the authenticated request plumbing shared by every endpoint.

use crate::error::MetalError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Header carrying the static API token
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// HTTP client wrapper with authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTH_HEADER, &self.token)
            .header("Accept", "application/json")
    }

    /// Make a GET request
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, MetalError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(MetalError::Http)?;

        decode(check_status("GET", path, response).await?).await
    }

    /// Make a POST request, with or without a JSON body
    pub async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, MetalError> {
        let url = self.build_url(path);
        let mut request = self.authorize(self.client.post(&url));
        match body {
            Some(body) => {
                debug!(
                    "POST {} with body: {}",
                    url,
                    serde_json::to_string(body).unwrap_or_default()
                );
                request = request.json(body);
            }
            None => debug!("POST {}", url),
        }

        let response = request.send().await.map_err(MetalError::Http)?;

        decode(check_status("POST", path, response).await?).await
    }

    /// Make a DELETE request that returns the updated resource
    pub async fn delete<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, MetalError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .map_err(MetalError::Http)?;

        decode(check_status("DELETE", path, response).await?).await
    }
}

/// Map non-2xx responses onto the error taxonomy
async fn check_status(verb: &str, path: &str, response: Response) -> Result<Response, MetalError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = format!("{} {} failed: {} - {}", verb, path, status, api_errors(&body));
    Err(match status {
        StatusCode::UNAUTHORIZED => MetalError::Authentication(detail),
        StatusCode::FORBIDDEN => MetalError::Forbidden(detail),
        StatusCode::NOT_FOUND => MetalError::NotFound(detail),
        _ => MetalError::Api(detail),
    })
}

async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, MetalError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        MetalError::Api(format!(
            "error decoding response body: {} - Response (first 500 chars): {}",
            e,
            text.chars().take(500).collect::<String>()
        ))
    })
}

/// The API reports failures as `{"errors": ["..."]}`; fall back to the raw body
fn api_errors(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        errors: Vec<String>,
        #[serde(default)]
        error: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join(", "),
        Ok(ErrorBody { error: Some(error), .. }) => error,
        _ => body.to_string(),
    }
}
