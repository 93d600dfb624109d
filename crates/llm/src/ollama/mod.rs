use crate::{streaming::HttpChunkStream, ApiError, ChunkStream, GenerateProvider};
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

mod stream;
mod types;

pub use stream::{OllamaStreamHandler, RecordParser};
pub use types::{GenerateRequest, ModelInfo, StatusRecord};
use types::TagsResponse;

pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn default_base_url() -> String {
        "http://localhost:11434".to_string()
    }

    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    /// Send a generate request and return the response once its headers
    /// arrived with a success status
    pub async fn generate(&self, request: &GenerateRequest) -> Result<HttpChunkStream, ApiError> {
        debug!(
            "Sending generate request to {} for model '{}'",
            self.base_url, request.model
        );

        let response = self
            .client
            .post(self.generate_url())
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let response = check_response_error(response).await?;
        Ok(HttpChunkStream::new(response))
    }

    /// Return the models known to the server
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        let response = self
            .client
            .get(self.tags_url())
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let response = check_response_error(response).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse model list: {e}")))?;

        debug!("Server lists {} models", tags.models.len());
        Ok(tags.models)
    }
}

#[async_trait]
impl GenerateProvider for OllamaClient {
    async fn open_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Box<dyn ChunkStream>, ApiError> {
        let stream = self.generate(request).await?;
        Ok(Box::new(stream))
    }
}

/// Turn a non-2xx response into `ApiError::Status`, keeping the body text
/// as detail
async fn check_response_error(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}
