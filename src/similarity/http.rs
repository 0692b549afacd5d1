use super::{SimilarityOracle, clamp_score};
use crate::error::SimilarityError;
use async_trait::async_trait;
use std::time::Duration;

/// Oracle backed by an external similarity service
///
/// Calls `GET {url}?a=<token>&b=<token>`. The body is either a bare float or a
/// JSON object with a `similarity` field.
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpOracle {
    pub fn new(url: &str, timeout_ms: u64) -> Result<Self, SimilarityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| SimilarityError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SimilarityOracle for HttpOracle {
    async fn similarity(&self, a: &str, b: &str) -> Result<f32, SimilarityError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("a", a), ("b", b)])
            .send()
            .await
            .map_err(|e| SimilarityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SimilarityError::Unavailable(format!(
                "similarity service returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SimilarityError::InvalidResponse(e.to_string()))?;

        clamp_score(parse_score(&body)?)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Parse a similarity response body
fn parse_score(body: &str) -> Result<f32, SimilarityError> {
    let trimmed = body.trim();
    if let Ok(score) = trimmed.parse::<f32>() {
        return Ok(score);
    }

    let json: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|_| SimilarityError::InvalidResponse(format!("unexpected body: {}", trimmed)))?;

    json.as_f64()
        .or_else(|| json.get("similarity").and_then(|v| v.as_f64()))
        .map(|v| v as f32)
        .ok_or_else(|| SimilarityError::InvalidResponse(format!("missing similarity: {}", trimmed)))
}
