use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::BaseSimilarityService;

/// HTTP client for the sentence-similarity model service.
pub struct SimilarityClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SimilarityRequest<'a> {
    sentence1: &'a str,
    sentence2: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimilarityResponse {
    similarity_score: f64,
}

impl SimilarityClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl BaseSimilarityService for SimilarityClient {
    async fn calculate_similarity(&self, sentence1: &str, sentence2: &str) -> Result<f64> {
        let url = format!("{}/calculate-similarity", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&SimilarityRequest {
                sentence1,
                sentence2,
            })
            .send()
            .await
            .context("similarity request failed")?
            .error_for_status()
            .context("similarity service returned an error status")?;

        let body: SimilarityResponse = response
            .json()
            .await
            .context("invalid similarity response body")?;

        Ok(body.similarity_score)
    }
}
