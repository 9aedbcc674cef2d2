use crate::config::Config;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Three-way classification produced by the inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Normal,
    Murmur,
    Noisy,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Normal => "normal",
            Category::Murmur => "murmur",
            Category::Noisy => "noisy",
        }
    }
}

/// Decoded body of a successful `/predict` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    pub result: Category,
    #[serde(deserialize_with = "confidence_from_wire")]
    pub confidence: f64,
    #[serde(default)]
    pub suggestion: Option<String>,
}

/// The service reports confidence as a JSON number, but some deployments
/// quote it. Both are coerced to f64 here, once; a string that does not
/// parse as a float counts as a malformed body.
fn confidence_from_wire<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Number(f64),
        Text(String),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Number(n) => Ok(n),
        Wire::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid confidence {s:?}: {e}"))),
    }
}

/// Seam to the remote classifier so the upload pipeline can be driven
/// against a scripted backend in tests.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Submit one recording's bytes and return the decoded classification.
    async fn classify(&self, filename: &str, bytes: Vec<u8>) -> Result<Prediction>;
}

/// HTTP client for the real inference service.
pub struct HttpAnalyzer {
    client: reqwest::Client,
    predict_url: String,
}

impl HttpAnalyzer {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            predict_url: format!("{}/predict", config.service_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalyzer {
    async fn classify(&self, filename: &str, bytes: Vec<u8>) -> Result<Prediction> {
        tracing::info!("Submitting {} ({} bytes) for analysis", filename, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("audio/wav")
            .context("Failed to build multipart body")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.predict_url)
            .multipart(form)
            .send()
            .await
            .context("Analysis request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Analysis service returned {}", status);
        }

        let prediction: Prediction = response
            .json()
            .await
            .context("Failed to decode analysis response")?;

        tracing::info!(
            "Classified {} as {} ({:.2})",
            filename,
            prediction.result.as_str(),
            prediction.confidence
        );
        Ok(prediction)
    }
}
