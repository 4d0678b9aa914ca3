use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;

/// The submitted data a refinement is tailored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuidanceRequest {
    pub age: i32,
    pub screen_minutes: i32,
    pub evening_usage: bool,
}

impl GuidanceRequest {
    pub fn prompt(&self) -> String {
        format!(
            "Give gentle, non-judgmental parenting guidance for a {}-year-old child who had {} \
             minutes of screen time today. Evening screen usage: {}. \
             Tone: calm, reassuring, brief (3-4 sentences).",
            self.age, self.screen_minutes, self.evening_usage
        )
    }
}

/// A language model that turns a submission into tailored guidance text.
#[async_trait]
pub trait GuidanceModel: Send + Sync {
    /// Returns non-empty guidance text or an error.
    async fn refine(&self, request: &GuidanceRequest) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}

/// Client for the OpenAI Responses API.
pub struct OpenAiGuidanceModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGuidanceModel {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.ai_timeout())
            .build()?;

        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.clone(),
        })
    }
}

#[async_trait]
impl GuidanceModel for OpenAiGuidanceModel {
    async fn refine(&self, request: &GuidanceRequest) -> anyhow::Result<String> {
        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": request.prompt(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {}: {}", status, body);
        }

        let body: Value = response.json().await?;
        extract_output_text(&body)
            .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no output text"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Pulls the generated text out of a Responses API payload.
///
/// Prefers the flattened `output_text` field when present, otherwise joins
/// every `output_text` content part of every output message.
fn extract_output_text(body: &Value) -> Option<String> {
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        let text = text.trim();
        return (!text.is_empty()).then(|| text.to_string());
    }

    let text: String = body
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
