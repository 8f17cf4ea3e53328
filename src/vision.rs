//! Vision model client.
//!
//! Sends a normalised JPEG to an OpenAI-compatible chat completions endpoint
//! and turns the model's JSON answer into a [`VehicleAssessment`].

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::VehicleAssessment;

// ── Prompts ──────────────────────────────────────────────────────────────────

const SYSTEM_PROMPT: &str = r#"You are an expert automotive insurance adjuster with extensive vehicle identification experience. Analyze this car image carefully.

VEHICLE IDENTIFICATION PRIORITY: Look for these visual clues to identify make/model/color:
- Brand badges, emblems, or logos (on grille, steering wheel, trunk, doors)
- Distinctive headlight shapes and grille designs
- Body panel lines, door handle styles, mirror designs
- Wheel rim patterns and tire sizes
- Model-specific design features
- Paint color and finish type

Return ONLY valid JSON in this exact format:
{
  "make": "Vehicle manufacturer (look for badges/logos before saying Unknown)",
  "model": "Specific model name (identify from body design features)",
  "color": "Actual visible paint color (describe what you see)",
  "damage_summary": "Professional description of all visible damage",
  "repair_cost_estimate": "USD cost range based on damage severity and parts needed"
}

IMPORTANT: Only use "Unknown" for make/model/color if genuinely not identifiable. Most vehicles have visible identifying features - examine carefully before concluding Unknown. Base repair estimates on actual visible damage considering paint work, panel replacement, and labor costs."#;

const USER_PROMPT: &str = "Analyze this vehicle image. First identify the make, model, and color by carefully examining badges, logos, design features, and paint. Then assess any damage. Provide your complete assessment in the required JSON format.";

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.1;

static FENCED_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("{0}")]
    Request(String),
    #[error("model API returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Empty response from model")]
    EmptyResponse,
    #[error("{0}")]
    Parse(String),
}

// ── Analyzer seam ────────────────────────────────────────────────────────────

#[async_trait]
pub trait DamageAnalyzer: Send + Sync {
    /// Assess a base64-encoded JPEG.
    async fn analyze(&self, jpeg_base64: &str) -> Result<VehicleAssessment, VisionError>;
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ── OpenAI client ────────────────────────────────────────────────────────────

pub struct OpenAiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiAnalyzer {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Builds an analyzer when an API key is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, reqwest::Error> {
        match &config.openai_api_key {
            Some(key) => Self::new(key, &config.openai_model, &config.openai_base_url).map(Some),
            None => Ok(None),
        }
    }

    fn build_request<'a>(&'a self, jpeg_base64: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_PROMPT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:image/jpeg;base64,{}", jpeg_base64),
                            },
                        },
                    ]),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

#[async_trait]
impl DamageAnalyzer for OpenAiAnalyzer {
    async fn analyze(&self, jpeg_base64: &str) -> Result<VehicleAssessment, VisionError> {
        let request = self.build_request(jpeg_base64);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VisionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Request(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(VisionError::EmptyResponse)?;

        tracing::debug!(model = %self.model, chars = content.len(), "model responded");
        parse_assessment(&content)
    }
}

// ── Output parsing ───────────────────────────────────────────────────────────

/// Parses model output as JSON, falling back to the first fenced JSON block.
pub fn parse_assessment(content: &str) -> Result<VehicleAssessment, VisionError> {
    match serde_json::from_str(content.trim()) {
        Ok(assessment) => Ok(assessment),
        Err(direct) => {
            let fenced = FENCED_JSON_RE
                .captures(content)
                .and_then(|c| c.get(1))
                .ok_or_else(|| VisionError::Parse(direct.to_string()))?;
            serde_json::from_str(fenced.as_str()).map_err(|e| VisionError::Parse(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NO_COST_ESTIMATE, UNKNOWN};

    #[test]
    fn parses_plain_json() {
        let parsed = parse_assessment(
            r#"{"make":"Ford","model":"Focus","color":"Silver","damage_summary":"Cracked headlight","repair_cost_estimate":"$400 - $700"}"#,
        )
        .unwrap();
        assert_eq!(parsed.make, "Ford");
        assert_eq!(parsed.model, "Focus");
        assert_eq!(parsed.repair_cost_estimate, "$400 - $700");
    }

    #[test]
    fn parses_fenced_json_and_fills_defaults() {
        let content = "Here is the assessment:\n```json\n{\"make\": \"BMW\", \"damage_summary\": \"Hail dents\"}\n```";
        let parsed = parse_assessment(content).unwrap();
        assert_eq!(parsed.make, "BMW");
        assert_eq!(parsed.model, UNKNOWN);
        assert_eq!(parsed.damage_summary, "Hail dents");
        assert_eq!(parsed.repair_cost_estimate, NO_COST_ESTIMATE);
    }

    #[test]
    fn prose_is_a_parse_error() {
        let err = parse_assessment("I cannot see a vehicle in this image.").unwrap_err();
        assert!(matches!(err, VisionError::Parse(_)));
    }

    #[test]
    fn request_carries_prompt_image_and_json_mode() {
        let analyzer = OpenAiAnalyzer::new("sk-test", "gpt-4o", "https://api.openai.com/v1/").unwrap();
        assert_eq!(analyzer.endpoint, "https://api.openai.com/v1/chat/completions");

        let body = serde_json::to_value(analyzer.build_request("QUJD")).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("automotive insurance adjuster"));
        assert_eq!(body["messages"][1]["content"][0]["type"], "text");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,QUJD"
        );
    }
}
