//! Native Gemini `generateContent` client.
//!
//! The request carries the three parts in the order the prompts expect
//! (system text, inline PNG, field instruction) together with the sampling
//! parameters and the four safety settings. The reply text is the
//! concatenation of the first candidate's text parts.
//!
//! A reply with no usable candidate is an error, as is a blocked prompt; an
//! empty text part is not.

use crate::config::{ExtractionConfig, GenerationParams, SafetySetting, GOOGLE_API_KEY_ENV};
use crate::error::ModelError;
use crate::pipeline::model::{PageRequest, VisionModel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Gemini REST client bound to one model and one parameter set.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
    generation: GenerationParams,
    safety: Vec<SafetySetting>,
}

impl GeminiModel {
    /// Build a client from the extraction config.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ModelError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.api_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            api_base: config.api_base.clone(),
            model: config.model_name.clone(),
            api_key: config.api_key.clone(),
            generation: config.generation,
            safety: config.safety.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    fn name(&self) -> String {
        format!("gemini/{}", self.model)
    }

    async fn generate(&self, request: PageRequest<'_>) -> Result<String, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey {
            env_var: GOOGLE_API_KEY_ENV,
        })?;

        let body = build_request(&request, &self.generation, &self.safety);
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Page {}: {} input tokens, {} output tokens",
                request.image.page_num, usage.prompt_token_count, usage.candidates_token_count
            );
        }
        reply_text(parsed)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: &'a [SafetySetting],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl From<&GenerationParams> for GenerationConfig {
    fn from(p: &GenerationParams) -> Self {
        Self {
            temperature: p.temperature,
            top_p: p.top_p,
            top_k: p.top_k,
            max_output_tokens: p.max_output_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ── Request/response mapping ─────────────────────────────────────────────

pub(crate) fn build_request<'a>(
    request: &PageRequest<'a>,
    generation: &GenerationParams,
    safety: &'a [SafetySetting],
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part::Text {
                    text: request.system_prompt,
                },
                Part::InlineData {
                    inline_data: Blob {
                        mime_type: request.image.mime_type,
                        data: request.image.to_base64(),
                    },
                },
                Part::Text {
                    text: request.user_prompt,
                },
            ],
        }],
        generation_config: generation.into(),
        safety_settings: safety,
    }
}

pub(crate) fn reply_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ModelError::Blocked {
            reason: format!("prompt blocked: {reason}"),
        });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ModelError::NoContent {
            finish_reason: "no candidates".into(),
        });
    };

    let finish_reason = candidate
        .finish_reason
        .unwrap_or_else(|| "unspecified".into());
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    if parts.is_empty() {
        if finish_reason == "SAFETY" {
            return Err(ModelError::Blocked {
                reason: "candidate blocked: SAFETY".into(),
            });
        }
        return Err(ModelError::NoContent { finish_reason });
    }

    Ok(parts.into_iter().filter_map(|p| p.text).collect())
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::PageImage;
    use serde_json::json;

    fn page() -> PageImage {
        PageImage {
            page_num: 1,
            mime_type: "image/png",
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn request_layout_is_system_image_user() {
        let image = page();
        let req = PageRequest {
            system_prompt: "SYS",
            image: &image,
            user_prompt: "USER",
        };
        let safety = SafetySetting::defaults();
        let body = serde_json::to_value(build_request(
            &req,
            &GenerationParams::default(),
            &safety,
        ))
        .unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(parts[0], json!({"text": "SYS"}));
        assert_eq!(
            parts[1],
            json!({"inlineData": {"mimeType": "image/png", "data": "AQID"}})
        );
        assert_eq!(parts[2], json!({"text": "USER"}));
    }

    #[test]
    fn request_carries_generation_and_safety() {
        let image = page();
        let req = PageRequest {
            system_prompt: "",
            image: &image,
            user_prompt: "",
        };
        let safety = SafetySetting::defaults();
        let body = serde_json::to_value(build_request(
            &req,
            &GenerationParams::default(),
            &safety,
        ))
        .unwrap();

        let gc = &body["generationConfig"];
        assert!((gc["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(gc["topP"], 1.0);
        assert_eq!(gc["topK"], 32);
        assert_eq!(gc["maxOutputTokens"], 4096);

        let settings = body["safetySettings"].as_array().unwrap();
        assert_eq!(settings.len(), 4);
        assert!(settings
            .iter()
            .all(|s| s["threshold"] == "BLOCK_MEDIUM_AND_ABOVE"));
        assert_eq!(settings[0]["category"], "HARM_CATEGORY_HARASSMENT");
        assert_eq!(settings[3]["category"], "HARM_CATEGORY_DANGEROUS_CONTENT");
    }

    fn response(v: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn reply_joins_text_parts() {
        let r = response(json!({
            "candidates": [{
                "content": {"parts": [{"text": "[{\"a\":"}, {"text": "\"b\"}]"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
        }));
        assert_eq!(reply_text(r).unwrap(), "[{\"a\":\"b\"}]");
    }

    #[test]
    fn empty_text_is_ok() {
        let r = response(json!({
            "candidates": [{"content": {"parts": [{"text": ""}]}, "finishReason": "STOP"}]
        }));
        assert_eq!(reply_text(r).unwrap(), "");
    }

    #[test]
    fn blocked_prompt_is_error() {
        let r = response(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert!(matches!(reply_text(r), Err(ModelError::Blocked { .. })));
    }

    #[test]
    fn safety_stopped_candidate_is_blocked() {
        let r = response(json!({"candidates": [{"finishReason": "SAFETY"}]}));
        assert!(matches!(reply_text(r), Err(ModelError::Blocked { .. })));
    }

    #[test]
    fn no_candidates_is_error() {
        let r = response(json!({}));
        assert!(matches!(reply_text(r), Err(ModelError::NoContent { .. })));
    }

    #[test]
    fn api_error_message_prefers_json_message() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(api_error_message(body), "Resource has been exhausted");
        assert_eq!(api_error_message(" bad gateway \n"), "bad gateway");
    }

    #[tokio::test]
    async fn missing_api_key_fails_at_request_time() {
        let model = GeminiModel::from_config(&ExtractionConfig::default()).unwrap();
        let image = page();
        let err = model
            .generate(PageRequest {
                system_prompt: "s",
                image: &image,
                user_prompt: "u",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingApiKey { .. }));
    }
}
