//! Gemini `generateContent` client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::commentary::TextGenerator;
use crate::config::GenerationSettings;
use crate::error::CommentaryError;

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    /// Fails when no API key is configured.
    pub fn new(settings: &GenerationSettings) -> Result<Self, CommentaryError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| CommentaryError::Generation("GEMINI_API_KEY not set".into()))?;

        let client = Client::builder()
            .user_agent("MoveCoach/1.0")
            .timeout(settings.timeout)
            .build()
            .map_err(|e| CommentaryError::Generation(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        })
    }

    fn request_body(&self, instruction: &str, input: &str) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": input }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            },
        })
    }
}

/// Concatenated text parts of the first candidate.
fn reply_text(data: &Value) -> Option<String> {
    let parts = data["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, instruction: &str, input: &str) -> Result<String, CommentaryError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let resp = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&self.request_body(instruction, input))
            .send()
            .await
            .map_err(|e| CommentaryError::Generation(format!("Request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(CommentaryError::Generation(format!(
                "Gemini HTTP {}",
                resp.status()
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| CommentaryError::Generation(format!("Response parse error: {e}")))?;

        reply_text(&data).ok_or_else(|| CommentaryError::Generation("Reply has no text".into()))
    }
}
