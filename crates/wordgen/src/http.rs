use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{GeneratorError, WordGenerator};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpGeneratorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Asks a `generateContent`-style model endpoint for a JSON array of words.
pub struct HttpWordGenerator {
    http: Client,
    config: HttpGeneratorConfig,
}

impl HttpWordGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self, GeneratorError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl WordGenerator for HttpWordGenerator {
    async fn generate(
        &self,
        theme_hint: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, GeneratorError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(build_prompt(theme_hint, count)),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 1.0,
            },
        };
        let response: GenerateResponse = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = response
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.text)
            .ok_or_else(|| GeneratorError::Malformed("response has no text part".into()))?;
        parse_word_array(&text)
    }
}

pub(crate) fn build_prompt(theme_hint: Option<&str>, count: usize) -> String {
    let theme = match theme_hint.map(str::trim).filter(|hint| !hint.is_empty()) {
        Some(hint) => format!("The words must relate to the following themes: {hint}."),
        None => "The words should be diverse and cover a variety of topics.".to_string(),
    };
    format!(
        "Generate a JSON array of {count} unique, common, single-word nouns suitable for a \
         word guessing party game. {theme} All words must be uppercase. Output only a valid \
         JSON array of strings, for example: [\"DOG\", \"CAR\", \"RIVER\"]"
    )
}

/// Parses model output that should be a JSON array of strings, tolerating a
/// surrounding markdown code fence.
pub(crate) fn parse_word_array(text: &str) -> Result<Vec<String>, GeneratorError> {
    serde_json::from_str::<Vec<String>>(strip_code_fence(text))
        .map_err(|e| GeneratorError::Malformed(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim()
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
