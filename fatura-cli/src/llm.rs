use anyhow::{Context, Result, anyhow, bail};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use fatura_core::{Suggester, SuggestionRequest};

use crate::config::RemoteSection;

const MAX_TOKENS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
    Anthropic,
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAI),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => bail!("unknown remote provider '{other}' (expected gemini, openai or anthropic)"),
        }
    }
}

impl Provider {
    fn default_base_url(self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenAI => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }
}

/// HTTP client for the remote category suggester.
pub struct RemoteClassifier {
    provider: Provider,
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl RemoteClassifier {
    /// Builds a client from config, reading the key from `api_key_env`.
    pub fn from_config(section: &RemoteSection) -> Result<Self> {
        let provider: Provider = section.provider.parse()?;
        let api_key = std::env::var(&section.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} is not set", section.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs.max(1)))
            .build()
            .context("build http client")?;

        Ok(Self {
            provider,
            model: section.model.clone(),
            base_url: section
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            temperature: section.temperature,
            client,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Blocking wrapper usable from inside or outside a tokio runtime.
    pub fn complete(&self, system: &str, user: &str) -> Result<String> {
        // Nested block_on panics, so reuse the running runtime when there is one.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.complete_async(system, user)))
        } else {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(self.complete_async(system, user))
        }
    }

    pub async fn complete_async(&self, system: &str, user: &str) -> Result<String> {
        debug!(provider = ?self.provider, model = %self.model, "remote request");
        match self.provider {
            Provider::Gemini => self.gemini(system, user).await,
            Provider::OpenAI => self.openai(system, user).await,
            Provider::Anthropic => self.anthropic(system, user).await,
        }
    }

    async fn gemini(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = GeminiReq {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: Some(system.to_string()) }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: Some(user.to_string()) }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: MAX_TOKENS,
            },
        };

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("gemini request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("gemini error: {status} {txt}");
        }

        let out: GeminiResp = resp.json().await.context("parse gemini response")?;
        Ok(out.text())
    }

    async fn openai(&self, system: &str, user: &str) -> Result<String> {
        let body = OpenAiReq {
            model: self.model.clone(),
            messages: vec![
                Msg { role: "system".to_string(), content: system.to_string() },
                Msg { role: "user".to_string(), content: user.to_string() },
            ],
            temperature: self.temperature,
            max_tokens: MAX_TOKENS,
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("openai error: {status} {txt}");
        }

        let out: OpenAiResp = resp.json().await.context("parse openai response")?;
        Ok(out.text())
    }

    async fn anthropic(&self, system: &str, user: &str) -> Result<String> {
        let body = AnthropicReq {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
            system: system.to_string(),
            messages: vec![Msg { role: "user".to_string(), content: user.to_string() }],
        };

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .context("anthropic request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("anthropic error: {status} {txt}");
        }

        let out: AnthropicResp = resp.json().await.context("parse anthropic response")?;
        Ok(out.text())
    }
}

impl Suggester for RemoteClassifier {
    fn suggest(&mut self, request: &SuggestionRequest) -> Result<String> {
        self.complete(&request.system_prompt(), &request.user_message())
    }
}

#[derive(Serialize)]
struct Msg {
    role: String,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiReq {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResp {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

impl GeminiResp {
    fn text(self) -> String {
        let mut s = String::new();
        if let Some(c) = self.candidates.into_iter().next() {
            for p in c.content.parts {
                if let Some(t) = p.text {
                    s.push_str(&t);
                }
            }
        }
        s.trim().to_string()
    }
}

#[derive(Serialize)]
struct OpenAiReq {
    model: String,
    messages: Vec<Msg>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: Option<String>,
}

impl OpenAiResp {
    fn text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[derive(Serialize)]
struct AnthropicReq {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Msg>,
}

#[derive(Deserialize)]
struct AnthropicResp {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    t: String,
    text: Option<String>,
}

impl AnthropicResp {
    fn text(self) -> String {
        let mut s = String::new();
        for b in self.content {
            if b.t == "text" {
                if let Some(t) = b.text {
                    s.push_str(&t);
                }
            }
        }
        s.trim().to_string()
    }
}
