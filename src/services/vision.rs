//! Client for the external vision model providers.
//!
//! Four providers speak two wire formats: Gemini uses generateContent with
//! inline_data parts, while OpenAI, xAI and Groq share the OpenAI chat
//! completions shape with data-URL image parts. Callers pick a provider; if
//! its key is missing or it returns nothing, we fall back to Gemini and then
//! OpenAI.

use std::time::Duration;

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::VisionKeys;
use crate::error::{ApiError, ApiResult};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const XAI_URL: &str = "https://api.x.ai/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

const OPENAI_MODEL: &str = "gpt-5-mini";
const XAI_MODEL: &str = "grok-2-vision-1212";
const GROQ_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Openai,
    Grok,
    Groq,
}

impl Provider {
    /// Lenient parse; anything unrecognized falls back to Gemini, matching
    /// the request default.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "openai" => Self::Openai,
            "grok" | "xai" => Self::Grok,
            "groq" => Self::Groq,
            _ => Self::Gemini,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini 2.0 Flash",
            Self::Openai => "GPT-5 Mini (OpenAI)",
            Self::Grok => "Grok 2 Vision (xAI)",
            Self::Groq => "Llama 4 Scout (Groq)",
        }
    }
}

/// One attachment to send alongside the prompt.
pub struct ImagePart<'a> {
    pub mime_type: &'a str,
    pub base64_data: &'a str,
}

#[derive(Clone)]
pub struct VisionClient {
    client: Client,
    keys: VisionKeys,
}

impl VisionClient {
    pub fn new(keys: VisionKeys, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(
            gemini = keys.google_api_key.is_some(),
            openai = keys.openai_api_key.is_some(),
            xai = keys.xai_api_key.is_some(),
            groq = keys.groq_api_key.is_some(),
            "Vision client initialized"
        );

        Ok(Self { client, keys })
    }

    pub fn any_configured(&self) -> bool {
        self.keys.any_configured()
    }

    /// Send a prompt plus image to the chosen provider, falling back to
    /// Gemini then OpenAI when the choice is unavailable or comes back empty.
    /// Returns the raw text reply and the label of the model that produced it.
    pub async fn analyze(
        &self,
        provider: Provider,
        prompt: &str,
        image: ImagePart<'_>,
        max_tokens: u32,
    ) -> ApiResult<(String, &'static str)> {
        self.analyze_with_fallback(
            &[provider, Provider::Gemini, Provider::Openai],
            prompt,
            image,
            max_tokens,
        )
        .await
    }

    /// Try each provider in the chain until one answers. Duplicates in the
    /// chain are attempted once.
    pub async fn analyze_with_fallback(
        &self,
        chain: &[Provider],
        prompt: &str,
        image: ImagePart<'_>,
        max_tokens: u32,
    ) -> ApiResult<(String, &'static str)> {
        if !self.keys.any_configured() {
            return Err(ApiError::BadRequest(
                "No vision API keys configured (need GOOGLE_API_KEY, OPENAI_API_KEY, XAI_API_KEY, or GROQ_API_KEY)"
                    .into(),
            ));
        }

        let chain = unique_providers(chain);
        for (i, &provider) in chain.iter().enumerate() {
            if i > 0 {
                warn!(
                    from = chain[i - 1].label(),
                    to = provider.label(),
                    "Falling back to another vision provider"
                );
            }
            if let Some(content) = self.try_provider(provider, prompt, &image, max_tokens).await? {
                return Ok((content, provider.label()));
            }
        }

        Err(ApiError::BadRequest(
            "No response from any configured vision provider".into(),
        ))
    }

    /// Send a PDF straight to Gemini. The other providers only accept images,
    /// so multi-page PDFs always go through this path.
    pub async fn analyze_pdf(
        &self,
        prompt: &str,
        pdf_base64: &str,
        max_tokens: u32,
    ) -> ApiResult<(String, &'static str)> {
        let key = self.keys.google_api_key.as_deref().ok_or_else(|| {
            ApiError::BadRequest("GOOGLE_API_KEY required for PDF analysis".into())
        })?;

        let content = self
            .call_gemini(
                key,
                prompt,
                &ImagePart {
                    mime_type: "application/pdf",
                    base64_data: pdf_base64,
                },
                max_tokens,
            )
            .await?;

        content
            .map(|c| (c, Provider::Gemini.label()))
            .ok_or_else(|| ApiError::BadRequest("Empty response from Gemini".into()))
    }

    async fn try_provider(
        &self,
        provider: Provider,
        prompt: &str,
        image: &ImagePart<'_>,
        max_tokens: u32,
    ) -> ApiResult<Option<String>> {
        match provider {
            Provider::Gemini => match self.keys.google_api_key.as_deref() {
                Some(key) => self.call_gemini(key, prompt, image, max_tokens).await,
                None => Ok(None),
            },
            Provider::Openai => match self.keys.openai_api_key.as_deref() {
                Some(key) => {
                    self.call_chat(OPENAI_URL, key, OPENAI_MODEL, prompt, image, max_tokens)
                        .await
                }
                None => Ok(None),
            },
            Provider::Grok => match self.keys.xai_api_key.as_deref() {
                Some(key) => {
                    self.call_chat(XAI_URL, key, XAI_MODEL, prompt, image, max_tokens)
                        .await
                }
                None => Ok(None),
            },
            Provider::Groq => match self.keys.groq_api_key.as_deref() {
                Some(key) => {
                    self.call_chat(GROQ_URL, key, GROQ_MODEL, prompt, image, max_tokens)
                        .await
                }
                None => Ok(None),
            },
        }
    }

    async fn call_gemini(
        &self,
        key: &str,
        prompt: &str,
        image: &ImagePart<'_>,
        max_tokens: u32,
    ) -> ApiResult<Option<String>> {
        #[derive(Serialize)]
        struct Request<'a> {
            contents: [Content<'a>; 1],
            #[serde(rename = "generationConfig")]
            generation_config: GenerationConfig,
        }

        #[derive(Serialize)]
        struct Content<'a> {
            parts: [Part<'a>; 2],
        }

        #[derive(Serialize)]
        #[serde(untagged)]
        enum Part<'a> {
            Text {
                text: &'a str,
            },
            Inline {
                inline_data: InlineData<'a>,
            },
        }

        #[derive(Serialize)]
        struct InlineData<'a> {
            mime_type: &'a str,
            data: &'a str,
        }

        #[derive(Serialize)]
        struct GenerationConfig {
            temperature: f64,
            #[serde(rename = "maxOutputTokens")]
            max_output_tokens: u32,
        }

        let url = format!("{GEMINI_URL}?key={key}");
        let body = Request {
            contents: [Content {
                parts: [
                    Part::Text { text: prompt },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: image.mime_type,
                            data: image.base64_data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: max_tokens,
            },
        };

        debug!(mime_type = image.mime_type, "Gemini request");
        let reply = self.post_with_retry(&url, None, &body).await?;

        Ok(reply
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from))
    }

    async fn call_chat(
        &self,
        url: &str,
        key: &str,
        model: &str,
        prompt: &str,
        image: &ImagePart<'_>,
        max_tokens: u32,
    ) -> ApiResult<Option<String>> {
        let data_url = format!("data:{};base64,{}", image.mime_type, image.base64_data);
        let body = serde_json::json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }],
            "temperature": 0.2,
            "max_completion_tokens": max_tokens
        });

        debug!(model = model, "Chat completions request");
        let reply = self.post_with_retry(url, Some(key), &body).await?;

        Ok(reply
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from))
    }

    /// POST with retry on transport errors and 5xx/429 responses. Provider
    /// 4xx errors are permanent and surface immediately.
    async fn post_with_retry<T: Serialize>(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &T,
    ) -> ApiResult<Value> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let reply = backoff::future::retry(policy, || async {
            let mut req = self.client.post(url).json(body);
            if let Some(token) = bearer {
                req = req.bearer_auth(token);
            }

            let response = req.send().await.map_err(|e| {
                warn!(error = %e, "Vision provider request failed, retrying");
                backoff::Error::transient(anyhow::anyhow!("provider unreachable: {e}"))
            })?;

            let status = response.status();
            if status.is_success() {
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| backoff::Error::permanent(anyhow::anyhow!("invalid provider response: {e}")))
            } else if status.is_server_error() || status.as_u16() == 429 {
                warn!(status = %status, "Vision provider returned a retryable status");
                Err(backoff::Error::transient(anyhow::anyhow!(
                    "provider error: {status}"
                )))
            } else {
                let detail = response.text().await.unwrap_or_default();
                error!(status = %status, detail = %detail, "Vision provider rejected the request");
                Err(backoff::Error::permanent(anyhow::anyhow!(
                    "provider error {status}: {detail}"
                )))
            }
        })
        .await
        .map_err(ApiError::Internal)?;

        Ok(reply)
    }
}

fn unique_providers(chain: &[Provider]) -> Vec<Provider> {
    let mut out: Vec<Provider> = Vec::with_capacity(chain.len());
    for &provider in chain {
        if !out.contains(&provider) {
            out.push(provider);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_chain_tries_each_provider_once() {
        assert_eq!(
            unique_providers(&[Provider::Gemini, Provider::Gemini, Provider::Openai]),
            vec![Provider::Gemini, Provider::Openai]
        );
        assert_eq!(
            unique_providers(&[Provider::Grok, Provider::Gemini, Provider::Openai]),
            vec![Provider::Grok, Provider::Gemini, Provider::Openai]
        );
    }

    #[test]
    fn provider_parse_defaults_to_gemini() {
        assert_eq!(Provider::parse("gemini"), Provider::Gemini);
        assert_eq!(Provider::parse("OpenAI"), Provider::Openai);
        assert_eq!(Provider::parse("grok"), Provider::Grok);
        assert_eq!(Provider::parse("groq"), Provider::Groq);
        assert_eq!(Provider::parse("something-else"), Provider::Gemini);
    }

    #[test]
    fn unconfigured_client_rejects() {
        let client = VisionClient::new(VisionKeys::default(), 5).unwrap();
        assert!(!client.any_configured());
    }
}
