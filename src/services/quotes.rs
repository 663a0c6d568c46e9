use std::time::Duration;

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::config::ExtractionConfig;
use crate::errors::ServiceError;

/// Texts beyond this size are truncated to stay within the model's context
const MAX_PDF_TEXT_CHARS: usize = 12_000;

const TOOL_NAME: &str = "record_quote";

const SYSTEM_PROMPT: &str = "You are a purchasing assistant. You are given raw text \
extracted from a supplier quote PDF. Extract the supplier name, the quote reference, \
every quoted line (material name, quantity, unit price before tax) and the total \
amount, and record them with the record_quote tool. The text may be garbled by PDF \
column extraction; reconstruct the data as faithfully as possible and leave unknown \
fields null.";

/// Structured quote returned by the extraction endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExtractedQuote {
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub lines: Vec<ExtractedQuoteLine>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExtractedQuoteLine {
    pub material_name: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub unit_price: Decimal,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Serialize)]
struct ExtractionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
    tools: Vec<serde_json::Value>,
    tool_choice: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Outcome classification for a single upstream attempt
enum AttemptError {
    /// Surfaced immediately, never retried (rate limit, exhausted credits)
    Fatal(ServiceError),
    /// Retried with backoff until attempts run out
    Retryable(String),
}

/// Resolved settings for the extraction endpoint
#[derive(Clone, Debug)]
pub struct QuoteExtractionSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub request_timeout: Duration,
}

impl QuoteExtractionSettings {
    /// Resolve the config section into usable settings. The endpoint is the
    /// only field without a default.
    pub fn from_config(cfg: &ExtractionConfig) -> Result<Self, ServiceError> {
        let endpoint = cfg
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ServiceError::InternalError(
                    "Quote extraction endpoint is not configured (set APP__EXTRACTION__ENDPOINT)"
                        .to_string(),
                )
            })?
            .to_string();

        Ok(Self {
            endpoint,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_secs(cfg.initial_backoff_secs),
            request_timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }
}

/// Adapter around the remote structured-generation endpoint. Pure transform
/// from PDF text to a structured quote; persisting the result is the
/// caller's concern.
#[derive(Clone)]
pub struct QuoteExtractionService {
    client: Client,
    settings: QuoteExtractionSettings,
}

impl QuoteExtractionService {
    /// Build a service using a default reqwest client with the configured timeout.
    pub fn new(settings: QuoteExtractionSettings) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!(
                    "failed to construct http client for quote extraction: {}",
                    e
                ))
            })?;

        Ok(Self::with_client(settings, client))
    }

    /// Build a service from an existing client (useful for testing).
    pub fn with_client(settings: QuoteExtractionSettings, client: Client) -> Self {
        Self { client, settings }
    }

    /// Extracts a structured quote from raw PDF text.
    ///
    /// Rate-limited (429) and credit-exhausted (402) responses surface
    /// immediately; everything else is retried with exponential backoff
    /// until the configured attempts run out.
    #[instrument(skip(self, pdf_text), fields(text_len = pdf_text.len()))]
    pub async fn extract_quote(&self, pdf_text: &str) -> Result<ExtractedQuote, ServiceError> {
        let text = pdf_text.trim();
        if text.is_empty() {
            return Err(ServiceError::ValidationError(
                "No text to extract a quote from".to_string(),
            ));
        }

        let text = truncate_on_char_boundary(text, MAX_PDF_TEXT_CHARS);

        let mut backoff = self.settings.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.attempt_extraction(text).await {
                Ok(quote) => {
                    info!(
                        attempt = attempt,
                        lines = quote.lines.len(),
                        supplier = ?quote.supplier,
                        "Quote extracted"
                    );
                    return Ok(quote);
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(reason)) => {
                    if attempt >= self.settings.max_attempts {
                        warn!(
                            attempt = attempt,
                            reason = %reason,
                            "Quote extraction failed on final attempt"
                        );
                        return Err(ServiceError::ServiceUnavailable(
                            "quote extraction service is unavailable".to_string(),
                        ));
                    }

                    warn!(
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        reason = %reason,
                        "Quote extraction attempt failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn attempt_extraction(&self, text: &str) -> Result<ExtractedQuote, AttemptError> {
        let request = ExtractionRequest {
            model: &self.settings.model,
            max_tokens: 2048,
            system: SYSTEM_PROMPT,
            messages: vec![RequestMessage {
                role: "user",
                content: format!("Extract the quote from the following PDF text:\n\n{text}"),
            }],
            tools: vec![quote_tool_definition()],
            tool_choice: json!({ "type": "tool", "name": TOOL_NAME }),
        };

        let mut builder = self.client.post(&self.settings.endpoint).json(&request);
        if let Some(api_key) = &self.settings.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(format!("transport error: {e}")))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AttemptError::Fatal(ServiceError::RateLimitExceeded));
            }
            StatusCode::PAYMENT_REQUIRED => {
                return Err(AttemptError::Fatal(ServiceError::InsufficientCredits(
                    "the quote extraction service has no remaining credits".to_string(),
                )));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AttemptError::Retryable(format!(
                    "upstream status {status}: {body}"
                )));
            }
            _ => {}
        }

        let payload: ExtractionResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Retryable(format!("malformed response body: {e}")))?;

        parse_extraction_payload(payload).map_err(AttemptError::Retryable)
    }
}

/// JSON Schema of the quote recorded by the tool call
fn quote_tool_definition() -> serde_json::Value {
    json!({
        "name": TOOL_NAME,
        "description": "Record the structured content of a supplier quote",
        "input_schema": {
            "type": "object",
            "properties": {
                "supplier": { "type": ["string", "null"] },
                "reference": { "type": ["string", "null"] },
                "lines": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "material_name": { "type": "string" },
                            "quantity": { "type": "integer", "minimum": 1 },
                            "unit_price": { "type": "number", "minimum": 0 }
                        },
                        "required": ["material_name"]
                    }
                },
                "total_amount": { "type": ["number", "null"] }
            },
            "required": ["lines"]
        }
    })
}

/// Reads the quote out of the first matching tool-call block, falling back
/// to parsing the first text block as plain JSON.
fn parse_extraction_payload(payload: ExtractionResponse) -> Result<ExtractedQuote, String> {
    for block in &payload.content {
        if let ContentBlock::ToolUse { name, input } = block {
            if name == TOOL_NAME {
                return serde_json::from_value(input.clone())
                    .map_err(|e| format!("tool call carried an invalid quote: {e}"));
            }
        }
    }

    for block in &payload.content {
        if let ContentBlock::Text { text } = block {
            let stripped = strip_markdown_fences(text);
            let json_str = extract_json_object(stripped)?;
            return serde_json::from_str(json_str)
                .map_err(|e| format!("text block carried an invalid quote: {e}"));
        }
    }

    Err("response carried neither a tool call nor a text block".to_string())
}

/// Strip markdown fences if the model added them despite instructions
fn strip_markdown_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding prose.
fn extract_json_object(s: &str) -> Result<&str, String> {
    let start = s.find('{').ok_or("no '{' found in response text")?;
    let end = s.rfind('}').ok_or("no '}' found in response text")?;
    if end <= start {
        return Err("malformed JSON in response text".to_string());
    }
    Ok(&s[start..=end])
}

fn truncate_on_char_boundary(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
