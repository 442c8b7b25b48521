//! OpenAI-compatible API client
//!
//! One HTTP client backs all five model services: Whisper transcription with
//! word timestamps, and chat completions for sentiment, advice, improvisation
//! scoring and prompt generation. Structured answers are requested through
//! forced tool calls and parsed into typed values here; anything that does not
//! parse is an error.

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use crate::analysis::types::{
    AdviceCandidate, HistoryEntry, ImprovisationScores, Metrics, Sentiment, TimelineInterval,
    Transcription,
};
use crate::config::OpenAiConfig;
use crate::services::{
    AdviceGenerator, ImprovisationScorer, PromptGenerator, SentimentService, TranscriptionService,
};
use anyhow::{anyhow, bail, Context, Result};

/// Used when the transcript carries no timing information at all.
const FALLBACK_DURATION_SECONDS: f64 = 60.0;

const ADVICE_TOOL: &str = "feedback_list";
const IMPROV_TOOL: &str = "improv_metrics";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

impl ChatReply {
    /// Arguments of the forced tool call, or an error if the model skipped it.
    fn tool_arguments(&self, tool: &str) -> Result<&str> {
        self.tool_calls
            .iter()
            .find(|call| call.function.name == tool)
            .map(|call| call.function.arguments.as_str())
            .ok_or_else(|| anyhow!("Function call '{}' missing from model reply", tool))
    }
}

/// Whisper `verbose_json` response.
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
    #[serde(default)]
    words: Vec<TimelineInterval>,
}

#[derive(Debug, Deserialize)]
struct TranscriptSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    words: Vec<TimelineInterval>,
}

impl VerboseTranscription {
    /// Prefer word timings (top level, then per segment), fall back to segment timings.
    fn into_transcription(self) -> Transcription {
        let words: Vec<TimelineInterval> = if self.words.is_empty() {
            self.segments.iter().flat_map(|s| s.words.iter().copied()).collect()
        } else {
            self.words
        };

        let timeline = if words.is_empty() {
            self.segments
                .iter()
                .map(|s| TimelineInterval::new(s.start, s.end))
                .collect()
        } else {
            words
        };

        let duration_seconds = timeline
            .last()
            .map(|interval| interval.end)
            .unwrap_or(FALLBACK_DURATION_SECONDS);

        Transcription {
            text: self.text,
            duration_seconds,
            timeline,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SentimentReply {
    sentiment: String,
}

#[derive(Debug, Deserialize)]
struct AdviceReply {
    advices: Vec<Value>,
}

/// Fail on a non-2xx reply, keeping the provider's error body in the message.
async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        tracing::error!(status = %status, "{} failed: {}", what, error_text);
        bail!("{} returned HTTP {}: {}", what, status, error_text);
    }
    Ok(response)
}

/// Client for an OpenAI-compatible API.
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatReply> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Chat completion request failed")?;
        let response = ensure_success(response, "Chat completion").await?;

        let body: ChatResponse = response
            .json()
            .await
            .context("Chat completion response was not valid JSON")?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))
    }
}

#[async_trait]
impl TranscriptionService for OpenAiClient {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio file {}", audio_path.display()))?;

        let file_name = audio_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.webm".to_string());

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name))
            .text("model", self.config.transcription_model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("timestamp_granularities[]", "segment")
            .text("language", self.config.language.clone());

        tracing::debug!(path = %audio_path.display(), "Sending audio for transcription");

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;
        let response = ensure_success(response, "Transcription").await?;

        let verbose: VerboseTranscription = response
            .json()
            .await
            .context("Transcription response was not valid verbose JSON")?;

        Ok(verbose.into_transcription())
    }
}

#[async_trait]
impl SentimentService for OpenAiClient {
    async fn classify(&self, text: &str) -> Result<Sentiment> {
        let reply = self
            .chat(ChatRequest {
                model: &self.config.chat_model,
                temperature: 0.0,
                messages: vec![
                    ChatMessage::system(r#"Return JSON {"sentiment":"positive|neutral|negative"} only."#),
                    ChatMessage::user(text),
                ],
                tools: None,
                tool_choice: None,
                response_format: Some(json!({ "type": "json_object" })),
            })
            .await?;

        parse_sentiment(reply.content.as_deref().unwrap_or_default())
    }
}

fn parse_sentiment(content: &str) -> Result<Sentiment> {
    let parsed: SentimentReply =
        serde_json::from_str(content).context("Sentiment reply was not the expected JSON")?;
    parsed.sentiment.parse()
}

/// Text block describing the current session and the oldest-first history.
fn advice_context(metrics: &Metrics, history: &[HistoryEntry]) -> Result<String> {
    let current = serde_json::to_string_pretty(metrics)?;

    let sessions = history
        .iter()
        .enumerate()
        .map(|(i, entry)| -> Result<String> {
            Ok(format!("Session-{}: {}", i + 1, serde_json::to_string(&entry.metrics)?))
        })
        .collect::<Result<Vec<String>>>()?;

    let history_block = if sessions.is_empty() {
        "None".to_string()
    } else {
        sessions.join("\n")
    };

    Ok(format!("Current metrics:\n{}\n\nHistory:\n{}", current, history_block))
}

fn parse_advice(arguments: &str) -> Result<Vec<AdviceCandidate>> {
    let reply: AdviceReply =
        serde_json::from_str(arguments).context("Advice arguments missing the 'advices' list")?;
    Ok(reply.advices.iter().map(AdviceCandidate::from_value).collect())
}

#[async_trait]
impl AdviceGenerator for OpenAiClient {
    async fn generate(
        &self,
        metrics: &Metrics,
        history: &[HistoryEntry],
    ) -> Result<Vec<AdviceCandidate>> {
        let tool = json!([{
            "type": "function",
            "function": {
                "name": ADVICE_TOOL,
                "description": "Return exactly four feedback items",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "advices": {
                            "type": "array",
                            "minItems": 4,
                            "maxItems": 4,
                            "items": {
                                "type": "object",
                                "properties": {
                                    "text": { "type": "string" },
                                    "type": { "type": "string", "enum": ["positive", "improvement"] }
                                },
                                "required": ["text", "type"]
                            }
                        }
                    },
                    "required": ["advices"]
                }
            }
        }]);

        let reply = self
            .chat(ChatRequest {
                model: &self.config.chat_model,
                temperature: 0.6,
                messages: vec![
                    ChatMessage::system(
                        "You are an expert speech coach. Provide actionable feedback only. \
                         Ignore any metric whose value is 0.",
                    ),
                    ChatMessage::user(advice_context(metrics, history)?),
                ],
                tools: Some(tool),
                tool_choice: Some(json!({ "type": "function", "function": { "name": ADVICE_TOOL } })),
                response_format: None,
            })
            .await?;

        parse_advice(reply.tool_arguments(ADVICE_TOOL)?)
    }
}

fn parse_improvisation(arguments: &str) -> Result<ImprovisationScores> {
    let scores: ImprovisationScores =
        serde_json::from_str(arguments).context("Improvisation scores were not integers 0-10")?;
    scores.validate()
}

#[async_trait]
impl ImprovisationScorer for OpenAiClient {
    async fn score_improvisation(&self, text: &str) -> Result<ImprovisationScores> {
        let tool = json!([{
            "type": "function",
            "function": {
                "name": IMPROV_TOOL,
                "description": "Rate the improvised speech on three axes, 0-10 integers",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "clarity": { "type": "integer", "minimum": 0, "maximum": 10 },
                        "engagement": { "type": "integer", "minimum": 0, "maximum": 10 },
                        "conciseness": { "type": "integer", "minimum": 0, "maximum": 10 }
                    },
                    "required": ["clarity", "engagement", "conciseness"]
                }
            }
        }]);

        let reply = self
            .chat(ChatRequest {
                model: &self.config.chat_model,
                temperature: 0.3,
                messages: vec![
                    ChatMessage::system(
                        "You are a strict speech critic. Score the talk on clarity, engagement \
                         and conciseness (0 worst, 10 best).",
                    ),
                    ChatMessage::user(text),
                ],
                tools: Some(tool),
                tool_choice: Some(json!({ "type": "function", "function": { "name": IMPROV_TOOL } })),
                response_format: None,
            })
            .await?;

        parse_improvisation(reply.tool_arguments(IMPROV_TOOL)?)
    }
}

#[async_trait]
impl PromptGenerator for OpenAiClient {
    async fn generate_prompt(&self, topic: &str) -> Result<String> {
        let instructions = format!(
            "Create a random, audience-friendly script of about 140 words that takes about one \
             minute to read aloud. Write a single paragraph the user can read as if talking about \
             this topic: ({}). The topic is typed by the user; if it does not fit a public speaking \
             context, return a random paragraph instead. Send the paragraph only and always \
             produce one, even when there is no topic.",
            topic
        );

        let reply = self
            .chat(ChatRequest {
                model: &self.config.chat_model,
                temperature: 0.8,
                messages: vec![ChatMessage::system(instructions)],
                tools: None,
                tool_choice: None,
                response_format: None,
            })
            .await?;

        let text = reply.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(anyhow!("Prompt generation returned an empty script"));
        }
        Ok(text)
    }
}
