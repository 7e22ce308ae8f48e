//! Google Gemini implementation of [`ModelClient`].
//!
//! - Non-streaming calls go to `models/{model}:generateContent`
//! - Streaming calls go to `models/{model}:streamGenerateContent?alt=sse`
//! - Search grounding is the `googleSearch` tool; cited pages come back in
//!   `groundingMetadata.groundingChunks`
//! - Structured output sets `responseMimeType` and `responseJsonSchema`

use super::{
    Credentials, GenerateRequest, Generation, LazyClient, ModelClient, Source, StreamEvent,
    TextStream,
};
use crate::config::ApiSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Buffered stream events between the reader task and the consumer.
const STREAM_BUFFER: usize = 64;

/// Client for the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    /// Whole-call limit for `generate`, idle limit between streamed chunks
    timeout: Duration,
}

impl GeminiClient {
    /// Create a client with explicitly resolved credentials.
    pub fn new(settings: &ApiSettings, credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials,
            timeout: Duration::from_secs(settings.timeout_secs),
        })
    }

    /// Create a client, resolving credentials from settings and environment.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        let credentials = Credentials::resolve(settings)?;
        Self::new(settings, credentials)
    }

    /// A handle that builds the client on first use.
    pub fn lazy(settings: ApiSettings) -> LazyClient {
        let settings = Arc::new(settings);
        LazyClient::new(move || {
            let settings = settings.clone();
            async move {
                let client = GeminiClient::from_settings(&settings)?;
                debug!(base_url = client.base_url.as_str(), "Created Gemini client");
                Ok::<Arc<dyn ModelClient>, Error>(Arc::new(client))
            }
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.http.post(url);
        match &self.credentials {
            Credentials::ApiKey(key) => builder.header("x-goog-api-key", key),
            Credentials::AccessToken(token) => builder.bearer_auth(token),
        }
    }

    /// POST the request. `timeout` bounds the whole exchange, body included.
    async fn send(
        &self,
        url: &str,
        request: &GenerateRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        let body = RequestBody::from_request(request);
        debug!(
            model = request.model.as_str(),
            search = request.search,
            structured = request.response_schema.is_some(),
            "Sending Gemini request"
        );

        let mut builder = self.post(url).json(&body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body_text = response.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body_text))
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        let url = self.endpoint(&request.model, "generateContent");
        let response = self.send(&url, request, Some(self.timeout)).await?;
        let body: ResponseBody = response.json().await?;
        body.into_generation()
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<TextStream> {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(&request.model, "streamGenerateContent")
        );
        // Streams are unbounded in total; only the wait for headers and each
        // gap between chunks count against the timeout.
        let idle = self.timeout;
        let response = tokio::time::timeout(idle, self.send(&url, request, None))
            .await
            .map_err(|_| {
                Error::Stream(format!("no response within {}s", idle.as_secs()))
            })??;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            loop {
                let chunk = match tokio::time::timeout(idle, bytes.next()).await {
                    Ok(Some(Ok(chunk))) => chunk,
                    Ok(None) => break,
                    Err(_) => {
                        let _ = tx
                            .send(Err(Error::Stream(format!(
                                "no data received for {}s",
                                idle.as_secs()
                            ))))
                            .await;
                        return;
                    }
                    Ok(Some(Err(e))) => {
                        let _ = tx
                            .send(Err(Error::Stream(format!("failed to read chunk: {}", e))))
                            .await;
                        return;
                    }
                };
                for data in decoder.push(&chunk) {
                    if forward_event(&tx, &data).await.is_err() {
                        return;
                    }
                }
            }

            if let Some(data) = decoder.finish()
                && forward_event(&tx, &data).await.is_err()
            {
                return;
            }
            let _ = tx.send(Ok(StreamEvent::Done)).await;
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Decode one SSE payload and forward its text or error. `Err` means stop reading.
async fn forward_event(
    tx: &mpsc::Sender<Result<StreamEvent>>,
    data: &str,
) -> std::result::Result<(), ()> {
    let mut body: ResponseBody = match serde_json::from_str(data) {
        Ok(body) => body,
        Err(e) => {
            let preview: String = data.chars().take(200).collect();
            warn!(error = %e, data_preview = preview.as_str(), "Failed to parse Gemini SSE chunk");
            let _ = tx
                .send(Err(Error::Stream(format!("invalid stream chunk: {}", e))))
                .await;
            return Err(());
        }
    };

    if let Some(error) = body.error.take() {
        warn!(status = error.code, message = error.message.as_str(), "Gemini stream failed");
        let _ = tx.send(Err(error.into())).await;
        return Err(());
    }

    let text = body.text();
    if text.is_empty() {
        return Ok(());
    }
    tx.send(Ok(StreamEvent::Text(text))).await.map_err(|_| ())
}

/// Build an [`Error::Api`] from a failed response, preferring the API's own message.
fn api_error(status: u16, body_text: &str) -> Error {
    let message = serde_json::from_str::<Value>(body_text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body_text.trim().to_string());
    Error::Api { status, message }
}

// ============================================================================
// SSE framing
// ============================================================================

/// Splits a byte stream into the `data:` payloads of server-sent events.
///
/// Lines may be split across chunks, including inside multi-byte characters.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset + 1;
            if let Some(data) = Self::data_field(&self.buffer[start..end]) {
                payloads.push(data);
            }
            start = end;
            self.scanned = end;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        payloads
    }

    fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buffer);
        Self::data_field(&rest)
    }

    fn data_field(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let data = line
            .trim_end_matches(['\r', '\n'])
            .strip_prefix("data:")?
            .trim_start();
        if data.is_empty() {
            None
        } else {
            Some(data.to_string())
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody<'a> {
    contents: Vec<ContentBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ContentBody<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfigBody<'a>>,
}

#[derive(Serialize)]
struct ContentBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<PartBody<'a>>,
}

#[derive(Serialize)]
struct PartBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolBody {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfigBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<&'a Value>,
}

impl<'a> RequestBody<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        let system_instruction = request.system.as_deref().map(|text| ContentBody {
            role: None,
            parts: vec![PartBody { text }],
        });

        let tools = if request.search {
            vec![ToolBody {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        let generation_config =
            if request.temperature.is_some() || request.response_schema.is_some() {
                Some(GenerationConfigBody {
                    temperature: request.temperature,
                    response_mime_type: request
                        .response_schema
                        .as_ref()
                        .map(|_| "application/json"),
                    response_json_schema: request.response_schema.as_ref(),
                })
            } else {
                None
            };

        Self {
            contents: vec![ContentBody {
                role: Some("user"),
                parts: vec![PartBody {
                    text: &request.prompt,
                }],
            }],
            system_instruction,
            tools,
            generation_config,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    #[serde(default)]
    candidates: Vec<Candidate>,
    /// Set when the API reports a failure inside a 200 response or SSE event
    error: Option<ErrorBody>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

impl From<ErrorBody> for Error {
    fn from(body: ErrorBody) -> Self {
        Error::Api {
            status: body.code,
            message: body.message,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Default)]
struct Part {
    text: Option<String>,
    /// Thought summaries are not part of the answer
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize, Default)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Deserialize, Default)]
struct WebChunk {
    title: Option<String>,
    uri: Option<String>,
}

impl ResponseBody {
    /// Answer text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn sources(&self) -> Vec<Source> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .map(|web| Source {
                        title: web.title.clone(),
                        uri: web.uri.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn into_generation(mut self) -> Result<Generation> {
        if let Some(error) = self.error.take() {
            return Err(error.into());
        }
        Ok(Generation {
            text: self.text(),
            sources: self.sources(),
        })
    }
}
