use async_trait::async_trait;
use base64::Engine as _;
use futures_util::StreamExt;

use crate::errors::{ClickSightError, ClickSightResult};
use crate::grounding::parse::parse_normalized_pair;
use crate::grounding::provider::GroundingModel;
use crate::grounding::sse_parser;
use crate::grounding::types::{
    CallConfig, ChatMessage, ContentPart, ImageUrl, MessageContent, StreamChunkKind,
};
use crate::perception::types::NormalizedPoint;

pub const GROUNDING_PROMPT: &str = "Based on the screenshot of the page, I give a text \
description and you give its corresponding location. The coordinate represents a clickable \
location [x, y] for an element, which is a relative coordinate on the screenshot, scaled \
from 0 to 1.";

/// Grounding model served behind an OpenAI-compatible chat-completions
/// endpoint (vLLM, TGI, LM Studio, ...).
pub struct OpenAiCompatibleGrounder {
    id: String,
    api_base: String,
    api_key: String,
    call: CallConfig,
    client: reqwest::Client,
}

impl OpenAiCompatibleGrounder {
    pub fn new(id: String, api_base: String, api_key: String, call: CallConfig) -> Self {
        Self {
            id,
            api_base,
            api_key,
            call,
            client: reqwest::Client::new(),
        }
    }

    fn build_messages(image_png: &[u8], query: &str) -> Vec<ChatMessage> {
        let b64 = base64::engine::general_purpose::STANDARD.encode(image_png);
        vec![ChatMessage {
            role: "user".into(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: GROUNDING_PROMPT.into(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/png;base64,{b64}"),
                    },
                },
                ContentPart::Text {
                    text: query.to_string(),
                },
            ]),
        }]
    }
}

#[async_trait]
impl GroundingModel for OpenAiCompatibleGrounder {
    fn name(&self) -> &str {
        &self.id
    }

    async fn locate(&self, image_png: &[u8], query: &str) -> ClickSightResult<NormalizedPoint> {
        let messages = Self::build_messages(image_png, query);
        let body = serde_json::json!({
            "model": self.call.model,
            "messages": &messages,
            "stream": self.call.stream,
            "temperature": self.call.temperature,
            "max_tokens": self.call.max_tokens,
        });

        tracing::debug!(
            provider = %self.id,
            model = %self.call.model,
            stream = self.call.stream,
            image_bytes = image_png.len(),
            query = %query,
            "sending grounding request"
        );

        let mut request = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(ClickSightError::Model(format!("{status}: {err_body}")));
        }

        let text = if self.call.stream {
            collect_stream(response).await?
        } else {
            collect_json(response).await?
        };

        tracing::info!(provider = %self.id, output = %text, "grounding model answered");
        parse_normalized_pair(&text)
    }
}

/// Splits a byte stream into lines. Bytes are held until a newline arrives,
/// so a UTF-8 sequence split across network chunks is decoded whole.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }
}

/// Accumulate content deltas from an SSE response.
async fn collect_stream(response: reqwest::Response) -> ClickSightResult<String> {
    let mut byte_stream = response.bytes_stream();
    let mut lines = LineBuffer::default();
    let mut content = String::new();

    'stream: while let Some(result) = byte_stream.next().await {
        lines.push(&result?);

        while let Some(line) = lines.next_line() {
            if line.is_empty() {
                continue;
            }
            match sse_parser::parse_sse_line(&line) {
                Ok(Some(chunk)) => match chunk.kind {
                    StreamChunkKind::Content => content.push_str(&chunk.content),
                    StreamChunkKind::Done => break 'stream,
                    StreamChunkKind::Reasoning => {}
                },
                Ok(None) => {}
                Err(e) => tracing::debug!("SSE parse skipped: {e}"),
            }
        }
    }

    Ok(content)
}

async fn collect_json(response: reqwest::Response) -> ClickSightResult<String> {
    let json: serde_json::Value = response.json().await?;
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            ClickSightError::ModelContractViolation(format!(
                "response has no message content: {json}"
            ))
        })
}
