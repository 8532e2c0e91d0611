//! OpenAI Chat Completions compatible gateway (`/chat/completions`).
//!
//! Works with any provider exposing that endpoint (DeepSeek, OpenAI, local
//! servers). Attachments are inlined into the user message as a labelled text
//! block.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::gateway::{AiGateway, Attachment, GatewayError};

/// Default endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
/// Default model.
pub const DEFAULT_MODEL: &str = "deepseek-chat";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Connection settings for [`OpenAiCompatGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL without the `/chat/completions` suffix
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Bearer token; no `Authorization` header when absent
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Gateway speaking the OpenAI chat completions protocol.
pub struct OpenAiCompatGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl OpenAiCompatGateway {
    /// Create a gateway.
    pub fn new(mut config: GatewayConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self { client: reqwest::Client::new(), config }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn payload(&self, prompt: &str, attachment: Option<&Attachment>, stream: bool) -> Value {
        json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": user_message(prompt, attachment) }],
            "temperature": self.config.temperature,
            "stream": stream,
        })
    }

    async fn read_stream(&self, mut response: reqwest::Response) -> Result<String, GatewayError> {
        let mut decoder = SseDecoder::default();
        let mut text = String::new();

        'outer: while let Some(chunk) = response.chunk().await? {
            for line in decoder.feed(&chunk) {
                match parse_sse_line(&line) {
                    SseLine::Delta(delta) => text.push_str(&delta),
                    SseLine::Done => break 'outer,
                    SseLine::Skip => {}
                }
            }
        }
        for line in decoder.finish() {
            if let SseLine::Delta(delta) = parse_sse_line(&line) {
                text.push_str(&delta);
            }
        }

        if text.is_empty() {
            return Err(GatewayError::MalformedResponse("stream carried no content".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl AiGateway for OpenAiCompatGateway {
    async fn complete(
        &self,
        prompt: &str,
        attachment: Option<&Attachment>,
        stream: bool,
    ) -> Result<String, GatewayError> {
        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            attachment = attachment.map(|a| a.file_name.as_str()),
            stream,
            "Calling chat completions"
        );

        let mut request = self.client.post(self.url()).json(&self.payload(prompt, attachment, stream));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body);
            error!(status = status.as_u16(), %message, "Chat completions failed");
            return Err(GatewayError::Api { status: status.as_u16(), message });
        }

        let text = if stream {
            self.read_stream(response).await?
        } else {
            let body: Value = response.json().await?;
            completion_text(&body)?
        };

        debug!(response_len = text.len(), "Chat completions succeeded");
        Ok(text)
    }
}

fn user_message(prompt: &str, attachment: Option<&Attachment>) -> String {
    match attachment {
        None => prompt.to_string(),
        Some(file) => format!(
            "{}\n\n--- Attached file: {} ---\n{}\n--- End of {} ---",
            prompt, file.file_name, file.content, file.file_name
        ),
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn completion_text(body: &Value) -> Result<String, GatewayError> {
    if let Some(message) = body["error"]["message"].as_str() {
        return Err(GatewayError::Api { status: 200, message: message.to_string() });
    }
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GatewayError::MalformedResponse("missing choices[0].message.content".to_string()))
}

/// Splits a byte stream into complete lines.
///
/// Chunks may end mid-line or mid-character, so bytes are held until a
/// newline arrives.
#[derive(Debug, Default)]
struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim_end().to_string());
        }
        lines
    }

    fn finish(&mut self) -> Vec<String> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.pending);
        vec![String::from_utf8_lossy(&rest).trim_end().to_string()]
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(v) => match v["choices"][0]["delta"]["content"].as_str() {
            Some(s) if !s.is_empty() => SseLine::Delta(s.to_string()),
            _ => SseLine::Skip,
        },
        Err(_) => SseLine::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_lines_and_utf8() {
        let mut decoder = SseDecoder::default();
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"日本\"}}]}\n";
        let bytes = line.as_bytes();
        // split inside a multi-byte character
        let split = line.find('本').unwrap() + 1;

        assert!(decoder.feed(&bytes[..split]).is_empty());
        let lines = decoder.feed(&bytes[split..]);
        assert_eq!(lines.len(), 1);
        assert_eq!(parse_sse_line(&lines[0]), SseLine::Delta("日本".to_string()));
    }

    #[test]
    fn test_parse_sse_lines() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: {\"choices\":[{\"delta\":{}}]}"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: not json"), SseLine::Skip);
    }

    #[test]
    fn test_finish_flushes_trailing_line() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec!["data: [DONE]".to_string()]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_completion_text() {
        let body = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(completion_text(&body).unwrap(), "hi");

        let body = json!({"error": {"message": "quota"}});
        assert!(matches!(completion_text(&body), Err(GatewayError::Api { .. })));

        let body = json!({"choices": []});
        assert!(matches!(completion_text(&body), Err(GatewayError::MalformedResponse(_))));
    }

    #[test]
    fn test_user_message_inlines_attachment() {
        let file = Attachment::new("notes.md", "# Notes");
        let msg = user_message("Summarise", Some(&file));
        assert!(msg.starts_with("Summarise\n\n--- Attached file: notes.md ---\n# Notes"));
        assert_eq!(user_message("plain", None), "plain");
    }

    #[test]
    fn test_payload_shape() {
        let gateway = OpenAiCompatGateway::new(GatewayConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..GatewayConfig::default()
        });
        assert_eq!(gateway.url(), "http://localhost:8080/v1/chat/completions");
        let payload = gateway.payload("p", None, true);
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["model"], DEFAULT_MODEL);
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(api_error_message(r#"{"error":{"message":"bad key"}}"#), "bad key");
        assert_eq!(api_error_message("gateway timeout"), "gateway timeout");
    }
}
