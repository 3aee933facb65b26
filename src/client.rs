use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::state::Message;

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<Message>,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

/// Body of `GET /api/status`
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(default)]
    pub ai_providers: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ServiceStatus {
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online")
    }
}

/// Anything that can turn a chat request into the assistant's reply text
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn status(&self) -> Result<ServiceStatus, ChatError> {
        let url = format!("{}/api/status", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn send(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status()));
        }

        // Decode by hand so a missing `response` field surfaces as Malformed
        let body = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&body)?;
        Ok(chat_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one HTTP response and hand back the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&raw).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let headers = text[..header_end].to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn request_body(raw: &str) -> serde_json::Value {
        let body = raw.split("\r\n\r\n").nth(1).unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn sample_request() -> ChatRequest {
        ChatRequest {
            message: "Hello".to_string(),
            conversation_history: vec![Message::user("earlier"), Message::assistant("reply")],
        }
    }

    #[tokio::test]
    async fn test_send_returns_response_field() {
        let (url, server) = serve_once("200 OK", r#"{"response":"Hi!","status":"success"}"#).await;
        let client = ChatClient::new(&url);

        let reply = client.send(&sample_request()).await.unwrap();
        assert_eq!(reply, "Hi!");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/chat "));
        let body = request_body(&raw);
        assert_eq!(body["message"], "Hello");
        assert_eq!(body["conversation_history"][0]["role"], "user");
        assert_eq!(body["conversation_history"][1]["content"], "reply");
    }

    #[tokio::test]
    async fn test_send_server_error_is_status_error() {
        let (url, _server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
        let client = ChatClient::new(&url);

        let err = client.send(&sample_request()).await.unwrap_err();
        assert!(matches!(err, ChatError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_send_missing_response_field_is_malformed() {
        let (url, _server) = serve_once("200 OK", r#"{"status":"success"}"#).await;
        let client = ChatClient::new(&url);

        let err = client.send(&sample_request()).await.unwrap_err();
        assert!(matches!(err, ChatError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_send_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ChatClient::new(&format!("http://{}", addr));
        let err = client.send(&sample_request()).await.unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
    }

    #[tokio::test]
    async fn test_status_parses_providers() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"status":"online","ai_providers":["Groq (Free & Fast)"],"message":"Chatbot API is running"}"#,
        )
        .await;
        let client = ChatClient::new(&format!("{}/", url));

        let status = client.status().await.unwrap();
        assert!(status.is_online());
        assert_eq!(status.ai_providers, vec!["Groq (Free & Fast)".to_string()]);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /api/status "));
    }
}
