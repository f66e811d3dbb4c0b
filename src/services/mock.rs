use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use reqwest::Url;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::catalog::ProductCatalog;
use super::openai::{ChatRequest, ChatTransport, TransportResponse};
use super::secrets::SecretStore;
use crate::error::GatewayError;
use crate::models::Product;

/// Canned chat transport that counts calls and records the last request.
pub struct MockTransport {
    status: u16,
    body: String,
    calls: AtomicUsize,
    last: Mutex<Option<(String, Value)>>,
}

impl MockTransport {
    pub fn with_response(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// 200 response wrapping `content` in a chat-completion envelope.
    pub fn with_content(content: &str) -> Self {
        let body = serde_json::json!({
            "id": "chatcmpl-test",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content }
            }]
        });
        Self::with_response(200, &body.to_string())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, Value)> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatTransport for MockTransport {
    async fn post_json(
        &self,
        _url: &Url,
        api_key: &str,
        body: &ChatRequest,
    ) -> Result<TransportResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let value = serde_json::to_value(body).unwrap();
        *self.last.lock().unwrap() = Some((api_key.to_string(), value));
        Ok(TransportResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Catalog that resolves one product JSON document for any barcode.
pub struct MockCatalog {
    document: Value,
    calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new(document: Value) -> Self {
        Self {
            document,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProductCatalog for MockCatalog {
    async fn lookup(&self, barcode: &str) -> Result<Product, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        super::catalog::product_from_document(barcode, &self.document)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySecrets {
    values: HashMap<String, String>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl SecretStore for MemorySecrets {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Local server that accepts connections and never answers. Returns its base URL.
pub async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{}", addr)
}

/// Local server answering every request with the given status line and body.
pub async fn canned_server(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}", addr)
}
