use async_trait::async_trait;
use bridge_traits::auth::{AuthCodeReceiver, AuthorizationPrompt};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::SecureStore;
use bytes::Bytes;
use mockall::mock;
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn is_connected(&self) -> bool;
    }
}

pub fn json_response(status: u16, body: &str) -> HttpResponse {
    let mut headers = HashMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    HttpResponse {
        status,
        headers,
        body: Bytes::from(body.to_string()),
    }
}

pub fn body_of(request: &HttpRequest) -> String {
    String::from_utf8_lossy(request.body.as_deref().unwrap_or_default()).into_owned()
}

#[derive(Default)]
pub struct MemorySecureStore {
    storage: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.storage
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.storage.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.storage.lock().await.remove(key);
        Ok(())
    }
}

/// Hands out a fixed code and records every prompt it was shown.
pub struct ScriptedReceiver {
    code: Option<String>,
    delay: Option<Duration>,
    pub prompts: StdMutex<Vec<AuthorizationPrompt>>,
}

impl ScriptedReceiver {
    pub fn answering(code: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            delay: None,
            prompts: StdMutex::new(Vec::new()),
        }
    }

    pub fn silent() -> Self {
        Self {
            code: None,
            delay: Some(Duration::from_secs(3600)),
            prompts: StdMutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AuthCodeReceiver for ScriptedReceiver {
    async fn receive_code(&self, prompt: &AuthorizationPrompt) -> BridgeResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.code
            .clone()
            .ok_or_else(|| BridgeError::NotAvailable("no code".to_string()))
    }
}
