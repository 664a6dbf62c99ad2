//! In-process code handoff.
//!
//! [`ChannelCodeReceiver`] lets a host that owns its own UI (a GUI, a test, an
//! IPC bridge) answer the interactive step: the session manager's prompt is
//! published on a channel and the host submits the code through a
//! [`CodeSubmitter`].

use async_trait::async_trait;
use bridge_traits::auth::{AuthCodeReceiver, AuthorizationPrompt};
use bridge_traits::error::{BridgeError, Result};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// [`AuthCodeReceiver`] fed through tokio channels.
pub struct ChannelCodeReceiver {
    prompts: mpsc::UnboundedSender<AuthorizationPrompt>,
    codes: Mutex<mpsc::Receiver<String>>,
}

/// Host side of a [`ChannelCodeReceiver`].
pub struct CodeSubmitter {
    prompts: mpsc::UnboundedReceiver<AuthorizationPrompt>,
    codes: mpsc::Sender<String>,
}

impl ChannelCodeReceiver {
    pub fn new() -> (Self, CodeSubmitter) {
        let (prompt_tx, prompt_rx) = mpsc::unbounded_channel();
        let (code_tx, code_rx) = mpsc::channel(1);

        (
            Self {
                prompts: prompt_tx,
                codes: Mutex::new(code_rx),
            },
            CodeSubmitter {
                prompts: prompt_rx,
                codes: code_tx,
            },
        )
    }
}

impl CodeSubmitter {
    /// Wait for the next prompt. `None` once the receiver is dropped.
    pub async fn next_prompt(&mut self) -> Option<AuthorizationPrompt> {
        self.prompts.recv().await
    }

    /// Hand a code to the waiting session manager.
    pub async fn submit(&self, code: impl Into<String>) -> Result<()> {
        self.codes
            .send(code.into())
            .await
            .map_err(|_| BridgeError::NotAvailable("Code receiver was dropped".to_string()))
    }
}

#[async_trait]
impl AuthCodeReceiver for ChannelCodeReceiver {
    async fn receive_code(&self, prompt: &AuthorizationPrompt) -> Result<String> {
        if self.prompts.send(prompt.clone()).is_err() {
            debug!("No listener for authorization prompts");
        }

        self.codes.lock().await.recv().await.ok_or_else(|| {
            BridgeError::NotAvailable("Authorization code channel closed".to_string())
        })
    }
}
