//! Test doubles for the `llm` module.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::llm::ai::{AiClient, AiClientMetadata, AiFuture};

/// AI client that replays scripted replies in order and records every
/// `(system, user)` prompt pair it receives. Once the script runs out every
/// call fails.
pub(crate) struct ScriptedAiClient {
    replies: Mutex<VecDeque<Result<String>>>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedAiClient {
    pub(crate) fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Arc::default(),
        }
    }

    /// Shared view of the prompts, usable after the client moved into a
    /// provider.
    pub(crate) fn sent_prompts(&self) -> SentPrompts {
        SentPrompts(self.sent.clone())
    }
}

pub(crate) struct SentPrompts(Arc<Mutex<Vec<(String, String)>>>);

impl SentPrompts {
    pub(crate) fn all(&self) -> Vec<(String, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl AiClient for ScriptedAiClient {
    fn send_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> AiFuture<'a> {
        Box::pin(async move {
            self.sent
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "Scripted".to_string(),
            model: "scripted".to_string(),
            endpoint: "scripted://".to_string(),
        }
    }
}
