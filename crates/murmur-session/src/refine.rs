//! Refinement backends.
//!
//! Two implementations of [`RefinementService`] ship with the core: a local
//! rule-based cleanup that needs no network, and an HTTP chat-completion
//! client for model-backed rewriting. Selection happens in configuration at
//! the composition root.

use async_trait::async_trait;
use murmur_core::config::RefinementConfig;
use murmur_core::types::RefinementMode;
use murmur_core::{MurmurError, Result};
use serde::{Deserialize, Serialize};

use crate::services::RefinementService;

/// Local, deterministic cleanup: collapses whitespace, strips common spoken
/// fillers, capitalizes sentence starts, and ensures terminal punctuation.
pub struct RuleRefiner;

const FILLERS: &[&str] = &["um", "uh", "erm", "hmm"];

impl RuleRefiner {
    fn cleanup(text: &str) -> String {
        let words: Vec<&str> = text
            .split_whitespace()
            .filter(|w| {
                let bare = w.trim_matches(|c: char| c.is_ascii_punctuation());
                !FILLERS.contains(&bare.to_ascii_lowercase().as_str())
            })
            .collect();
        let joined = words.join(" ");
        if joined.is_empty() {
            return joined;
        }

        let mut out = String::with_capacity(joined.len() + 1);
        let mut capitalize = true;
        for c in joined.chars() {
            if capitalize && c.is_alphabetic() {
                out.extend(c.to_uppercase());
                capitalize = false;
            } else {
                out.push(c);
            }
            if matches!(c, '.' | '!' | '?') {
                capitalize = true;
            }
        }
        if !out.ends_with(['.', '!', '?']) {
            out.push('.');
        }
        out
    }
}

#[async_trait]
impl RefinementService for RuleRefiner {
    async fn refine(
        &self,
        text: &str,
        mode: RefinementMode,
        _custom_prompt: Option<&str>,
    ) -> Result<String> {
        // The rule backend only does cleanup; other modes degrade to it.
        if mode != RefinementMode::Cleanup {
            tracing::debug!(?mode, "Rule refiner falling back to cleanup");
        }
        Ok(Self::cleanup(text))
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// HTTP chat-completion refinement backend.
pub struct ChatRefiner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl ChatRefiner {
    pub fn new(config: &RefinementConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    fn system_prompt(mode: &RefinementMode, custom_prompt: Option<&str>) -> String {
        match mode {
            RefinementMode::Cleanup => {
                "Clean up this dictated text. Fix punctuation, casing, and \
                 remove filler words. Reply with the cleaned text only."
                    .to_string()
            }
            RefinementMode::Formal => {
                "Rewrite this dictated text in a formal register. Reply with \
                 the rewritten text only."
                    .to_string()
            }
            RefinementMode::Custom => custom_prompt
                .unwrap_or("Improve this dictated text. Reply with the text only.")
                .to_string(),
        }
    }
}

#[async_trait]
impl RefinementService for ChatRefiner {
    async fn refine(
        &self,
        text: &str,
        mode: RefinementMode,
        custom_prompt: Option<&str>,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Self::system_prompt(&mode, custom_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: text.to_string(),
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| MurmurError::Refinement(format!("Chat request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MurmurError::Refinement(format!(
                "Chat backend returned {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| MurmurError::Refinement(format!("Malformed chat response: {}", e)))?;

        let refined = body.message.content.trim().to_string();
        if refined.is_empty() {
            return Err(MurmurError::Refinement(
                "Chat backend returned empty content".to_string(),
            ));
        }
        tracing::debug!(model = %self.model, chars = refined.len(), "Refinement completed");
        Ok(refined)
    }
}

// =============================================================================
// Tests
// =============================================================================
