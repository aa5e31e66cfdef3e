//! Built-in `normalize` transform stage.
//!
//! Cleans raw transcription output: strips engine artifacts like
//! `[BLANK_AUDIO]` or `(inaudible)`, collapses runs of whitespace, and trims
//! the ends. Pure text work, no configuration required.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::stage::{Stage, StageOutcome};

pub struct NormalizeStage;

#[async_trait]
impl Stage for NormalizeStage {
    fn type_id(&self) -> &str {
        "normalize"
    }

    async fn execute(
        &self,
        text: &str,
        _config: &HashMap<String, serde_json::Value>,
    ) -> Result<StageOutcome, PipelineError> {
        Ok(StageOutcome::Transform(normalize(text)))
    }
}

/// Strip bracketed engine artifacts and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let stripped = strip_delimited(text, '[', ']');
    let stripped = strip_delimited(&stripped, '(', ')');

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `open`..`close` delimited spans. Unbalanced delimiters are left
/// in place.
fn strip_delimited(text: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        if c == open {
            depth += 1;
        } else if c == close && depth > 0 {
            depth -= 1;
        } else if depth == 0 {
            out.push(c);
        }
    }
    out
}
