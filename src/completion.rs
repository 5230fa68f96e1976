use serde::{Deserialize, Serialize};

use crate::buffers::CodeBuffers;
use crate::chat::{ChatHistory, Sender};
use crate::error::CompletionError;

pub const CONTEXT_TURNS: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryTurn {
    pub role: Sender,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub code: CodeBuffers,
    pub history: Vec<HistoryTurn>,
}

impl CompletionRequest {
    pub fn new(prompt: &str, code: CodeBuffers, history: &ChatHistory) -> Self {
        let turns: Vec<HistoryTurn> = history
            .iter()
            .filter(|m| m.sender != Sender::System)
            .map(|m| HistoryTurn {
                role: m.sender,
                content: m.content.clone(),
            })
            .collect();
        let skip = turns.len().saturating_sub(CONTEXT_TURNS);
        Self {
            prompt: prompt.to_string(),
            code,
            history: turns.into_iter().skip(skip).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, CompletionError> {
        serde_json::to_string(self).map_err(|e| CompletionError::Request(e.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub model: Option<String>,
}

pub fn decode_response(raw: &str) -> Result<CompletionResponse, CompletionError> {
    serde_json::from_str(raw).map_err(|e| CompletionError::Payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_keeps_recent_non_system_turns() {
        let mut history = ChatHistory::default();
        history.push(Sender::System, "welcome");
        for i in 0..8 {
            history.push(Sender::User, format!("u{i}"));
        }
        let request = CompletionRequest::new("next", CodeBuffers::default(), &history);
        assert_eq!(request.history.len(), CONTEXT_TURNS);
        assert_eq!(request.history[0].content, "u2");
        assert!(request.to_json().unwrap().contains("\"role\":\"user\""));
    }

    #[test]
    fn decodes_payloads() {
        assert_eq!(
            decode_response(r#"{"content":"hi","model":"m1"}"#).unwrap(),
            CompletionResponse {
                content: "hi".to_string(),
                model: Some("m1".to_string()),
            }
        );
        assert!(matches!(
            decode_response(r#"{"text":"hi"}"#),
            Err(CompletionError::Payload(_))
        ));
    }
}
