use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

use crate::buffers::PartialBuffers;
use crate::clock::now_ms;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
}

impl Sender {
    pub fn display_name(self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Ai => "Copilot",
            Sender::System => "System",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Sender,
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<PartialBuffers>,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl ChatMessage {
    pub fn with_code(mut self, code: PartialBuffers) -> Self {
        if !code.is_empty() {
            self.code = Some(code);
        }
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct ChatHistory {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
    next_id: u64,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ChatHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    pub fn push(&mut self, sender: Sender, content: impl Into<String>) -> &mut ChatMessage {
        let message = ChatMessage {
            id: self.next_id,
            sender,
            name: sender.display_name().to_string(),
            content: content.into(),
            code: None,
            timestamp: now_ms(),
            metadata: BTreeMap::new(),
        };
        self.append(message)
    }

    pub fn append(&mut self, mut message: ChatMessage) -> &mut ChatMessage {
        message.id = self.next_id;
        self.next_id += 1;
        if self.messages.len() == self.capacity {
            if let Some(evicted) = self.messages.pop_front() {
                debug!(id = evicted.id, "chat history evicted oldest message");
            }
        }
        self.messages.push_back(message);
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.back()
    }

    pub fn to_vec(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestTicket(u64);

#[derive(Clone, Debug, Default)]
pub struct ChatState {
    pub history: ChatHistory,
    in_flight: Option<RequestTicket>,
    next_ticket: u64,
}

impl ChatState {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: ChatHistory::with_capacity(capacity),
            in_flight: None,
            next_ticket: 0,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn begin_request(&mut self, prompt: &str) -> Option<RequestTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        self.history.push(Sender::User, prompt);
        self.next_ticket += 1;
        let ticket = RequestTicket(self.next_ticket);
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    /// Clears the waiting flag for `ticket`. A ticket that was cancelled by
    /// `emergency_stop` returns false and its response should be dropped.
    pub fn finish_request(&mut self, ticket: RequestTicket) -> bool {
        if self.in_flight != Some(ticket) {
            debug!(?ticket, "dropping response for cancelled request");
            return false;
        }
        self.in_flight = None;
        true
    }

    pub fn emergency_stop(&mut self) -> bool {
        if self.in_flight.take().is_none() {
            return false;
        }
        info!("copilot request stopped by user");
        self.history.push(Sender::System, "Generation stopped.");
        true
    }
}
