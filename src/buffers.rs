use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

use crate::clock::now_ms;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    #[default]
    Markup,
    Style,
    Logic,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Markup, Slot::Style, Slot::Logic];

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Markup => "markup",
            Slot::Style => "style",
            Slot::Logic => "logic",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::Markup => "HTML",
            Slot::Style => "SCSS",
            Slot::Logic => "TypeScript",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBuffers {
    #[serde(default)]
    pub markup: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub logic: String,
}

impl CodeBuffers {
    pub fn new(
        markup: impl Into<String>,
        style: impl Into<String>,
        logic: impl Into<String>,
    ) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
            logic: logic.into(),
        }
    }

    pub fn get(&self, slot: Slot) -> &str {
        match slot {
            Slot::Markup => &self.markup,
            Slot::Style => &self.style,
            Slot::Logic => &self.logic,
        }
    }

    pub fn set(&mut self, slot: Slot, text: impl Into<String>) {
        let text = text.into();
        match slot {
            Slot::Markup => self.markup = text,
            Slot::Style => self.style = text,
            Slot::Logic => self.logic = text,
        }
    }

    pub fn is_blank(&self) -> bool {
        Slot::ALL.iter().all(|slot| self.get(*slot).trim().is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBuffers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
}

impl PartialBuffers {
    pub fn one(slot: Slot, text: impl Into<String>) -> Self {
        Self::default().with(slot, text)
    }

    pub fn with(mut self, slot: Slot, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match slot {
            Slot::Markup => self.markup = text,
            Slot::Style => self.style = text,
            Slot::Logic => self.logic = text,
        }
        self
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Markup => self.markup.as_deref(),
            Slot::Style => self.style.as_deref(),
            Slot::Logic => self.logic.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Slot::ALL.iter().all(|slot| self.get(*slot).is_none())
    }
}

impl From<CodeBuffers> for PartialBuffers {
    fn from(buffers: CodeBuffers) -> Self {
        Self {
            markup: Some(buffers.markup),
            style: Some(buffers.style),
            logic: Some(buffers.logic),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferSnapshot {
    pub buffers: CodeBuffers,
    pub active: Slot,
    pub dirty: bool,
    pub revision: u64,
    pub modified_at: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&BufferSnapshot)>;

pub struct BufferStore {
    buffers: CodeBuffers,
    active: Slot,
    dirty: bool,
    revision: u64,
    modified_at: Option<u64>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl Default for BufferStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BufferStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferStore")
            .field("buffers", &self.buffers)
            .field("active", &self.active)
            .field("dirty", &self.dirty)
            .field("revision", &self.revision)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl BufferStore {
    pub fn new() -> Self {
        Self {
            buffers: CodeBuffers::default(),
            active: Slot::default(),
            dirty: false,
            revision: 0,
            modified_at: None,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn get(&self) -> &CodeBuffers {
        &self.buffers
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            buffers: self.buffers.clone(),
            active: self.active,
            dirty: self.dirty,
            revision: self.revision,
            modified_at: self.modified_at,
        }
    }

    /// Registers a callback run after every state change. Callbacks must not
    /// call back into the store.
    pub fn subscribe(&mut self, callback: impl FnMut(&BufferSnapshot) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Merges the provided slots. Returns false, and notifies nobody, when the
    /// merged result equals the current content.
    pub fn update(&mut self, partial: &PartialBuffers) -> bool {
        let mut next = self.buffers.clone();
        for slot in Slot::ALL {
            if let Some(text) = partial.get(slot) {
                next.set(slot, text);
            }
        }
        if next == self.buffers {
            return false;
        }
        self.buffers = next;
        self.mark_modified();
        debug!(revision = self.revision, "buffers updated");
        self.notify();
        true
    }

    pub fn update_one(&mut self, slot: Slot, text: impl Into<String>) -> bool {
        self.update(&PartialBuffers::one(slot, text))
    }

    pub fn clear(&mut self) {
        self.buffers = CodeBuffers::default();
        self.revision += 1;
        self.modified_at = Some(now_ms());
        self.dirty = false;
        debug!(revision = self.revision, "buffers cleared");
        self.notify();
    }

    pub fn set_active_slot(&mut self, slot: Slot) {
        if self.active == slot {
            return;
        }
        self.active = slot;
        self.notify();
    }

    pub fn active_slot(&self) -> Slot {
        self.active
    }

    pub fn active_text(&self) -> &str {
        self.buffers.get(self.active)
    }

    pub fn export(&self) -> CodeBuffers {
        self.buffers.clone()
    }

    /// Wholesale replace. Always counts as a change, even for equal content.
    pub fn import(&mut self, buffers: CodeBuffers) {
        self.buffers = buffers;
        self.mark_modified();
        debug!(revision = self.revision, "buffers imported");
        self.notify();
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_blank()
    }

    pub fn has_code(&self) -> bool {
        !self.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        self.dirty
    }

    pub fn reset_changes(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.notify();
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn modified_at(&self) -> Option<u64> {
        self.modified_at
    }

    pub fn validate(slot: Slot, text: &str) -> Validation {
        validate_slot(slot, text)
    }

    fn mark_modified(&mut self) {
        self.dirty = true;
        self.revision += 1;
        self.modified_at = Some(now_ms());
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, callback) in &mut self.subscribers {
            callback(&snapshot);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn validate_slot(slot: Slot, text: &str) -> Validation {
    let mut errors = Vec::new();
    match slot {
        Slot::Logic => {
            check_pair(text, '{', '}', "braces", &mut errors);
            check_pair(text, '(', ')', "parentheses", &mut errors);
        }
        Slot::Style => check_pair(text, '{', '}', "braces", &mut errors),
        Slot::Markup => {
            let (open, close) = count_tags(text);
            if open != close {
                errors.push(format!(
                    "Unclosed or stray tags: {open} opening, {close} closing"
                ));
            }
        }
    }
    Validation {
        valid: errors.is_empty(),
        errors,
    }
}

fn check_pair(text: &str, open: char, close: char, what: &str, errors: &mut Vec<String>) {
    let opened = text.chars().filter(|c| *c == open).count();
    let closed = text.chars().filter(|c| *c == close).count();
    if opened != closed {
        errors.push(format!("Unbalanced {what}: {opened} '{open}' vs {closed} '{close}'"));
    }
}

fn count_tags(text: &str) -> (usize, usize) {
    static RE_OPEN: OnceLock<Regex> = OnceLock::new();
    static RE_CLOSE: OnceLock<Regex> = OnceLock::new();

    let re_open =
        RE_OPEN.get_or_init(|| Regex::new(r"<([a-zA-Z][a-zA-Z0-9-]*)\b[^>]*>").unwrap());
    let re_close = RE_CLOSE.get_or_init(|| Regex::new(r"</[a-zA-Z][a-zA-Z0-9-]*\s*>").unwrap());

    let open = re_open
        .captures_iter(text)
        .filter(|cap| {
            let whole = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
            let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            !whole.ends_with("/>") && !VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
        })
        .count();
    let close = re_close.find_iter(text).count();
    (open, close)
}
