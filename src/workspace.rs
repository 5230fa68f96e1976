use tracing::{info, warn};

use crate::buffers::{BufferStore, CodeBuffers, Slot};
use crate::chat::{ChatState, RequestTicket, Sender};
use crate::completion::{CompletionRequest, CompletionResponse};
use crate::diff::{generate_diff, DiffResult};
use crate::error::CompletionError;
use crate::fence;
use crate::settings::Settings;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    Dropped,
    Conversation,
    Applied(Vec<Slot>),
    PendingReview,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyChoice<'a> {
    Changed,
    All,
    Slots(&'a [Slot]),
}

#[derive(Debug)]
pub struct Workspace {
    pub store: BufferStore,
    pub chat: ChatState,
    pending: Option<DiffResult>,
    rollback: Option<CodeBuffers>,
    auto_apply: bool,
}

impl Workspace {
    pub fn new(store: BufferStore, settings: &Settings) -> Self {
        Self {
            store,
            chat: ChatState::new(settings.history_capacity),
            pending: None,
            rollback: None,
            auto_apply: settings.auto_apply,
        }
    }

    pub fn set_auto_apply(&mut self, enabled: bool) {
        self.auto_apply = enabled;
    }

    pub fn submit_prompt(&mut self, prompt: &str) -> Option<(RequestTicket, CompletionRequest)> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        let request = CompletionRequest::new(prompt, self.store.export(), &self.chat.history);
        let ticket = self.chat.begin_request(prompt)?;
        info!(chars = prompt.len(), "copilot prompt submitted");
        Some((ticket, request))
    }

    pub fn receive_response(
        &mut self,
        ticket: RequestTicket,
        response: CompletionResponse,
    ) -> ResponseOutcome {
        if !self.chat.finish_request(ticket) {
            return ResponseOutcome::Dropped;
        }
        let parsed = fence::parse(&response.content);
        let code = parsed.to_editor_buffers();
        let message = self.chat.history.push(Sender::Ai, response.content);
        if let Some(model) = response.model {
            message.metadata.insert("model".to_string(), model.into());
        }
        if !parsed.has_code || code.is_empty() {
            return ResponseOutcome::Conversation;
        }
        message.code = Some(code.clone());

        let diff = generate_diff(self.store.get(), &code);
        if !diff.has_any_changes {
            return ResponseOutcome::Conversation;
        }
        if self.auto_apply {
            let slots = diff.changed_slots.clone();
            self.rollback = Some(self.store.export());
            diff.apply_changed(&mut self.store);
            info!(?slots, "copilot output applied");
            return ResponseOutcome::Applied(slots);
        }
        self.pending = Some(diff);
        ResponseOutcome::PendingReview
    }

    pub fn receive_failure(&mut self, ticket: RequestTicket, err: &CompletionError) {
        if !self.chat.finish_request(ticket) {
            return;
        }
        warn!(error = %err, "copilot request failed");
        self.chat
            .history
            .push(Sender::System, format!("The copilot could not answer: {err}"));
    }

    pub fn pending(&self) -> Option<&DiffResult> {
        self.pending.as_ref()
    }

    pub fn apply_pending(&mut self, choice: ApplyChoice<'_>) -> bool {
        let Some(diff) = self.pending.take() else {
            return false;
        };
        let before = self.store.export();
        let changed = match choice {
            ApplyChoice::Changed => diff.apply_changed(&mut self.store),
            ApplyChoice::All => diff.apply_all(&mut self.store),
            ApplyChoice::Slots(slots) => diff.apply_slots(&mut self.store, slots),
        };
        if changed {
            self.rollback = Some(before);
        }
        changed
    }

    pub fn discard_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn can_rollback(&self) -> bool {
        self.rollback.is_some()
    }

    pub fn rollback(&mut self) -> bool {
        let Some(previous) = self.rollback.take() else {
            return false;
        };
        self.store.import(previous);
        true
    }

    pub fn emergency_stop(&mut self) -> bool {
        self.chat.emergency_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            model: None,
        }
    }

    fn workspace(auto_apply: bool) -> Workspace {
        let settings = Settings {
            auto_apply,
            ..Settings::default()
        };
        Workspace::new(BufferStore::new(), &settings)
    }

    const ANSWER: &str =
        "Sure:\n```html\n<button>Go</button>\n```\n```scss\nbutton { color: red; }\n```";

    #[test]
    fn response_with_code_waits_for_review() {
        let mut ws = workspace(false);
        let (ticket, request) = ws.submit_prompt("  a red button ").unwrap();
        assert_eq!(request.prompt, "a red button");
        assert!(ws.chat.is_waiting());

        assert_eq!(ws.receive_response(ticket, response(ANSWER)), ResponseOutcome::PendingReview);
        assert!(!ws.chat.is_waiting());
        assert!(ws.store.is_empty());
        assert_eq!(
            ws.pending().map(|d| d.changed_slots.clone()),
            Some(vec![Slot::Markup, Slot::Style])
        );

        assert!(ws.apply_pending(ApplyChoice::Slots(&[Slot::Markup])));
        assert_eq!(ws.store.get().markup, "<button>Go</button>");
        assert_eq!(ws.store.get().style, "");
        assert!(ws.pending().is_none());
    }

    #[test]
    fn auto_apply_writes_straight_to_store_and_can_roll_back() {
        let mut ws = workspace(true);
        ws.store.update_one(Slot::Logic, "keep();");
        let (ticket, _) = ws.submit_prompt("button").unwrap();

        assert_eq!(
            ws.receive_response(ticket, response(ANSWER)),
            ResponseOutcome::Applied(vec![Slot::Markup, Slot::Style])
        );
        assert_eq!(ws.store.get().logic, "keep();");
        assert!(ws.rollback());
        assert_eq!(ws.store.get(), &CodeBuffers::new("", "", "keep();"));
        assert!(!ws.can_rollback());
    }

    #[test]
    fn prose_only_response_is_conversation() {
        let mut ws = workspace(false);
        let (ticket, _) = ws.submit_prompt("why signals?").unwrap();
        assert_eq!(
            ws.receive_response(ticket, response("Because they are fine-grained.")),
            ResponseOutcome::Conversation
        );
        assert_eq!(ws.chat.history.len(), 2);
        assert!(ws.pending().is_none());
    }

    #[test]
    fn identical_code_needs_no_review() {
        let mut ws = workspace(false);
        ws.store.update_one(Slot::Markup, "<button>Go</button>");
        let (ticket, _) = ws.submit_prompt("same again").unwrap();
        assert_eq!(
            ws.receive_response(ticket, response("```html\n<button>Go</button>\n```")),
            ResponseOutcome::Conversation
        );
    }

    #[test]
    fn stopped_request_drops_late_response() {
        let mut ws = workspace(true);
        let (ticket, _) = ws.submit_prompt("slow one").unwrap();
        assert!(ws.emergency_stop());
        assert_eq!(ws.receive_response(ticket, response(ANSWER)), ResponseOutcome::Dropped);
        assert!(ws.store.is_empty());
    }

    #[test]
    fn failures_are_reported_in_chat() {
        let mut ws = workspace(false);
        let (ticket, _) = ws.submit_prompt("anything").unwrap();
        ws.receive_failure(ticket, &CompletionError::Status { status: 503 });
        assert!(!ws.chat.is_waiting());
        let last = ws.chat.history.last().unwrap();
        assert_eq!(last.sender, Sender::System);
        assert_eq!(
            last.content,
            "The copilot could not answer: completion endpoint returned HTTP 503"
        );
    }

    #[test]
    fn blank_prompts_and_discard() {
        let mut ws = workspace(false);
        assert!(ws.submit_prompt("   ").is_none());
        let (ticket, _) = ws.submit_prompt("card").unwrap();
        ws.receive_response(ticket, response(ANSWER));
        assert!(ws.discard_pending());
        assert!(!ws.apply_pending(ApplyChoice::All));
        assert!(ws.store.is_empty());
    }
}
