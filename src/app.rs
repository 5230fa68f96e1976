use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos::web_sys::HtmlTextAreaElement;
use std::time::Duration;
use tracing::warn;

use crate::browser::{self, BlobSurface};
use crate::buffers::{validate_slot, BufferStore, CodeBuffers, Slot};
use crate::chat::{ChatMessage, Sender};
use crate::diff::DiffResult;
use crate::export;
use crate::markdown::render_message;
use crate::pane_editor::{
    byte_to_utf16, run_command, utf16_to_byte, PaneCommand, PaneSnapshot, Selection,
};
use crate::preview::{PreviewRenderer, PreviewStatus, RefreshOutcome, BLANK_URL};
use crate::settings::Settings;
use crate::workspace::{ApplyChoice, Workspace};

const EXPORT_BASE_NAME: &str = "generated";

fn restored_store() -> BufferStore {
    let mut store = BufferStore::new();
    if let Some(saved) = browser::load_buffers() {
        store.import(saved);
        store.reset_changes();
    }
    store
}

fn persist_settings(s: &Settings) {
    if let Err(err) = browser::save_settings(s) {
        warn!(error = %err, "could not save settings");
    }
}

fn status_label(status: &PreviewStatus) -> String {
    match status {
        PreviewStatus::Refreshing => "Refreshing…".to_string(),
        PreviewStatus::Ready => "Live".to_string(),
        PreviewStatus::Blank => "Nothing to preview yet".to_string(),
        PreviewStatus::Unavailable(reason) => format!("Preview unavailable: {reason}"),
    }
}

type LocalPreview = StoredValue<PreviewRenderer<BlobSurface>, LocalStorage>;

fn schedule_settle(
    preview: LocalPreview,
    set_src: WriteSignal<String>,
    set_status: WriteSignal<PreviewStatus>,
    delay: Duration,
) {
    set_timeout(
        move || {
            let Some(outcome) = preview.try_update_value(|p| p.settle()) else {
                return;
            };
            preview.try_with_value(|p| {
                set_src.set(p.src().to_string());
                set_status.set(p.status());
            });
            if outcome != RefreshOutcome::Skipped {
                schedule_settle(preview, set_src, set_status, delay);
            }
        },
        delay,
    );
}

#[component]
pub fn App(settings: Settings) -> impl IntoView {
    let (settings, set_settings) = signal(settings);
    let (buffers, set_buffers) = signal(CodeBuffers::default());
    let (active, set_active) = signal(Slot::default());
    let (messages, set_messages) = signal(Vec::<ChatMessage>::new());
    let (waiting, set_waiting) = signal(false);
    let (pending, set_pending) = signal(None::<DiffResult>);
    let (can_rollback, set_can_rollback) = signal(false);
    let (prompt, set_prompt) = signal(String::new());
    let (preview_src, set_preview_src) = signal(BLANK_URL.to_string());
    let (preview_status, set_preview_status) = signal(PreviewStatus::Blank);

    let mut store = restored_store();
    set_buffers.set(store.export());
    store.subscribe(move |snapshot| {
        set_buffers.set(snapshot.buffers.clone());
        set_active.set(snapshot.active);
    });
    let initial = settings.get_untracked();
    let workspace = StoredValue::new_local(Workspace::new(store, &initial));
    let preview = StoredValue::new_local(PreviewRenderer::new(BlobSurface, initial.auto_refresh));

    on_cleanup(move || {
        preview.try_update_value(|p| p.release());
    });

    let sync_chat = move || {
        workspace.try_with_value(|ws| {
            set_messages.set(ws.chat.history.to_vec());
            set_waiting.set(ws.chat.is_waiting());
            set_pending.set(ws.pending().cloned());
            set_can_rollback.set(ws.can_rollback());
        });
    };

    let show_outcome = move |outcome: RefreshOutcome| {
        if outcome == RefreshOutcome::Skipped {
            return;
        }
        preview.try_with_value(|p| {
            set_preview_src.set(p.src().to_string());
            set_preview_status.set(p.status());
        });
        let delay = Duration::from_millis(settings.get_untracked().refresh_delay_ms.into());
        schedule_settle(preview, set_preview_src, set_preview_status, delay);
    };

    Effect::new(move |_| {
        let current = buffers.get();
        if let Some(outcome) = preview.try_update_value(|p| p.on_buffers_changed(&current)) {
            show_outcome(outcome);
        }
    });

    Effect::new(move |_| {
        let current = buffers.get();
        if let Err(err) = browser::save_buffers(&current) {
            warn!(error = %err, "could not snapshot buffers");
        }
    });

    let send = move || {
        let text = prompt.get_untracked();
        let Some((ticket, request)) = workspace
            .try_update_value(|ws| ws.submit_prompt(&text))
            .flatten()
        else {
            return;
        };
        set_prompt.set(String::new());
        sync_chat();
        let endpoint = settings.get_untracked().completion_endpoint;
        spawn_local(async move {
            let result = browser::post_completion(&endpoint, &request).await;
            workspace.try_update_value(|ws| match result {
                Ok(response) => {
                    ws.receive_response(ticket, response);
                }
                Err(err) => ws.receive_failure(ticket, &err),
            });
            sync_chat();
        });
    };

    let apply = move |choice: ApplyChoice<'_>| {
        workspace.try_update_value(|ws| ws.apply_pending(choice));
        sync_chat();
    };

    let on_editor_input = move |ev| {
        let text = event_target_value(&ev);
        let slot = active.get_untracked();
        workspace.try_update_value(|ws| ws.store.update_one(slot, text));
    };

    let on_editor_keydown = move |ev: leptos::ev::KeyboardEvent| {
        let command = match ev.key().as_str() {
            "Tab" if ev.shift_key() => PaneCommand::Outdent,
            "Tab" => PaneCommand::Indent,
            "Enter" => PaneCommand::Newline,
            key => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) if !ev.ctrl_key() && !ev.meta_key() => {
                        match PaneCommand::pair_for(ch) {
                            Some(command) => command,
                            None => return,
                        }
                    }
                    _ => return,
                }
            }
        };
        let area: HtmlTextAreaElement = event_target(&ev);
        let text = area.value();
        let start = area.selection_start().ok().flatten().unwrap_or(0) as usize;
        let end = area.selection_end().ok().flatten().unwrap_or(0) as usize;
        let mut pane = PaneSnapshot::new(text.clone());
        pane.set_selection(Selection::new(utf16_to_byte(&text, start), utf16_to_byte(&text, end)));

        match run_command(&mut pane, command) {
            Ok(true) => {}
            Ok(false) => {
                if matches!(command, PaneCommand::Indent | PaneCommand::Outdent) {
                    ev.prevent_default();
                }
                return;
            }
            Err(err) => {
                warn!(error = %err, "pane edit rejected");
                return;
            }
        }
        ev.prevent_default();
        area.set_value(&pane.text);
        let caret_start = byte_to_utf16(&pane.text, pane.selection.start) as u32;
        let caret_end = byte_to_utf16(&pane.text, pane.selection.end) as u32;
        let _ = area.set_selection_start(Some(caret_start));
        let _ = area.set_selection_end(Some(caret_end));
        let slot = active.get_untracked();
        workspace.try_update_value(|ws| ws.store.update_one(slot, pane.text));
    };

    let download_all = move || {
        let current = buffers.get_untracked();
        let files = export::export_files(&current, EXPORT_BASE_NAME)
            .into_iter()
            .chain(export::export_document(&current, EXPORT_BASE_NAME));
        for file in files {
            if let Err(err) = browser::download(&file) {
                warn!(error = %err, name = %file.name, "export failed");
            }
        }
    };

    let chat_view = move || {
        messages.get().into_iter().map(|message| {
            let css = match message.sender {
                Sender::User => "msg msg-user",
                Sender::Ai => "msg msg-ai",
                Sender::System => "msg msg-system",
            };
            let body = match message.sender {
                Sender::User => {
                    view! { <div class="msg-body">{message.content.clone()}</div> }.into_any()
                }
                _ => {
                    let html = render_message(&message.content, message.code.is_some());
                    view! { <div class="msg-body" inner_html=html></div> }.into_any()
                }
            };
            let code_chip = message.code.as_ref().map(|code| {
                let slots = Slot::ALL
                    .iter()
                    .filter(|slot| code.get(**slot).is_some())
                    .map(|slot| slot.label())
                    .collect::<Vec<_>>()
                    .join(" · ");
                view! { <div class="msg-code">{format!("Code: {slots}")}</div> }
            });
            view! {
                <div class=css>
                    <div class="msg-name">{message.name.clone()}</div>
                    {body}
                    {code_chip}
                </div>
            }
        }).collect::<Vec<_>>()
    };

    let review_view = move || {
        pending.get().map(|diff| {
            let total = diff.total_stats();
            let rows = diff.records.iter().map(|record| {
                let slot = record.slot;
                let stats = record.stats();
                let unchanged = !record.changed;
                let row_style = if unchanged { "opacity: 0.5;" } else { "" };
                let summary = if unchanged {
                    "unchanged".to_string()
                } else {
                    format!("+{} −{}", stats.additions, stats.deletions)
                };
                view! {
                    <div class="diff-row" style=row_style>
                        <span class="diff-slot">{slot.label()}</span>
                        <span class="diff-stats">{summary}</span>
                        <button
                            disabled=unchanged
                            on:click=move |_| apply(ApplyChoice::Slots(&[slot]))
                        >
                            "Apply"
                        </button>
                    </div>
                }
            }).collect::<Vec<_>>();
            view! {
                <section class="diff-review">
                    <header>
                        {format!(
                            "Proposed changes: {} additions, {} deletions",
                            total.additions,
                            total.deletions,
                        )}
                    </header>
                    {rows}
                    <div class="diff-actions">
                        <button on:click=move |_| apply(ApplyChoice::Changed)>
                            "Apply changed"
                        </button>
                        <button on:click=move |_| apply(ApplyChoice::All)>"Apply all"</button>
                        <button on:click=move |_| {
                            workspace.try_update_value(|ws| ws.discard_pending());
                            sync_chat();
                        }>"Discard"</button>
                    </div>
                </section>
            }
        })
    };

    let tabs_view = move || {
        Slot::ALL.iter().map(|&slot| {
            let is_active = move || active.get() == slot;
            let has_text = move || !buffers.get().get(slot).trim().is_empty();
            view! {
                <button
                    class=move || if is_active() { "tab tab-active" } else { "tab" }
                    on:click=move |_| {
                        workspace.try_update_value(|ws| ws.store.set_active_slot(slot));
                    }
                >
                    {slot.label()}
                    {move || if has_text() { " •" } else { "" }}
                </button>
            }
        }).collect::<Vec<_>>()
    };

    let warnings_view = move || {
        let slot = active.get();
        let check = validate_slot(slot, buffers.get().get(slot));
        check.errors.into_iter().map(|w| view! { <li>{w}</li> }).collect::<Vec<_>>()
    };

    view! {
        <style>{STYLES}</style>
        <main class="workspace">
            <section class="chat-pane">
                <header class="pane-header">
                    <span>"Copilot"</span>
                    <button on:click=move |_| {
                        workspace.try_update_value(|ws| ws.chat.history.clear());
                        sync_chat();
                    }>"Clear"</button>
                </header>
                <div class="chat-log">{chat_view}</div>
                {review_view}
                <div class="composer">
                    <textarea
                        placeholder="Describe the component you want…"
                        prop:value=move || prompt.get()
                        on:input=move |ev| set_prompt.set(event_target_value(&ev))
                        on:keydown=move |ev: leptos::ev::KeyboardEvent| {
                            if ev.key() == "Enter" && (ev.ctrl_key() || ev.meta_key()) {
                                ev.prevent_default();
                                send();
                            }
                        }
                    ></textarea>
                    {move || if waiting.get() {
                        view! {
                            <button class="stop" on:click=move |_| {
                                workspace.try_update_value(|ws| ws.emergency_stop());
                                sync_chat();
                            }>"Stop"</button>
                        }.into_any()
                    } else {
                        view! { <button on:click=move |_| send()>"Generate"</button> }.into_any()
                    }}
                </div>
            </section>
            <section class="editor-pane">
                <header class="pane-header">
                    <div class="tabs">{tabs_view}</div>
                    <div class="editor-actions">
                        <button disabled=move || !can_rollback.get() on:click=move |_| {
                            workspace.try_update_value(|ws| ws.rollback());
                            sync_chat();
                        }>"Undo apply"</button>
                        <button on:click=move |_| download_all()>"Export"</button>
                        <button on:click=move |_| {
                            workspace.try_update_value(|ws| ws.store.clear());
                        }>"Clear code"</button>
                    </div>
                </header>
                <textarea
                    class="code-editor"
                    spellcheck="false"
                    prop:value=move || buffers.get().get(active.get()).to_string()
                    on:input=on_editor_input
                    on:keydown=on_editor_keydown
                ></textarea>
                <ul class="warnings">{warnings_view}</ul>
            </section>
            <section class="preview-pane">
                <header class="pane-header">
                    <span>{move || status_label(&preview_status.get())}</span>
                    <label>
                        <input
                            type="checkbox"
                            prop:checked=move || settings.get().auto_refresh
                            on:change=move |ev| {
                                let on = event_target_checked(&ev);
                                preview.try_update_value(|p| p.set_auto_refresh(on));
                                let mut s = settings.get_untracked();
                                s.auto_refresh = on;
                                persist_settings(&s);
                                set_settings.set(s);
                            }
                        />
                        "Auto-refresh"
                    </label>
                    <label>
                        <input
                            type="checkbox"
                            prop:checked=move || settings.get().auto_apply
                            on:change=move |ev| {
                                let on = event_target_checked(&ev);
                                workspace.try_update_value(|ws| ws.set_auto_apply(on));
                                let mut s = settings.get_untracked();
                                s.auto_apply = on;
                                persist_settings(&s);
                                set_settings.set(s);
                            }
                        />
                        "Auto-apply"
                    </label>
                    <button on:click=move |_| {
                        let current = buffers.get_untracked();
                        if let Some(outcome) = preview.try_update_value(|p| p.refresh(&current)) {
                            show_outcome(outcome);
                        }
                    }>"Refresh"</button>
                </header>
                <iframe
                    class="preview-frame"
                    title="Live preview"
                    sandbox=move || settings.get().sandbox
                    src=move || preview_src.get()
                ></iframe>
            </section>
        </main>
    }
}

const STYLES: &str = "
.workspace {
    display: flex;
    height: 100vh;
    width: 100vw;
    font-family: system-ui, sans-serif;
    color: #1a1a1a;
}
.chat-pane {
    width: 28rem;
    display: flex;
    flex-direction: column;
    border-right: 1px solid #e5e7eb;
    background: #f4f5f7;
}
.editor-pane { flex: 1; display: flex; flex-direction: column; border-right: 1px solid #e5e7eb; }
.preview-pane { flex: 1; display: flex; flex-direction: column; }
.pane-header {
    height: 3rem;
    display: flex;
    align-items: center;
    justify-content: space-between;
    gap: 0.5rem;
    padding: 0 1rem;
    border-bottom: 1px solid #e5e7eb;
    font-size: 0.9rem;
}
.chat-log { flex: 1; overflow-y: auto; padding: 0.75rem; }
.msg { margin-bottom: 0.75rem; padding: 0.5rem 0.75rem; border-radius: 8px; background: #fff; }
.msg-user { background: #eef2ff; }
.msg-system { background: transparent; color: #6b7280; font-style: italic; }
.msg-name { font-weight: 600; font-size: 0.8rem; margin-bottom: 0.25rem; }
.msg-code { margin-top: 0.25rem; font-size: 0.8rem; color: #4f46e5; }
.composer { display: flex; gap: 0.5rem; padding: 0.75rem; border-top: 1px solid #e5e7eb; }
.composer textarea { flex: 1; min-height: 4rem; resize: vertical; }
.diff-review {
    margin: 0 0.75rem 0.75rem;
    padding: 0.5rem;
    border: 1px solid #6366f1;
    border-radius: 8px;
    background: #fff;
}
.diff-row { display: flex; align-items: center; gap: 0.75rem; padding: 0.25rem 0; }
.diff-slot { flex: 1; font-weight: 600; }
.diff-actions { display: flex; gap: 0.5rem; margin-top: 0.5rem; }
.tab { background: transparent; border: none; padding: 0.5rem 0.75rem; cursor: pointer; }
.tab-active { border-bottom: 2px solid #6366f1; color: #4f46e5; }
.code-editor {
    flex: 1;
    padding: 1rem 1.5rem;
    border: none;
    outline: none;
    resize: none;
    font-family: ui-monospace, monospace;
    font-size: 14px;
    line-height: 1.6;
    tab-size: 4;
}
.warnings { margin: 0; padding: 0.25rem 2rem; color: #b45309; font-size: 0.8rem; }
.preview-frame { flex: 1; border: none; background: #fff; }
";
