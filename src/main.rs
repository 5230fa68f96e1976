use codepilot_ui::app::*;
use codepilot_ui::{browser, logging};
use leptos::prelude::*;
use tracing::warn;

fn main() {
    console_error_panic_hook::set_once();
    let loaded = browser::load_settings();
    let settings = loaded.as_ref().cloned().unwrap_or_default();
    logging::init(settings.log_level());
    if let Err(err) = loaded {
        warn!(error = %err, "ignoring unreadable settings");
    }
    mount_to_body(move || {
        view! { <App settings/> }
    })
}
