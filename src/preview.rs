use tracing::{debug, info, warn};

use crate::buffers::CodeBuffers;
use crate::error::PreviewError;

pub const BLANK_URL: &str = "about:blank";

/// Turns a document into a loadable URL and takes it back again. Every URL
/// returned by `publish` must eventually be passed to `revoke`.
pub trait PreviewSurface {
    fn publish(&mut self, document: &str) -> Result<String, PreviewError>;
    fn revoke(&mut self, url: &str) -> Result<(), PreviewError>;
}

pub fn build_document(buffers: &CodeBuffers) -> Option<String> {
    if buffers.is_blank() {
        return None;
    }
    let style = buffers.style.replace("</style", "<\\/style");
    let logic = buffers.logic.replace("</script", "<\\/script");

    let mut doc = String::with_capacity(buffers.markup.len() + style.len() + logic.len() + 256);
    doc.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    doc.push_str("<meta charset=\"utf-8\">\n");
    doc.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    doc.push_str("<style>\n");
    doc.push_str(&style);
    doc.push_str("\n</style>\n</head>\n<body>\n");
    doc.push_str(&buffers.markup);
    doc.push_str("\n<script>\n");
    doc.push_str(&logic);
    doc.push_str("\n</script>\n</body>\n</html>\n");
    Some(doc)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Skipped,
    Blank,
    Published(String),
    Failed(PreviewError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreviewStatus {
    Refreshing,
    Ready,
    Blank,
    Unavailable(String),
}

pub struct PreviewRenderer<S: PreviewSurface> {
    surface: S,
    current: Option<String>,
    state: RefreshState,
    auto_refresh: bool,
    last_error: Option<PreviewError>,
    rendered: Option<CodeBuffers>,
    // Latest content seen while a refresh was in flight.
    behind: Option<CodeBuffers>,
}

impl<S: PreviewSurface> PreviewRenderer<S> {
    pub fn new(surface: S, auto_refresh: bool) -> Self {
        Self {
            surface,
            current: None,
            state: RefreshState::Idle,
            auto_refresh,
            last_error: None,
            rendered: None,
            behind: None,
        }
    }

    pub fn src(&self) -> &str {
        self.current.as_deref().unwrap_or(BLANK_URL)
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    pub fn status(&self) -> PreviewStatus {
        if self.state == RefreshState::Refreshing {
            return PreviewStatus::Refreshing;
        }
        match (&self.last_error, &self.current) {
            (Some(err), _) => PreviewStatus::Unavailable(err.to_string()),
            (None, Some(_)) => PreviewStatus::Ready,
            (None, None) => PreviewStatus::Blank,
        }
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn set_auto_refresh(&mut self, enabled: bool) {
        self.auto_refresh = enabled;
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn refresh(&mut self, buffers: &CodeBuffers) -> RefreshOutcome {
        if self.state == RefreshState::Refreshing {
            debug!("preview refresh already in flight");
            return RefreshOutcome::Skipped;
        }
        self.state = RefreshState::Refreshing;
        self.release();
        self.last_error = None;
        self.behind = None;
        self.rendered = Some(buffers.clone());

        let Some(document) = build_document(buffers) else {
            debug!("preview blank");
            return RefreshOutcome::Blank;
        };
        match self.surface.publish(&document) {
            Ok(url) => {
                info!(bytes = document.len(), %url, "preview published");
                self.current = Some(url.clone());
                RefreshOutcome::Published(url)
            }
            Err(err) => {
                warn!(error = %err, "preview unavailable");
                self.last_error = Some(err.clone());
                RefreshOutcome::Failed(err)
            }
        }
    }

    pub fn on_buffers_changed(&mut self, buffers: &CodeBuffers) -> RefreshOutcome {
        if !self.auto_refresh {
            return RefreshOutcome::Skipped;
        }
        if self.state == RefreshState::Refreshing {
            self.behind = Some(buffers.clone());
            return RefreshOutcome::Skipped;
        }
        self.refresh(buffers)
    }

    /// Returns to `Idle`. If content changed during the refresh, renders it
    /// once more and stays `Refreshing`.
    pub fn settle(&mut self) -> RefreshOutcome {
        self.state = RefreshState::Idle;
        match self.behind.take() {
            Some(latest) if self.rendered.as_ref() != Some(&latest) => self.refresh(&latest),
            _ => RefreshOutcome::Skipped,
        }
    }

    pub fn release(&mut self) {
        if let Some(url) = self.current.take() {
            match self.surface.revoke(&url) {
                Ok(()) => debug!(%url, "preview url revoked"),
                Err(err) => warn!(error = %err, "preview url revoke failed"),
            }
        }
    }
}

impl<S: PreviewSurface> Drop for PreviewRenderer<S> {
    fn drop(&mut self) {
        self.release();
    }
}
