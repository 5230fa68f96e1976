pub mod app;
pub mod browser;
pub mod buffers;
pub mod chat;
pub mod clock;
pub mod completion;
pub mod diff;
pub mod error;
pub mod export;
pub mod fence;
pub mod logging;
pub mod markdown;
pub mod pane_editor;
pub mod preview;
pub mod settings;
pub mod workspace;
