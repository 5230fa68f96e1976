use thiserror::Error;
use wasm_bindgen::JsValue;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PreviewError {
    #[error("could not create preview blob: {0}")]
    Blob(String),

    #[error("could not create object url: {0}")]
    ObjectUrl(String),

    #[error("could not revoke object url {url}: {reason}")]
    Revoke { url: String, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("could not build request: {0}")]
    Request(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("completion endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed completion payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("local storage is unavailable")]
    Unavailable,

    #[error("local storage rejected the write: {0}")]
    Write(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Preview(#[from] PreviewError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("browser api failed: {0}")]
    Browser(String),
}

pub fn js_reason(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}
