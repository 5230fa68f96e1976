use std::time::Duration;

use leptos::prelude::set_timeout;
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobPropertyBag, HtmlAnchorElement, Request, RequestInit, Response, Storage, Url,
};

use crate::buffers::CodeBuffers;
use crate::completion::{decode_response, CompletionRequest, CompletionResponse};
use crate::error::{js_reason, AppError, AppResult, CompletionError, PreviewError, StorageError};
use crate::export::{self, ExportFile, BUFFERS_STORAGE_KEY};
use crate::preview::PreviewSurface;
use crate::settings::{Settings, SETTINGS_STORAGE_KEY};

// The download is fetched after `click` returns, so the URL has to outlive it.
const DOWNLOAD_REVOKE_DELAY: Duration = Duration::from_secs(1);

fn text_blob(contents: &str, mime: &str) -> Result<Blob, JsValue> {
    let parts = js_sys::Array::of1(&JsValue::from_str(contents));
    let options = BlobPropertyBag::new();
    options.set_type(mime);
    Blob::new_with_str_sequence_and_options(&parts, &options)
}

#[derive(Debug, Default)]
pub struct BlobSurface;

impl PreviewSurface for BlobSurface {
    fn publish(&mut self, document: &str) -> Result<String, PreviewError> {
        let blob = text_blob(document, "text/html")
            .map_err(|e| PreviewError::Blob(js_reason(&e)))?;
        Url::create_object_url_with_blob(&blob).map_err(|e| PreviewError::ObjectUrl(js_reason(&e)))
    }

    fn revoke(&mut self, url: &str) -> Result<(), PreviewError> {
        Url::revoke_object_url(url).map_err(|e| PreviewError::Revoke {
            url: url.to_string(),
            reason: js_reason(&e),
        })
    }
}

fn local_storage() -> Result<Storage, StorageError> {
    web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .ok_or(StorageError::Unavailable)
}

fn load_item(key: &str) -> Option<String> {
    local_storage().ok()?.get_item(key).ok().flatten()
}

fn save_item(key: &str, value: &str) -> Result<(), StorageError> {
    local_storage()?
        .set_item(key, value)
        .map_err(|e| StorageError::Write(js_reason(&e)))
}

pub fn load_settings() -> Result<Settings, StorageError> {
    match load_item(SETTINGS_STORAGE_KEY) {
        Some(raw) => Ok(Settings::from_json(&raw)?),
        None => Ok(Settings::default()),
    }
}

pub fn save_settings(settings: &Settings) -> AppResult<()> {
    let raw = settings.to_json().map_err(StorageError::from)?;
    save_item(SETTINGS_STORAGE_KEY, &raw)?;
    Ok(())
}

pub fn load_buffers() -> Option<CodeBuffers> {
    load_item(BUFFERS_STORAGE_KEY).and_then(|raw| export::from_snapshot_json(&raw))
}

pub fn save_buffers(buffers: &CodeBuffers) -> AppResult<()> {
    let raw = export::to_snapshot_json(buffers).map_err(StorageError::from)?;
    save_item(BUFFERS_STORAGE_KEY, &raw)?;
    Ok(())
}

pub fn download(file: &ExportFile) -> AppResult<()> {
    let browser = |e: JsValue| AppError::Browser(js_reason(&e));
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| AppError::Browser("no document".to_string()))?;

    let blob = text_blob(&file.contents, file.mime).map_err(browser)?;
    let url = Url::create_object_url_with_blob(&blob).map_err(browser)?;
    let anchor: HtmlAnchorElement = document
        .create_element("a")
        .map_err(browser)?
        .dyn_into()
        .map_err(|_| AppError::Browser("anchor element expected".to_string()))?;
    anchor.set_href(&url);
    anchor.set_download(&file.name);
    anchor.click();
    debug!(name = %file.name, "download started");

    set_timeout(
        move || {
            if let Err(e) = Url::revoke_object_url(&url) {
                warn!(reason = %js_reason(&e), "download url revoke failed");
            }
        },
        DOWNLOAD_REVOKE_DELAY,
    );
    Ok(())
}

pub async fn post_completion(
    endpoint: &str,
    request: &CompletionRequest,
) -> Result<CompletionResponse, CompletionError> {
    let body = request.to_json()?;
    let init = RequestInit::new();
    init.set_method("POST");
    init.set_body(&JsValue::from_str(&body));

    let req = Request::new_with_str_and_init(endpoint, &init)
        .map_err(|e| CompletionError::Request(js_reason(&e)))?;
    let headers = req.headers();
    headers
        .set("Content-Type", "application/json")
        .and_then(|_| headers.set("Accept", "application/json"))
        .map_err(|e| CompletionError::Request(js_reason(&e)))?;

    let window = web_sys::window()
        .ok_or_else(|| CompletionError::Transport("no window".to_string()))?;
    let value = JsFuture::from(window.fetch_with_request(&req))
        .await
        .map_err(|e| CompletionError::Transport(js_reason(&e)))?;
    let response: Response = value
        .dyn_into()
        .map_err(|_| CompletionError::Payload("fetch did not yield a Response".to_string()))?;
    if !response.ok() {
        return Err(CompletionError::Status {
            status: response.status(),
        });
    }

    let text = response
        .text()
        .map_err(|e| CompletionError::Payload(js_reason(&e)))?;
    let raw = JsFuture::from(text)
        .await
        .map_err(|e| CompletionError::Transport(js_reason(&e)))?
        .as_string()
        .ok_or_else(|| CompletionError::Payload("response body is not text".to_string()))?;
    decode_response(&raw)
}
