// fetch.rs - Browser scene fetch
//
// Pulls scene text over HTTP with window.fetch. Only built for wasm32;
// native callers read files through DirectorySource instead.

use std::fmt::Debug;

use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use crate::error::LoadError;

/// GET `url` and return its body as scene text.
pub async fn fetch_scene_text(url: &str) -> Result<String, LoadError> {
    let window = web_sys::window().ok_or_else(|| fetch_error(url, "no window", ()))?;

    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .and_then(JsValue::dyn_into)
        .map_err(|e| fetch_error(url, "fetch", e))?;
    if !response.ok() {
        return Err(fetch_error(url, "HTTP status", response.status()));
    }

    let body = response.text().map_err(|e| fetch_error(url, "body", e))?;
    let text = JsFuture::from(body)
        .await
        .map_err(|e| fetch_error(url, "body", e))?
        .as_string()
        .ok_or_else(|| fetch_error(url, "body is not text", ()))?;

    if text.trim().is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(text)
}

fn fetch_error(url: &str, stage: &str, detail: impl Debug) -> LoadError {
    LoadError::Unreachable {
        scene: url.to_string(),
        reason: format!("{stage}: {detail:?}"),
    }
}
