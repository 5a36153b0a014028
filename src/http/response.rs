//! Rendering of relay outcomes.
//!
//! Both outcomes answer `200 text/html`; failures are reported in the body.

use axum::response::{Html, IntoResponse, Response};

use crate::destination::{RelayError, RelayPayload, RelayResult};

const SUCCESS_PREFIX: &str = "<h2>RESULT of request to Backend service:</h2>OData service response: <p>";

/// `<h2>RESULT…</h2>OData service response: <p>{payload as JSON}</p>`
pub fn success_body(payload: &RelayPayload) -> String {
    match serde_json::to_string(payload) {
        Ok(json) => format!("{}{}</p>", SUCCESS_PREFIX, json),
        Err(e) => format!("ERROR: failed to render response - FULL ERROR: {}", e),
    }
}

/// `ERROR: {message} - FULL ERROR: {cause}`
pub fn failure_body(error: &RelayError) -> String {
    format!("ERROR: {} - FULL ERROR: {}", error, error.cause())
}

pub fn render(result: &RelayResult<RelayPayload>) -> Response {
    let body = match result {
        Ok(payload) => success_body(payload),
        Err(error) => failure_body(error),
    };
    Html(body).into_response()
}
