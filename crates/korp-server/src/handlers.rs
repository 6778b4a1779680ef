use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use korp_mwe::OverflowLog;
use korp_types::{Mode, SentenceElement, WordRecord};

pub const MAX_SENTENCE_LEN: usize = 10_000;

#[derive(Clone)]
pub struct AppState {
    pub overflow: Option<Arc<OverflowLog>>,
}

/// One element of the request sentence. A plain word carries its surface
/// text and annotation layers; structural markup is posted as `element`
/// instead and makes the sentence inapplicable.
#[derive(Deserialize)]
pub struct ElementPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub element: Option<String>,
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub mode: String,
    pub words: Vec<ElementPayload>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    mode: String,
    /// False when the sentence could not be resolved: structural markup
    /// mid-sentence, or a combination count past the enumeration cutoff.
    applicable: bool,
    values: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/resolve", post(resolve))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Response, ApiError> {
    let mode = Mode::from_name(&request.mode).ok_or_else(|| {
        ApiError::bad_request(format!(
            "unknown mode {:?} (expected lex, saldo or lemma)",
            request.mode
        ))
    })?;
    if request.words.len() > MAX_SENTENCE_LEN {
        return Err(ApiError::bad_request(format!(
            "sentence must be at most {MAX_SENTENCE_LEN} elements"
        )));
    }

    let sentence: Vec<SentenceElement> = request
        .words
        .into_iter()
        .map(|payload| match payload.element {
            Some(name) => SentenceElement::Other(name),
            None => SentenceElement::Word(WordRecord {
                text: payload.text,
                annotations: payload.annotations,
            }),
        })
        .collect();

    let values = korp_mwe::resolve(&sentence, mode, state.overflow.as_deref());
    let response = ResolveResponse {
        mode: request.mode,
        applicable: values.is_some(),
        values,
    };
    Ok(Json(response).into_response())
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
