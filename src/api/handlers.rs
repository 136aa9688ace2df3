use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::logic::keys::key_attributes;
use crate::logic::{Expander, WriteProcessor};
use crate::model::{
    AttributeKind, Headers, KeyPredicate, ModifyRequest, ODataError, ProcessError, RequestError,
    RequestPathSegment, Schema, StructuredType, PATH_SEPARATOR,
};
use crate::store::traits::{Store, TransactionProvider};

/// Store plus the service root every identity is built under
pub struct AppContext<S> {
    pub store: S,
    pub service_root: String,
}

pub type AppState<S> = Arc<AppContext<S>>;

pub fn app_state<S: Store>(store: S, service_root: impl Into<String>) -> AppState<S> {
    Arc::new(AppContext {
        store,
        service_root: service_root.into(),
    })
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateValueRequest {
    pub value: Value,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(error: ODataError) -> ApiError {
    let status = error.status_code();
    if status.is_server_error() {
        log::error!("Request failed: {}", error);
    } else {
        log::debug!("Request rejected: {}", error);
    }
    (status, Json(ErrorResponse::new(&error.to_string())))
}

/// Split on `separator` where it is not inside a quoted literal
fn split_outside_quotes(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        if c == '\'' {
            in_quotes = !in_quotes;
        } else if c == separator && !in_quotes {
            parts.push(&text[start..index]);
            start = index + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parse the text between the parentheses of `Set('35')` or
/// `Set(K1='a',K2=2)` into key predicates
pub fn parse_key_predicates(
    entity_type: &StructuredType,
    text: &str,
) -> Result<Vec<KeyPredicate>, ODataError> {
    let invalid = || RequestError::InvalidKeyPredicate {
        text: text.to_string(),
    };
    if text.trim().is_empty() {
        return Err(invalid().into());
    }

    let parts = split_outside_quotes(text, ',');
    let mut predicates = Vec::with_capacity(parts.len());
    for part in &parts {
        match part.split_once('=') {
            Some((name, literal)) if !name.contains('\'') => {
                predicates.push(KeyPredicate::parse(name.trim(), literal)?);
            }
            _ => {
                // A bare literal addresses a type with exactly one key
                let keys = key_attributes(entity_type)?;
                match (keys.as_slice(), parts.len()) {
                    ([(_, key)], 1) => {
                        predicates.push(KeyPredicate::parse(key.external_name.clone(), part)?)
                    }
                    _ => return Err(invalid().into()),
                }
            }
        }
    }
    Ok(predicates)
}

/// Resolve `Organizations` or `Organizations('35')` to the entity type and,
/// when present, the key predicates
pub fn parse_resource(
    schema: &Schema,
    resource: &str,
) -> Result<(Arc<StructuredType>, Option<Vec<KeyPredicate>>), ODataError> {
    let (entity_set, predicate) = match resource.find('(') {
        Some(open) => {
            let Some(inner) = resource[open + 1..].strip_suffix(')') else {
                return Err(RequestError::InvalidKeyPredicate {
                    text: resource[open..].to_string(),
                }
                .into());
            };
            (&resource[..open], Some(inner))
        }
        None => (resource, None),
    };

    let entity_type = schema
        .entity_type_for_set(entity_set)
        .cloned()
        .ok_or_else(|| RequestError::UnknownEntitySet {
            name: entity_set.to_string(),
        })?;
    let keys = predicate
        .map(|text| parse_key_predicates(&entity_type, text))
        .transpose()?;
    Ok((entity_type, keys))
}

/// Tag each segment of a property path with the kind the metadata gives it.
/// Unknown names are tagged primitive and rejected by the projector.
pub fn path_segments(entity_type: &StructuredType, path: &str) -> Vec<RequestPathSegment> {
    let mut segments = Vec::new();
    let mut current = Some(entity_type);
    for name in path.split(PATH_SEPARATOR).filter(|name| !name.is_empty()) {
        if name == "$value" {
            segments.push(RequestPathSegment::RawValue);
            continue;
        }
        let attribute = current.and_then(|t| t.attribute(name));
        match attribute.map(|a| &a.kind) {
            Some(AttributeKind::Complex(nested)) => {
                segments.push(RequestPathSegment::complex(name));
                current = Some(nested.as_ref());
            }
            Some(AttributeKind::Association { .. }) => {
                segments.push(RequestPathSegment::complex(name));
                current = None;
            }
            _ => {
                segments.push(RequestPathSegment::primitive(name));
                current = None;
            }
        }
    }
    segments
}

fn forward_headers(headers: &HeaderMap) -> Headers {
    let mut forwarded = Headers::new();
    for (name, value) in headers {
        forwarded
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    forwarded
}

fn modify_request(
    schema: &Schema,
    resource: &str,
    path: &str,
    headers: &HeaderMap,
) -> Result<ModifyRequest, ODataError> {
    let (entity_type, keys) = parse_resource(schema, resource)?;
    let key_predicates = keys.ok_or_else(|| RequestError::InvalidKeyPredicate {
        text: resource.to_string(),
    })?;
    let segments = path_segments(&entity_type, path);

    Ok(ModifyRequest {
        entity_type,
        key_predicates,
        segments,
        headers: forward_headers(headers),
    })
}

pub async fn get_resource<S: Store>(
    State(state): State<AppState<S>>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let schema = state.store.schema();
    let (entity_type, keys) = parse_resource(schema, &resource).map_err(error_response)?;

    let expand: Vec<String> = params
        .get("$expand")
        .map(|items| {
            items
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let result = state
        .store
        .query(&entity_type, keys.as_deref().unwrap_or(&[]), &expand)
        .await
        .map_err(|e| error_response(e.into()))?;

    let expander = Expander::new(schema, &state.service_root);
    let documents = expander
        .convert_result(&entity_type, &result)
        .map_err(|e| error_response(e.into()))?;

    if keys.is_some() {
        return documents
            .into_iter()
            .next()
            .map(|document| Json(document.to_json()))
            .ok_or_else(|| {
                error_response(ProcessError::not_found(format!("'{}' not found", resource)).into())
            });
    }

    let value: Vec<Value> = documents.iter().map(|document| document.to_json()).collect();
    Ok(Json(json!({ "value": value })))
}

pub async fn clear_property<S: Store>(
    State(state): State<AppState<S>>,
    Path((resource, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let request = modify_request(state.store.schema(), &resource, &path, &headers)
        .map_err(error_response)?;

    let transaction = state.store.transaction();
    WriteProcessor::new(&transaction, &transaction)
        .clear_fields(&request)
        .await
        .map_err(error_response)
}

pub async fn update_property<S: Store>(
    State(state): State<AppState<S>>,
    Path((resource, path)): Path<(String, String)>,
    headers: HeaderMap,
    RequestJson(body): RequestJson<UpdateValueRequest>,
) -> Result<StatusCode, ApiError> {
    let request = modify_request(state.store.schema(), &resource, &path, &headers)
        .map_err(error_response)?;

    let transaction = state.store.transaction();
    WriteProcessor::new(&transaction, &transaction)
        .update_property(&request, body.value)
        .await
        .map_err(error_response)
}
