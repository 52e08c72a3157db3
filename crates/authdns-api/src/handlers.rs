//! Zone CRUD handlers

use authdns_core::{normalize_domain, DnsError, Zone};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::ApiState;

/// Decode the body, turning every rejection into a plain 400
fn zone_body(body: Result<Json<Zone>, JsonRejection>) -> ApiResult<Zone> {
    body.map(|Json(zone)| zone)
        .map_err(|rejection| ApiError::BadRequest(format!("invalid zone body: {rejection}")))
}

/// PUT/POST failures are a bad body (400) or a server-side error (500);
/// a document that fails schema validation counts as a bad body here,
/// unlike on the PATCH path where it is 422.
fn upsert_error(err: DnsError) -> ApiError {
    match err {
        DnsError::Validation { message } => ApiError::BadRequest(format!("invalid zone: {message}")),
        other => other.into(),
    }
}

/// The `name` in the body, when present, must match the URL
fn check_name(name: &str, zone: &Zone) -> ApiResult<()> {
    if !zone.name.is_empty() && normalize_domain(&zone.name) != normalize_domain(name) {
        return Err(ApiError::BadRequest(format!(
            "zone name {:?} does not match the request path {name:?}",
            zone.name
        )));
    }
    Ok(())
}

pub async fn get_zone(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Zone>> {
    let zone = state.cache.fetch(&name).await?;
    Ok(Json(zone))
}

pub async fn upsert_zone(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Result<Json<Zone>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let zone = zone_body(body)?;
    check_name(&name, &zone)?;

    let existed = state.cache.fetch_local(&name).await.is_ok();
    state.cache.put(&name, zone).await.map_err(upsert_error)?;
    info!(%name, existed, "zone upserted");

    if existed {
        Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
    } else {
        Ok((StatusCode::CREATED, Json(json!({ "status": "created" }))))
    }
}

pub async fn patch_zone(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Result<Json<Zone>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let zone = zone_body(body)?;
    check_name(&name, &zone)?;

    let version = state.cache.update(&name, zone).await?;
    info!(%name, version, "zone updated");
    Ok(Json(json!({ "status": "ok", "version": version })))
}

pub async fn delete_zone(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.cache.delete(&name).await?;
    info!(%name, "zone deleted");
    Ok(Json(json!({ "status": "ok" })))
}
