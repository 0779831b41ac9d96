/// ARK resolution endpoint
///
/// `GET /ark:{naan}/{suffix}` (and the legacy `ark:/` form) cannot be expressed
/// as a route pattern because the scheme is part of the first path segment,
/// so resolution runs as the router fallback and parses the path itself.
use crate::{
    ark,
    context::AppContext,
    error::{LarkmError, LarkmResult},
    policy::CallerContext,
    registry::Resolution,
};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// True if the query string carries an `info` key, with or without a value
pub fn wants_info(query: Option<&str>) -> bool {
    query
        .map(|q| {
            q.split('&')
                .any(|pair| pair.split('=').next() == Some("info"))
        })
        .unwrap_or(false)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found" }))).into_response()
}

fn redirect(target: &str) -> LarkmResult<Response> {
    let location = HeaderValue::try_from(target)
        .map_err(|_| LarkmError::Internal(format!("Target {} is not a valid Location", target)))?;
    Ok((StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response())
}

/// Fallback handler: resolves ARK paths, 404 for everything else
pub async fn resolve(
    State(ctx): State<AppContext>,
    method: Method,
    uri: Uri,
    caller: CallerContext,
) -> LarkmResult<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Ok(not_found());
    }

    let decoded = urlencoding::decode(uri.path())
        .map_err(|_| LarkmError::InvalidFormat("ARK path is not valid UTF-8.".to_string()))?;
    let path = decoded.trim_start_matches('/');
    if !path.starts_with(ark::ark_string::ARK_SCHEME) {
        return Ok(not_found());
    }

    let parsed = ark::parse(path).map_err(|e| LarkmError::InvalidFormat(e.0))?;
    let info = wants_info(uri.query());

    match ctx
        .registry
        .resolve(parsed.naan, parsed.suffix, info, &caller)
        .await?
    {
        Resolution::Redirect(target) => redirect(&target),
        Resolution::Info(doc) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            doc.render(),
        )
            .into_response()),
    }
}
