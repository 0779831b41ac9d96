/// /larkm management endpoints
use crate::{
    context::AppContext,
    error::LarkmResult,
    policy::CallerContext,
    registry::{ArkPatch, ArkRecord, MintRequest, MintedArk},
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build /larkm routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/larkm", get(lookup_ark).post(create_ark))
        .route("/larkm/search", get(search_arks))
        .route("/larkm/config", get(get_config))
        .route("/larkm/*ark", put(update_ark).delete(delete_ark))
}

/// Single-ARK response body
#[derive(Debug, Serialize)]
pub struct ArkResponse {
    pub ark: ArkRecord,
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub ark: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Mint a new ARK
async fn create_ark(
    State(ctx): State<AppContext>,
    caller: CallerContext,
    req: Result<Json<MintRequest>, JsonRejection>,
) -> LarkmResult<(StatusCode, Json<MintedArk>)> {
    let Json(req) = req?;
    let minted = ctx.registry.create(req, &caller).await?;
    Ok((StatusCode::CREATED, Json(minted)))
}

/// Look up an ARK by `ark` or `target`
async fn lookup_ark(
    State(ctx): State<AppContext>,
    caller: CallerContext,
    params: Result<Query<LookupParams>, QueryRejection>,
) -> LarkmResult<Json<ArkResponse>> {
    let Query(params) = params?;
    let ark = ctx
        .registry
        .lookup(params.ark.as_deref(), params.target.as_deref(), &caller)
        .await?;
    Ok(Json(ArkResponse { ark }))
}

async fn update_ark(
    State(ctx): State<AppContext>,
    caller: CallerContext,
    ark: Result<Path<String>, PathRejection>,
    patch: Result<Json<ArkPatch>, JsonRejection>,
) -> LarkmResult<Json<ArkResponse>> {
    let Path(ark) = ark?;
    let Json(patch) = patch?;
    let ark = ctx.registry.update(&ark, patch, &caller).await?;
    Ok(Json(ArkResponse { ark }))
}

async fn delete_ark(
    State(ctx): State<AppContext>,
    caller: CallerContext,
    ark: Result<Path<String>, PathRejection>,
) -> LarkmResult<StatusCode> {
    let Path(ark) = ark?;
    ctx.registry.delete(&ark, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Search ARK metadata; 204 when no index has been built
async fn search_arks(
    State(ctx): State<AppContext>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> LarkmResult<Response> {
    let Query(params) = params?;
    let results = ctx
        .search
        .search(&params.q, params.page, params.page_size)
        .await?;

    Ok(match results {
        Some(results) => Json(results).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// Client-safe view of the configuration
async fn get_config(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(ctx.config.public_view())
}
