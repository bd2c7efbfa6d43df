//! Import endpoints

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};

use crate::context::RequestContext;
use crate::error::ApiResult;
use crate::import::{ImportRequest, ImportResult};
use crate::AppState;

pub fn import_routes() -> Router<AppState> {
    Router::new().route("/works/import", post(import_works))
}

async fn import_works(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportResult>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let result = state.importer.import(&ctx, &request).await?;
    Ok(Json(result))
}
