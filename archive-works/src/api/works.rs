//! Work lifecycle endpoints

use archive_common::models::TagSet;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::workflow::{BulkPatch, BulkResult, EditAction, Outcome, WorkSubmission};
use crate::AppState;

pub fn work_routes() -> Router<AppState> {
    Router::new()
        .route("/works", post(create_work))
        .route("/works/:id", axum::routing::get(show_work))
        .route("/works/:id", put(update_work))
        .route("/works/:id", delete(delete_work))
        .route("/works/:id/tags", put(update_tags))
        .route("/works/:id/post", post(post_draft))
        .route("/works/:id/remove-author", post(remove_author))
        .route("/works/bulk/edit", post(bulk_edit))
        .route("/works/bulk/delete", post(bulk_delete))
        .route("/works/bulk/orphan", post(bulk_orphan))
}

#[derive(Debug, Deserialize)]
struct EditRequest {
    #[serde(flatten)]
    submission: WorkSubmission,
    #[serde(default)]
    action: EditAction,
}

#[derive(Debug, Deserialize)]
struct TagsRequest {
    tags: TagSet,
    #[serde(default)]
    action: EditAction,
}

#[derive(Debug, Deserialize)]
struct BulkEditRequest {
    work_ids: Vec<Uuid>,
    #[serde(default)]
    patch: BulkPatch,
}

#[derive(Debug, Deserialize)]
struct BulkIdsRequest {
    work_ids: Vec<Uuid>,
}

async fn create_work(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<EditRequest>,
) -> ApiResult<Json<Outcome>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let outcome = state
        .engine
        .create(&ctx, &request.submission, request.action)
        .await?;
    Ok(Json(outcome))
}

async fn show_work(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<archive_common::models::Work>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let work = state
        .store
        .find_work(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("work {}", id)))?;

    // Drafts are visible only to their authors; restricted works only to
    // logged-in viewers
    if !work.posted {
        let owner = ctx
            .user
            .as_ref()
            .map(|u| work.pseud_ids.iter().any(|p| u.owns_pseud(*p)) || u.is_admin)
            .unwrap_or(false);
        if !owner {
            return Err(ApiError::NotFound(format!("work {}", id)));
        }
    } else if work.restricted && !ctx.show_restricted() {
        return Err(ApiError::Forbidden(
            "This work is restricted to logged-in users.".to_string(),
        ));
    }

    Ok(Json(work))
}

async fn update_work(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<EditRequest>,
) -> ApiResult<Json<Outcome>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let outcome = state
        .engine
        .update(&ctx, id, &request.submission, request.action)
        .await?;
    Ok(Json(outcome))
}

async fn update_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<TagsRequest>,
) -> ApiResult<Json<Outcome>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let outcome = state
        .engine
        .update_tags(&ctx, id, &request.tags, request.action)
        .await?;
    Ok(Json(outcome))
}

async fn post_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Outcome>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let outcome = state.engine.post_draft(&ctx, id).await?;
    Ok(Json(outcome))
}

async fn delete_work(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Outcome>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let outcome = state.engine.delete(&ctx, id).await?;
    Ok(Json(outcome))
}

async fn remove_author(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Outcome>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let outcome = state.engine.remove_self_as_author(&ctx, id).await?;
    Ok(Json(outcome))
}

async fn bulk_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkEditRequest>,
) -> ApiResult<Json<BulkResult>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let result = state
        .engine
        .edit_multiple(&ctx, &request.work_ids, &request.patch)
        .await?;
    Ok(Json(result))
}

async fn bulk_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkIdsRequest>,
) -> ApiResult<Json<BulkResult>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let result = state
        .engine
        .delete_multiple(&ctx, &request.work_ids)
        .await?;
    Ok(Json(result))
}

async fn bulk_orphan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkIdsRequest>,
) -> ApiResult<Json<BulkResult>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let result = state
        .engine
        .orphan_multiple(&ctx, &request.work_ids)
        .await?;
    Ok(Json(result))
}
