//! Search and listing endpoints

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::search::owner::{resolve_tag_scope, OwnerScope, TagResolution, UserHandle};
use crate::search::query::{CountFilter, SearchParams, SortColumn, SortDirection};
use crate::search::{normalize, SearchResults};
use crate::workflow::{Notice, Outcome, Target};
use crate::AppState;

pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/works/search", get(search))
        .route("/works", get(list_works))
        .route("/works/drafts", get(list_drafts))
        .route("/works/:id/reindex", post(reindex))
}

/// Free-text search arguments as they arrive on the query string
///
/// Count constraints come in as operator fragments (`>5000`, `100-1000`);
/// unparseable fragments are rejected rather than silently dropped.
#[derive(Debug, Default, Deserialize)]
struct SearchArgs {
    q: Option<String>,
    page: Option<u32>,
    word_count: Option<String>,
    kudos_count: Option<String>,
    comments_count: Option<String>,
    bookmarks_count: Option<String>,
    hits: Option<String>,
    sort: Option<String>,
    direction: Option<String>,
}

impl SearchArgs {
    fn into_params(self, show_restricted: bool) -> ApiResult<(Option<String>, SearchParams)> {
        let mut params = SearchParams {
            page: self.page,
            show_restricted,
            ..Default::default()
        };

        for (name, fragment, slot) in [
            ("word_count", &self.word_count, &mut params.word_count),
            ("kudos_count", &self.kudos_count, &mut params.kudos_count),
            (
                "comments_count",
                &self.comments_count,
                &mut params.comments_count,
            ),
            (
                "bookmarks_count",
                &self.bookmarks_count,
                &mut params.bookmarks_count,
            ),
            ("hits", &self.hits, &mut params.hits),
        ] {
            if let Some(fragment) = fragment {
                *slot = Some(CountFilter::parse(fragment).ok_or_else(|| {
                    ApiError::BadRequest(format!("{}: unparseable constraint", name))
                })?);
            }
        }

        if let Some(sort) = &self.sort {
            params.sort_column = Some(SortColumn::resolve(sort).ok_or_else(|| {
                ApiError::BadRequest(format!("sort: unknown field '{}'", sort))
            })?);
        }
        params.sort_direction = match self.direction.as_deref() {
            Some("asc") => Some(SortDirection::Asc),
            Some("desc") => Some(SortDirection::Desc),
            Some(other) => {
                return Err(ApiError::BadRequest(format!(
                    "direction: expected asc or desc, got '{}'",
                    other
                )))
            }
            None => None,
        };

        Ok((self.q, params))
    }
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: SearchResults,
    /// Non-fatal normalization warnings (unknown sort fields and the like)
    warnings: Vec<String>,
}

async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(args): Query<SearchArgs>,
) -> ApiResult<Json<SearchResponse>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let (raw, params) = args.into_params(ctx.show_restricted())?;

    let (query, warnings) = normalize(raw.as_deref(), &params);
    let results = state.search.search(&query).await?;
    Ok(Json(SearchResponse { results, warnings }))
}

/// Owner filters for a works listing; at most one applies
#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    user: Option<Uuid>,
    login: Option<String>,
    pseud: Option<String>,
    collection: Option<String>,
    tag: Option<String>,
    page: Option<u32>,
}

async fn list_works(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(args): Query<ListArgs>,
) -> ApiResult<Json<Value>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;

    let scope = match resolve_scope(&state, &args).await? {
        Ok(scope) => scope,
        // Non-canonical tag: answer with the redirect instead of a listing
        Err(target) => {
            return Ok(Json(json!({ "outcome": Outcome::redirected(target) })));
        }
    };

    let params = SearchParams {
        page: args.page,
        show_restricted: ctx.show_restricted(),
        filter_ids: scope
            .as_ref()
            .and_then(|s| s.implied_filter_id())
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let (query, _) = normalize(None, &params);
    let results = state.search.search(&query).await?;

    Ok(Json(json!({
        "scope": scope.as_ref().map(|s| s.display_name()),
        "results": results,
    })))
}

async fn resolve_scope(
    state: &AppState,
    args: &ListArgs,
) -> ApiResult<Result<Option<OwnerScope>, Target>> {
    if let Some(name) = &args.tag {
        return match resolve_tag_scope(state.store.as_ref(), name).await? {
            TagResolution::Scoped(tag) => Ok(Ok(Some(OwnerScope::Tag(tag)))),
            TagResolution::Redirect(target) => Ok(Err(target)),
        };
    }
    if let Some(name) = &args.pseud {
        let mut pseuds = state.store.find_pseuds_by_name(name).await?;
        return match pseuds.len() {
            0 => Err(ApiError::NotFound(format!("pseud '{}'", name))),
            1 => Ok(Ok(pseuds.pop().map(OwnerScope::Pseud))),
            _ => Err(ApiError::BadRequest(format!(
                "pseud '{}' is ambiguous",
                name
            ))),
        };
    }
    if let Some(name) = &args.collection {
        let collection = state
            .store
            .find_collection_by_name(name)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("collection '{}'", name)))?;
        return Ok(Ok(Some(OwnerScope::Collection(collection))));
    }
    if let Some(id) = args.user {
        return Ok(Ok(Some(OwnerScope::User(UserHandle {
            id,
            login: args.login.clone().unwrap_or_default(),
        }))));
    }
    Ok(Ok(None))
}

async fn list_drafts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let user = ctx.require_user()?;
    let drafts = state.store.unposted_works_for(user.id).await?;
    Ok(Json(json!({ "drafts": drafts })))
}

async fn reindex(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Outcome>> {
    let ctx = RequestContext::from_headers(&headers, state.store.as_ref()).await?;
    let allowed = ctx
        .user
        .as_ref()
        .map(|u| u.is_admin || u.is_tag_wrangler)
        .unwrap_or(false);
    if !allowed {
        return Err(ApiError::Forbidden(
            "Only an admin or tag wrangler may queue a work for reindexing.".to_string(),
        ));
    }

    state
        .store
        .find_work(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("work {}", id)))?;
    state.search.queue_reindex(&[id]).await?;

    Ok(Json(
        Outcome::redirected(Target::Work { id }).with_notice(Notice::QueuedForReindex),
    ))
}
