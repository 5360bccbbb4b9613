use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use listings_api_types::{AdResponse, CreateAdRequest, FeedQuery, FeedResponse, UpdateAdRequest};
use uuid::Uuid;

use crate::application::feed::FeedRequest;
use crate::domain::ads::{AdChanges, AdDraft};
use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::Caller;
use crate::infra::http::models::{ad_response, feed_response};
use crate::infra::http::state::HttpState;

pub async fn list_ads(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<FeedResponse>, ApiError> {
    let Query(query) = query?;
    let request = FeedRequest::from_raw(
        query.page.as_deref(),
        query.page_size.as_deref(),
        query.sort_by.as_deref(),
        query.order.as_deref(),
        query.min_price.as_deref(),
        query.max_price.as_deref(),
    )?;

    let page = state.feed.list_feed(request, caller.id()).await?;
    Ok(Json(feed_response(page)))
}

pub async fn get_ad(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    Path(raw_id): Path<String>,
) -> Result<Json<AdResponse>, ApiError> {
    let id = parse_ad_id(&raw_id)?;
    let view = state.feed.get_advertisement(id, caller.id()).await?;
    Ok(Json(ad_response(view)))
}

pub async fn create_ad(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<CreateAdRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let owner = caller.require()?;
    let Json(payload) = payload?;
    let draft = AdDraft::new(
        owner,
        payload.caption,
        payload.description,
        payload.image_url,
        payload.price,
    )?;

    let view = state.feed.create_advertisement(draft).await?;
    Ok((StatusCode::CREATED, Json(ad_response(view))).into_response())
}

pub async fn update_ad(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateAdRequest>, JsonRejection>,
) -> Result<Json<AdResponse>, ApiError> {
    let caller = caller.require()?;
    let id = parse_ad_id(&raw_id)?;
    let Json(payload) = payload?;
    let changes = AdChanges::new(
        payload.caption,
        payload.description,
        payload.image_url,
        payload.price,
    )?;

    let view = state.feed.update_advertisement(id, caller, changes).await?;
    Ok(Json(ad_response(view)))
}

pub async fn delete_ad(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let caller = caller.require()?;
    let id = parse_ad_id(&raw_id)?;
    state.feed.delete_advertisement(id, caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A malformed id cannot name an existing ad.
fn parse_ad_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found("Advertisement not found"))
}
