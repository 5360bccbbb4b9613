use axum::Json;
use axum::extract::{Extension, State, rejection::JsonRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use listings_api_types::CredentialsRequest;

use crate::application::auth::AuthSession;
use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::Caller;
use crate::infra::http::models::auth_response;
use crate::infra::http::state::HttpState;

pub async fn register(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let session = state
        .auth
        .register(&payload.username, &payload.password)
        .await?;
    session_response(StatusCode::CREATED, session, caller)
}

pub async fn login(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let session = state.auth.login(&payload.username, &payload.password).await?;
    session_response(StatusCode::OK, session, caller)
}

fn session_response(
    status: StatusCode,
    session: AuthSession,
    caller: Caller,
) -> Result<Response, ApiError> {
    let bearer = HeaderValue::from_str(&format!("Bearer {}", session.token))
        .map_err(|err| ApiError::internal(format!("token is not a valid header value: {err}")))?;
    let mut response = (status, Json(auth_response(session, caller.id()))).into_response();
    response.headers_mut().insert(header::AUTHORIZATION, bearer);
    Ok(response)
}
