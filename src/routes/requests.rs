use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::requests::{
        AddServiceRequest, CartSummary, DraftLine, RequestList, ResolveRequest,
        UpdateDetailsRequest, UpdateLineRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{LineItem, Request, RequestDetail},
    response::ApiResponse,
    routes::params::RequestListQuery,
    services::request_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests))
        .route("/cart", get(cart_summary))
        .route("/draft/services/{service_id}", post(add_to_draft))
        .route(
            "/{id}",
            get(get_request).patch(update_details).delete(delete_request),
        )
        .route("/{id}/form", post(form_request))
        .route("/{id}/resolve", post(resolve_request))
        .route(
            "/{id}/services/{service_id}",
            post(add_line).patch(update_line).delete(remove_line),
        )
}

#[utoipa::path(
    get,
    path = "/api/requests",
    params(
        ("status" = Option<String>, Query, description = "draft | formed | completed | rejected"),
        ("date_from" = Option<String>, Query, description = "YYYY-MM-DD, inclusive"),
        ("date_to" = Option<String>, Query, description = "YYYY-MM-DD, inclusive"),
        ("sort_order" = Option<String>, Query, description = "asc | desc by creation time"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "Visible requests", body = ApiResponse<RequestList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RequestListQuery>,
) -> AppResult<Json<ApiResponse<RequestList>>> {
    let resp = request_service::list_requests(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/requests/cart",
    responses(
        (status = 200, description = "Current draft and its line count", body = ApiResponse<CartSummary>)
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn cart_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartSummary>>> {
    let resp = request_service::cart_summary(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/requests/draft/services/{service_id}",
    params(
        ("service_id" = Uuid, Path, description = "Service ID")
    ),
    request_body = AddServiceRequest,
    responses(
        (status = 200, description = "Line added to the caller's draft", body = ApiResponse<DraftLine>),
        (status = 400, description = "Non-positive quantity"),
        (status = 404, description = "Service not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn add_to_draft(
    State(state): State<AppState>,
    user: AuthUser,
    Path(service_id): Path<Uuid>,
    Json(payload): Json<AddServiceRequest>,
) -> AppResult<Json<ApiResponse<DraftLine>>> {
    let resp = request_service::add_to_draft(&state, &user, service_id, payload.quantity).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request with lines", body = ApiResponse<RequestDetail>),
        (status = 403, description = "Not visible to the caller"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn get_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RequestDetail>>> {
    let resp = request_service::get_request(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/requests/{id}",
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    request_body = UpdateDetailsRequest,
    responses(
        (status = 200, description = "Draft details updated", body = ApiResponse<Request>),
        (status = 422, description = "Request is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn update_details(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDetailsRequest>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let resp = request_service::update_details(&state, &user, id, payload.address).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Draft deleted"),
        (status = 403, description = "Caller is not the creator"),
        (status = 422, description = "Request is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn delete_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = request_service::delete_request(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/requests/{id}/form",
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request submitted for moderation", body = ApiResponse<Request>),
        (status = 403, description = "Caller is not the creator"),
        (status = 422, description = "Request is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn form_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let resp = request_service::form_request(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/requests/{id}/resolve",
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Request accepted or rejected", body = ApiResponse<Request>),
        (status = 403, description = "Caller cannot resolve requests"),
        (status = 422, description = "Request is not formed")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn resolve_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveRequest>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let resp = request_service::resolve_request(&state, &user, id, payload.outcome).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/requests/{id}/services/{service_id}",
    params(
        ("id" = Uuid, Path, description = "Request ID"),
        ("service_id" = Uuid, Path, description = "Service ID")
    ),
    request_body = AddServiceRequest,
    responses(
        (status = 200, description = "Line added or incremented", body = ApiResponse<DraftLine>),
        (status = 422, description = "Request is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn add_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, service_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AddServiceRequest>,
) -> AppResult<Json<ApiResponse<DraftLine>>> {
    let resp = request_service::add_line(&state, &user, id, service_id, payload.quantity).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/requests/{id}/services/{service_id}",
    params(
        ("id" = Uuid, Path, description = "Request ID"),
        ("service_id" = Uuid, Path, description = "Service ID")
    ),
    request_body = UpdateLineRequest,
    responses(
        (status = 200, description = "Line repriced", body = ApiResponse<LineItem>),
        (status = 400, description = "Nothing to update or non-positive value"),
        (status = 404, description = "Line not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn update_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, service_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateLineRequest>,
) -> AppResult<Json<ApiResponse<LineItem>>> {
    let resp = request_service::update_line(&state, &user, id, service_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/requests/{id}/services/{service_id}",
    params(
        ("id" = Uuid, Path, description = "Request ID"),
        ("service_id" = Uuid, Path, description = "Service ID")
    ),
    responses(
        (status = 200, description = "Line removed (or already absent)", body = ApiResponse<Request>),
        (status = 422, description = "Request is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn remove_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, service_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let resp = request_service::remove_line(&state, &user, id, service_id).await?;
    Ok(Json(resp))
}
