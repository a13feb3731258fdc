use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, DbBackend,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit,
    dto::requests::{CartSummary, DraftLine, RequestList, ResolveOutcome, UpdateLineRequest},
    entity::{
        RequestStatus,
        requests::{ActiveModel as RequestActive, Column as RequestCol, Entity as Requests, Model as RequestModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    lifecycle::{RequestAction, next_status},
    middleware::auth::{AuthUser, Capability, ensure_capability},
    models::{LineItem, Request, RequestDetail, line_from_entity, request_from_entity},
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{RequestListQuery, SortOrder},
    services::ledger_service,
    state::AppState,
};

const INSERT_DRAFT: &str = r#"
    INSERT INTO requests (id, creator_id, status, total_cost)
    VALUES ($1, $2, 'draft', 0)
    ON CONFLICT (creator_id) WHERE status = 'draft' DO NOTHING
    RETURNING *
"#;

/// Current draft of `creator_id`, created when there is none. Concurrent
/// callers converge on the same row through the one-draft-per-creator index.
pub async fn create_or_get_draft<C: ConnectionTrait>(
    conn: &C,
    creator_id: Uuid,
) -> AppResult<RequestModel> {
    let inserted = Requests::find()
        .from_raw_sql(Statement::from_sql_and_values(
            DbBackend::Postgres,
            INSERT_DRAFT,
            [Uuid::new_v4().into(), creator_id.into()],
        ))
        .one(conn)
        .await?;

    if let Some(draft) = inserted {
        tracing::debug!(request_id = %draft.id, creator_id = %creator_id, "draft created");
        return Ok(draft);
    }

    Requests::find()
        .filter(RequestCol::CreatorId.eq(creator_id))
        .filter(RequestCol::Status.eq(RequestStatus::Draft))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Conflict("draft changed concurrently, retry".to_string()))
}

/// Lock the request row for the rest of the transaction. Deleted requests are
/// returned too so the transition table can reject them.
async fn lock_request(txn: &DatabaseTransaction, id: Uuid) -> AppResult<RequestModel> {
    Requests::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

fn ensure_creator(user: &AuthUser, request: &RequestModel) -> AppResult<()> {
    if request.creator_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Lines of a draft may be edited by its creator or by a moderator.
fn ensure_line_editor(user: &AuthUser, request: &RequestModel) -> AppResult<()> {
    if request.creator_id != user.user_id && !user.can(Capability::ResolveRequests) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Persist `sum(line totals)` as the request total; the only writer of
/// `total_cost` apart from the completion freeze.
pub async fn recompute_total<C: ConnectionTrait>(conn: &C, request_id: Uuid) -> AppResult<Decimal> {
    let total = ledger_service::sum_line_totals(conn, request_id).await?;
    Requests::update_many()
        .col_expr(RequestCol::TotalCost, Expr::value(total))
        .filter(RequestCol::Id.eq(request_id))
        .exec(conn)
        .await?;
    Ok(total)
}

async fn add_line_locked(
    txn: &DatabaseTransaction,
    mut request: RequestModel,
    service_id: Uuid,
    quantity: Decimal,
) -> AppResult<DraftLine> {
    next_status(request.status, RequestAction::EditDraft)?;
    let service = ledger_service::live_service(txn, service_id).await?;
    let line = ledger_service::add_or_increment(txn, request.id, &service, quantity).await?;
    request.total_cost = recompute_total(txn, request.id).await?;

    Ok(DraftLine {
        request: request_from_entity(request),
        line: line_from_entity(line, Some(service)),
    })
}

pub async fn add_to_draft(
    state: &AppState,
    user: &AuthUser,
    service_id: Uuid,
    quantity: Decimal,
) -> AppResult<ApiResponse<DraftLine>> {
    pricing::ensure_positive_quantity(quantity)?;

    let txn = state.orm.begin().await?;
    let draft = create_or_get_draft(&txn, user.user_id).await?;
    let draft = lock_request(&txn, draft.id).await?;
    let added = add_line_locked(&txn, draft, service_id, quantity).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "request_add_service",
        "requests",
        serde_json::json!({ "request_id": added.request.id, "service_id": service_id, "quantity": quantity }),
    )
    .await;

    Ok(ApiResponse::success("Service added", added, Some(Meta::empty())))
}

/// Add to a specific request; only its creator may, and only while it is a draft.
pub async fn add_line(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
    service_id: Uuid,
    quantity: Decimal,
) -> AppResult<ApiResponse<DraftLine>> {
    pricing::ensure_positive_quantity(quantity)?;

    let txn = state.orm.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    ensure_creator(user, &request)?;
    let added = add_line_locked(&txn, request, service_id, quantity).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "request_add_service",
        "requests",
        serde_json::json!({ "request_id": request_id, "service_id": service_id, "quantity": quantity }),
    )
    .await;

    Ok(ApiResponse::success("Service added", added, Some(Meta::empty())))
}

pub async fn update_line(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
    service_id: Uuid,
    payload: UpdateLineRequest,
) -> AppResult<ApiResponse<LineItem>> {
    if payload.tariff_override.is_some() {
        ensure_capability(user, Capability::OverrideTariff)?;
    }
    ledger_service::validate_update(payload.quantity, payload.tariff_override)?;

    let txn = state.orm.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    ensure_line_editor(user, &request)?;
    next_status(request.status, RequestAction::EditDraft)?;

    let line = ledger_service::update_line(
        &txn,
        request_id,
        service_id,
        payload.quantity,
        payload.tariff_override,
    )
    .await?;
    recompute_total(&txn, request_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "request_update_service",
        "requests",
        serde_json::json!({
            "request_id": request_id,
            "service_id": service_id,
            "quantity": payload.quantity,
            "tariff_override": payload.tariff_override,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Line updated",
        line_from_entity(line, None),
        Some(Meta::empty()),
    ))
}

pub async fn remove_line(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
    service_id: Uuid,
) -> AppResult<ApiResponse<Request>> {
    let txn = state.orm.begin().await?;
    let mut request = lock_request(&txn, request_id).await?;
    ensure_line_editor(user, &request)?;
    next_status(request.status, RequestAction::EditDraft)?;

    let removed = ledger_service::remove_line(&txn, request_id, service_id).await?;
    request.total_cost = recompute_total(&txn, request_id).await?;
    txn.commit().await?;

    if removed {
        audit::record(
            &state.pool,
            Some(user.user_id),
            "request_remove_service",
            "requests",
            serde_json::json!({ "request_id": request_id, "service_id": service_id }),
        )
        .await;
    }

    Ok(ApiResponse::success(
        "Line removed",
        request_from_entity(request),
        Some(Meta::empty()),
    ))
}

pub async fn update_details(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
    address: Option<String>,
) -> AppResult<ApiResponse<Request>> {
    let txn = state.orm.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    ensure_creator(user, &request)?;
    next_status(request.status, RequestAction::EditDraft)?;

    let address = address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    let mut active: RequestActive = request.into();
    active.address = Set(address);
    let request = active.update(&txn).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Request updated",
        request_from_entity(request),
        Some(Meta::empty()),
    ))
}

pub async fn form_request(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
) -> AppResult<ApiResponse<Request>> {
    let txn = state.orm.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    ensure_creator(user, &request)?;
    let next = next_status(request.status, RequestAction::Form)?;

    let mut active: RequestActive = request.into();
    active.status = Set(next);
    active.formed_at = Set(Some(Utc::now().fixed_offset()));
    let request = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "request_form",
        "requests",
        serde_json::json!({ "request_id": request.id, "total_cost": request.total_cost }),
    )
    .await;

    Ok(ApiResponse::success(
        "Request formed",
        request_from_entity(request),
        Some(Meta::empty()),
    ))
}

pub async fn delete_request(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    ensure_creator(user, &request)?;
    let next = next_status(request.status, RequestAction::Delete)?;

    let mut active: RequestActive = request.into();
    active.status = Set(next);
    active.deleted_at = Set(Some(Utc::now().fixed_offset()));
    active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "request_delete",
        "requests",
        serde_json::json!({ "request_id": request_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn resolve_request(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
    outcome: ResolveOutcome,
) -> AppResult<ApiResponse<Request>> {
    ensure_capability(user, Capability::ResolveRequests)?;

    let txn = state.orm.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    let action = match outcome {
        ResolveOutcome::Accept => RequestAction::Accept,
        ResolveOutcome::Reject => RequestAction::Reject,
    };
    let next = next_status(request.status, action)?;

    let mut active: RequestActive = request.into();
    if next == RequestStatus::Completed {
        active.total_cost = Set(ledger_service::sum_line_totals(&txn, request_id).await?);
    }
    active.status = Set(next);
    active.resolved_at = Set(Some(Utc::now().fixed_offset()));
    active.moderator_id = Set(Some(user.user_id));
    let request = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        request_id = %request.id,
        moderator_id = %user.user_id,
        status = request.status.label(),
        "request resolved"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "request_resolve",
        "requests",
        serde_json::json!({ "request_id": request.id, "status": request.status.label() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Request resolved",
        request_from_entity(request),
        Some(Meta::empty()),
    ))
}

pub async fn get_request(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
) -> AppResult<ApiResponse<RequestDetail>> {
    let request = Requests::find_by_id(request_id)
        .filter(RequestCol::Status.ne(RequestStatus::Deleted))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if request.creator_id != user.user_id && !user.can(Capability::ViewAllRequests) {
        return Err(AppError::Forbidden);
    }

    let lines = ledger_service::lines_for_request(&state.orm, request.id)
        .await?
        .into_iter()
        .map(|(line, service)| line_from_entity(line, service))
        .collect();

    let creator_login = Users::find_by_id(request.creator_id)
        .one(&state.orm)
        .await?
        .map(|u| u.login);
    let moderator_login = match request.moderator_id {
        Some(id) => Users::find_by_id(id).one(&state.orm).await?.map(|u| u.login),
        None => None,
    };

    let detail = RequestDetail {
        request: request_from_entity(request),
        creator_login,
        moderator_login,
        lines,
    };
    Ok(ApiResponse::success("Request", detail, None))
}

pub async fn list_requests(
    state: &AppState,
    user: &AuthUser,
    query: RequestListQuery,
) -> AppResult<ApiResponse<RequestList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(RequestCol::Status.ne(RequestStatus::Deleted));

    if !user.can(Capability::ViewAllRequests) {
        condition = condition.add(RequestCol::CreatorId.eq(user.user_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(RequestCol::Status.eq(status));
    }

    let (from, to) = query.time_bounds();
    if from.is_some() || to.is_some() {
        let mut drafts = Condition::all().add(RequestCol::Status.eq(RequestStatus::Draft));
        let mut others = Condition::all().add(RequestCol::Status.ne(RequestStatus::Draft));
        if let Some(from) = from {
            drafts = drafts.add(RequestCol::CreatedAt.gte(from.fixed_offset()));
            others = others.add(RequestCol::FormedAt.gte(from.fixed_offset()));
        }
        if let Some(to) = to {
            drafts = drafts.add(RequestCol::CreatedAt.lt(to.fixed_offset()));
            others = others.add(RequestCol::FormedAt.lt(to.fixed_offset()));
        }
        condition = condition.add(Condition::any().add(drafts).add(others));
    }

    let mut finder = Requests::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(RequestCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(RequestCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(request_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Requests", RequestList { items }, Some(meta)))
}

pub async fn cart_summary(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CartSummary>> {
    let draft = Requests::find()
        .filter(RequestCol::CreatorId.eq(user.user_id))
        .filter(RequestCol::Status.eq(RequestStatus::Draft))
        .one(&state.orm)
        .await?;

    let summary = match draft {
        Some(draft) => CartSummary {
            draft_id: Some(draft.id),
            line_count: ledger_service::count_lines(&state.orm, draft.id).await?,
        },
        None => CartSummary {
            draft_id: None,
            line_count: 0,
        },
    };
    Ok(ApiResponse::success("Cart", summary, None))
}
