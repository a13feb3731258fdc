use axum::body::Bytes;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit,
    dto::services::{CreateServiceRequest, ServiceList, UpdateServiceRequest},
    entity::services::{ActiveModel, Column, Entity as Services, Model as ServiceModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability, ensure_capability},
    models::{UtilityService, service_from_entity},
    pricing::ensure_positive_tariff,
    response::{ApiResponse, Meta},
    routes::params::{ServiceQuery, ServiceSortBy, SortOrder},
    state::AppState,
    storage::objects::extension_for,
};

pub async fn list_services(
    state: &AppState,
    query: ServiceQuery,
) -> AppResult<ApiResponse<ServiceList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(Column::DeletedAt.is_null());

    if let Some(search) = query.term() {
        let pattern = format!("%{}%", escape_like(search));
        let mut matches = Condition::any().add(Expr::col(Column::Title).ilike(pattern.clone()));
        if !query.title_only {
            matches = matches.add(Expr::col(Column::Description).ilike(pattern));
        }
        condition = condition.add(matches);
    }

    if let Some(min_tariff) = query.min_tariff {
        condition = condition.add(Column::Tariff.gte(min_tariff));
    }

    if let Some(max_tariff) = query.max_tariff {
        condition = condition.add(Column::Tariff.lte(max_tariff));
    }

    let sort_col = match query.sort_by.unwrap_or(ServiceSortBy::Title) {
        ServiceSortBy::CreatedAt => Column::CreatedAt,
        ServiceSortBy::Tariff => Column::Tariff,
        ServiceSortBy::Title => Column::Title,
    };

    let mut finder = Services::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Asc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };
    finder = finder.order_by_asc(Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(service_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Services", ServiceList { items }, Some(meta)))
}

/// Live catalog entry by id.
pub async fn find_live(state: &AppState, id: Uuid) -> AppResult<ServiceModel> {
    Services::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get_service(state: &AppState, id: Uuid) -> AppResult<ApiResponse<UtilityService>> {
    let service = find_live(state, id).await?;
    Ok(ApiResponse::success("Service", service_from_entity(service), None))
}

pub async fn create_service(
    state: &AppState,
    user: &AuthUser,
    payload: CreateServiceRequest,
) -> AppResult<ApiResponse<UtilityService>> {
    ensure_capability(user, Capability::ManageCatalog)?;
    let title = required_text("title", payload.title)?;
    let unit = required_text("unit", payload.unit)?;
    ensure_positive_tariff(payload.tariff)?;

    let service = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        description: Set(payload.description),
        unit: Set(unit),
        tariff: Set(payload.tariff),
        image_url: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: Set(None),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "service_create",
        "services",
        serde_json::json!({ "service_id": service.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Service created",
        service_from_entity(service),
        Some(Meta::empty()),
    ))
}

pub async fn update_service(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateServiceRequest,
) -> AppResult<ApiResponse<UtilityService>> {
    ensure_capability(user, Capability::ManageCatalog)?;
    if let Some(tariff) = payload.tariff {
        ensure_positive_tariff(tariff)?;
    }

    let txn = state.orm.begin().await?;
    let existing = Services::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(required_text("title", title)?);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(unit) = payload.unit {
        active.unit = Set(required_text("unit", unit)?);
    }
    if let Some(tariff) = payload.tariff {
        active.tariff = Set(tariff);
    }
    active.updated_at = Set(Utc::now().fixed_offset());

    let service = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "service_update",
        "services",
        serde_json::json!({ "service_id": service.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        service_from_entity(service),
        Some(Meta::empty()),
    ))
}

/// Soft delete: the row stays so existing lines keep resolving their service.
pub async fn delete_service(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_capability(user, Capability::ManageCatalog)?;

    let txn = state.orm.begin().await?;
    let existing = Services::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let image_url = existing.image_url.clone();
    let now = Utc::now().fixed_offset();
    let mut active: ActiveModel = existing.into();
    active.image_url = Set(None);
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    if let Some(url) = image_url {
        remove_image_best_effort(state, &url).await;
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "service_delete",
        "services",
        serde_json::json!({ "service_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn attach_image(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    content_type: &str,
    body: Bytes,
) -> AppResult<ApiResponse<UtilityService>> {
    ensure_capability(user, Capability::ManageCatalog)?;
    if body.is_empty() {
        return Err(AppError::BadRequest("image body is empty".to_string()));
    }
    if extension_for(content_type).is_none() {
        return Err(AppError::BadRequest(format!(
            "unsupported image type: {content_type}"
        )));
    }

    let new_url = state.objects.put(&body, content_type).await?;

    let swapped = swap_image_url(state, id, &new_url).await;
    let (service, previous) = match swapped {
        Ok(result) => result,
        Err(err) => {
            remove_image_best_effort(state, &new_url).await;
            return Err(err);
        }
    };

    if let Some(url) = previous {
        remove_image_best_effort(state, &url).await;
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "service_image",
        "services",
        serde_json::json!({ "service_id": id, "image_url": new_url }),
    )
    .await;

    Ok(ApiResponse::success(
        "Image attached",
        service_from_entity(service),
        Some(Meta::empty()),
    ))
}

async fn swap_image_url(
    state: &AppState,
    id: Uuid,
    new_url: &str,
) -> AppResult<(ServiceModel, Option<String>)> {
    let txn = state.orm.begin().await?;
    let existing = Services::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let previous = existing.image_url.clone();
    let mut active: ActiveModel = existing.into();
    active.image_url = Set(Some(new_url.to_string()));
    active.updated_at = Set(Utc::now().fixed_offset());
    let service = active.update(&txn).await?;
    txn.commit().await?;

    Ok((service, previous))
}

async fn remove_image_best_effort(state: &AppState, url: &str) {
    if let Err(err) = state.objects.remove(url).await {
        tracing::warn!(error = %err, url, "image removal failed");
    }
}

fn required_text(field: &str, value: String) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_off"), "100\\%\\_off");
        assert_eq!(escape_like("water"), "water");
    }

    #[test]
    fn blank_required_text_is_rejected() {
        assert!(required_text("title", "  ".into()).is_err());
        assert_eq!(required_text("unit", " kWh ".into()).unwrap(), "kWh");
    }
}
