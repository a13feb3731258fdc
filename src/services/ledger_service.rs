//! Line items of a request. Callers hold the owning request's row lock and
//! recompute the request total inside the same transaction.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, Statement,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    entity::{
        line_items::{ActiveModel as LineActive, Column as LineCol, Entity as LineItems, Model as LineModel},
        services::{Column as ServiceCol, Entity as Services, Model as ServiceModel},
    },
    error::{AppError, AppResult},
    pricing,
};

const UPSERT_LINE: &str = r#"
    INSERT INTO line_items (request_id, service_id, quantity, tariff_snapshot, total)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (request_id, service_id) DO UPDATE SET
        quantity = line_items.quantity + EXCLUDED.quantity,
        total = EXCLUDED.total,
        updated_at = now()
    RETURNING *
"#;

pub async fn live_service<C: ConnectionTrait>(conn: &C, service_id: Uuid) -> AppResult<ServiceModel> {
    Services::find_by_id(service_id)
        .filter(ServiceCol::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Create the line at the current catalog tariff, or grow an existing one at
/// its own effective tariff. The total is priced here from the line read under
/// the request lock, so amounts that would leave the decimal range are
/// rejected before the upsert runs.
pub async fn add_or_increment<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    service: &ServiceModel,
    quantity: Decimal,
) -> AppResult<LineModel> {
    pricing::ensure_positive_quantity(quantity)?;

    let existing = LineItems::find_by_id((request_id, service.id))
        .one(conn)
        .await?;
    let (line_total, previous_total) = match &existing {
        Some(line) => {
            let effective = pricing::effective_tariff(line.tariff_snapshot, line.tariff_override);
            let (_, total) = pricing::incremented(effective, line.quantity, quantity)?;
            (total, Some(line.total))
        }
        None => (pricing::line_total(service.tariff, quantity)?, None),
    };
    let current_sum = sum_line_totals(conn, request_id).await?;
    pricing::adjusted_sum(current_sum, previous_total, line_total)?;

    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        UPSERT_LINE,
        [
            request_id.into(),
            service.id.into(),
            quantity.into(),
            service.tariff.into(),
            line_total.into(),
        ],
    );

    LineItems::find()
        .from_raw_sql(stmt)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("line upsert returned no row")))
}

/// Reject an update that changes nothing or carries a non-positive value.
pub fn validate_update(quantity: Option<Decimal>, tariff_override: Option<Decimal>) -> AppResult<()> {
    if quantity.is_none() && tariff_override.is_none() {
        return Err(AppError::BadRequest(
            "quantity or tariff_override is required".to_string(),
        ));
    }
    if let Some(quantity) = quantity {
        pricing::ensure_positive_quantity(quantity)?;
    }
    if let Some(tariff) = tariff_override {
        pricing::ensure_positive_tariff(tariff)?;
    }
    Ok(())
}

pub async fn update_line<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    service_id: Uuid,
    quantity: Option<Decimal>,
    tariff_override: Option<Decimal>,
) -> AppResult<LineModel> {
    validate_update(quantity, tariff_override)?;

    let existing = LineItems::find_by_id((request_id, service_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let previous_effective =
        pricing::effective_tariff(existing.tariff_snapshot, existing.tariff_override);
    let total = pricing::repriced_total(
        previous_effective,
        existing.quantity,
        quantity,
        tariff_override,
    )?;
    let current_sum = sum_line_totals(conn, request_id).await?;
    pricing::adjusted_sum(current_sum, Some(existing.total), total)?;

    let mut active: LineActive = existing.into();
    if let Some(quantity) = quantity {
        active.quantity = Set(quantity);
    }
    if let Some(tariff) = tariff_override {
        active.tariff_override = Set(Some(tariff));
    }
    active.total = Set(total);
    active.updated_at = Set(Utc::now().fixed_offset());

    Ok(active.update(conn).await?)
}

/// Returns whether a line was removed; an absent line is not an error.
pub async fn remove_line<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    service_id: Uuid,
) -> AppResult<bool> {
    let result = LineItems::delete_by_id((request_id, service_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

pub async fn sum_line_totals<C: ConnectionTrait>(conn: &C, request_id: Uuid) -> AppResult<Decimal> {
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT COALESCE(SUM(total), 0) AS total FROM line_items WHERE request_id = $1",
            [request_id.into()],
        ))
        .await?;

    match row {
        Some(row) => Ok(row.try_get::<Decimal>("", "total")?),
        None => Ok(Decimal::ZERO),
    }
}

pub async fn count_lines<C: ConnectionTrait>(conn: &C, request_id: Uuid) -> AppResult<u64> {
    Ok(LineItems::find()
        .filter(LineCol::RequestId.eq(request_id))
        .count(conn)
        .await?)
}

/// Lines with their services, soft-deleted services included.
pub async fn lines_for_request<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> AppResult<Vec<(LineModel, Option<ServiceModel>)>> {
    Ok(LineItems::find()
        .filter(LineCol::RequestId.eq(request_id))
        .find_also_related(Services)
        .order_by_asc(LineCol::CreatedAt)
        .all(conn)
        .await?)
}
