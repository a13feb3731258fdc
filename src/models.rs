use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{Role, RequestStatus, line_items, requests, services, users},
    pricing,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UtilityService {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub unit: String,
    #[schema(value_type = String, example = "3.60")]
    pub tariff: Decimal,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only on services shown inside a request after removal from the catalog.
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Request {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub status: RequestStatus,
    pub address: Option<String>,
    #[schema(value_type = String, example = "1260.0")]
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub moderator_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub request_id: Uuid,
    pub service_id: Uuid,
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[schema(value_type = String)]
    pub tariff_snapshot: Decimal,
    #[schema(value_type = Option<String>)]
    pub tariff_override: Option<Decimal>,
    #[schema(value_type = String)]
    pub effective_tariff: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub service: Option<UtilityService>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: Request,
    pub creator_login: Option<String>,
    pub moderator_login: Option<String>,
    pub lines: Vec<LineItem>,
}

pub fn user_from_entity(model: users::Model) -> User {
    User {
        id: model.id,
        login: model.login,
        role: model.role,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn service_from_entity(model: services::Model) -> UtilityService {
    UtilityService {
        id: model.id,
        title: model.title,
        description: model.description,
        unit: model.unit,
        tariff: model.tariff,
        image_url: model.image_url,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        deleted_at: model.deleted_at.map(|at| at.with_timezone(&Utc)),
    }
}

pub fn request_from_entity(model: requests::Model) -> Request {
    Request {
        id: model.id,
        creator_id: model.creator_id,
        status: model.status,
        address: model.address,
        total_cost: model.total_cost,
        created_at: model.created_at.with_timezone(&Utc),
        formed_at: model.formed_at.map(|at| at.with_timezone(&Utc)),
        resolved_at: model.resolved_at.map(|at| at.with_timezone(&Utc)),
        moderator_id: model.moderator_id,
    }
}

pub fn line_from_entity(model: line_items::Model, service: Option<services::Model>) -> LineItem {
    LineItem {
        request_id: model.request_id,
        service_id: model.service_id,
        quantity: model.quantity,
        tariff_snapshot: model.tariff_snapshot,
        tariff_override: model.tariff_override,
        effective_tariff: pricing::effective_tariff(model.tariff_snapshot, model.tariff_override),
        total: model.total,
        service: service.map(service_from_entity),
    }
}
