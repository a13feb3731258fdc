use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{LineItem, Request};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddServiceRequest {
    #[schema(value_type = String, example = "300")]
    pub quantity: Decimal,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateLineRequest {
    #[schema(value_type = Option<String>)]
    pub quantity: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub tariff_override: Option<Decimal>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDetailsRequest {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    Accept,
    Reject,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequest {
    pub outcome: ResolveOutcome,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartSummary {
    pub draft_id: Option<Uuid>,
    pub line_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DraftLine {
    pub request: Request,
    pub line: LineItem,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct RequestList {
    #[schema(value_type = Vec<Request>)]
    pub items: Vec<Request>,
}
