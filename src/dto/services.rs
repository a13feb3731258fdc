use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::UtilityService;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateServiceRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub unit: String,
    #[schema(value_type = String, example = "3.60")]
    pub tariff: Decimal,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateServiceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    #[schema(value_type = Option<String>)]
    pub tariff: Option<Decimal>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ServiceList {
    #[schema(value_type = Vec<UtilityService>)]
    pub items: Vec<UtilityService>,
}
