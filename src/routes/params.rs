use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::entity::RequestStatus;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceSortBy {
    CreatedAt,
    Tariff,
    Title,
}

// page/per_page sit directly on the query structs: serde_urlencoded cannot
// feed numbers through #[serde(flatten)].
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ServiceQuery {
    pub q: Option<String>,
    #[serde(default)]
    pub title_only: bool,
    #[schema(value_type = Option<String>)]
    pub min_tariff: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub max_tariff: Option<Decimal>,
    pub sort_by: Option<ServiceSortBy>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ServiceQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Trimmed search term, `None` when blank.
    pub fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RequestListQuery {
    pub status: Option<RequestStatus>,
    pub date_from: Option<NaiveDate>,
    /// Inclusive: the whole day is covered.
    pub date_to: Option<NaiveDate>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl RequestListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// `[from, to)` instants covering `date_from..=date_to`.
    pub fn time_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let start_of = |day: NaiveDate| day.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let lower = self.date_from.and_then(start_of);
        let upper = self
            .date_to
            .and_then(|day| day.checked_add_days(Days::new(1)))
            .and_then(start_of);
        (lower, upper)
    }
}
