use axum::extract::{Extension, Query, State};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::app::AppState;
use crate::appointments::{AppointmentStatus, ClinicQuery};
use crate::database::models::{Appointment, Page};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<ClinicQuery, ApiError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
            Some(raw) => Some(
                raw.parse::<AppointmentStatus>()
                    .map_err(|e| ApiError::invalid_field("status", e.to_string()))?,
            ),
            None => None,
        };

        let date = match self.date.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| ApiError::invalid_field("date", "Fecha inválida"))?,
            ),
            None => None,
        };

        Ok(ClinicQuery {
            status,
            date,
            limit: parse_number("limit", self.limit.as_deref())?,
            offset: parse_number("offset", self.offset.as_deref())?,
        })
    }
}

fn parse_number(field: &str, raw: Option<&str>) -> Result<Option<u32>, ApiError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| ApiError::invalid_field(field, format!("Valor inválido para '{}'", field)))
        })
        .transpose()
}

/// GET /api/appointments?status=&date=&limit=&offset= - clinic schedule
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<Page<Appointment>> {
    let query = params.into_query()?;
    let page = state.appointments.list_clinic(&ctx.actor, query).await?;
    Ok(ApiResponse::success(page))
}
