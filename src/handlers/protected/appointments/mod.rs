pub mod actions;
pub mod create;
pub mod list;
pub mod show;
pub mod status;

pub use actions::{cancel, check_in, complete, confirm, no_show, reschedule, start};
pub use create::create;
pub use list::list;
pub use show::show;
pub use status::update_status;

use axum::{extract::rejection::JsonRejection, Json};
use uuid::Uuid;

use crate::error::ApiError;

/// Parse an appointment id from a path or body; malformed ids are a validation error
pub(crate) fn parse_appointment_id(field: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::invalid_field(field, "Identificador de cita inválido"))
}

/// Unwrap a JSON body, keeping extractor failures inside the error envelope
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        ApiError::bad_request("Cuerpo de la solicitud inválido")
    })
}

/// Like [`json_body`], but a request sent without a JSON body yields `T::default()`
pub(crate) fn optional_json_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        other => json_body(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header, Request},
    };
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Notes {
        notes: Option<String>,
    }

    async fn extract(request: Request<Body>) -> Result<Json<Notes>, JsonRejection> {
        Json::<Notes>::from_request(request, &()).await
    }

    fn json_request(body: &'static str) -> Request<Body> {
        Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_body_falls_back_to_default() {
        let request = Request::post("/").body(Body::empty()).unwrap();
        assert_eq!(optional_json_body(extract(request).await).unwrap(), Notes::default());
    }

    #[tokio::test]
    async fn malformed_optional_body_is_rejected() {
        let err = optional_json_body(extract(json_request(r#"{"notes": 5}"#)).await).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let parsed = optional_json_body(extract(json_request(r#"{"notes": "ok"}"#)).await).unwrap();
        assert_eq!(parsed.notes.as_deref(), Some("ok"));
    }

    #[test]
    fn appointment_ids_are_validated() {
        assert!(parse_appointment_id("id", "6f1c2a4e-9d1b-4c3a-8f2e-1a2b3c4d5e6f").is_ok());
        assert!(matches!(
            parse_appointment_id("id", "42"),
            Err(ApiError::ValidationError { .. })
        ));
    }
}
