//! JSON body extractor reporting decode failures as field errors.

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::Value;

use hearing_core::error::CoreError;
use hearing_core::validation::ValidationErrors;

use crate::error::AppError;

/// Key used for failures not attributable to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub const MSG_REQUIRED: &str = "This field is required.";

/// A `Json<T>` replacement whose rejections use the API's error shapes.
///
/// Bodies that are not JSON at all are a 400 `BAD_REQUEST`. Well-formed
/// JSON that does not fit `T` is a 400 field map keyed by the path of the
/// offending value, e.g. `{"sections[1].type": ["This field is required."]}`.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        let decoded = decode(value).map_err(|errors| AppError::Core(CoreError::from(errors)))?;
        Ok(AppJson(decoded))
    }
}

/// Decode `value` into `T`, keying the failure by its path in the document.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ValidationErrors> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let message = err.inner().to_string();

        let mut errors = ValidationErrors::new();
        match missing_field(&message) {
            Some(field) if path == "." => errors.add(field, MSG_REQUIRED),
            Some(field) => errors.add(format!("{path}.{field}"), MSG_REQUIRED),
            None if path == "." => errors.add(NON_FIELD_ERRORS, message),
            None => errors.add(path, message),
        }
        errors
    })
}

/// Field name from serde's "missing field `name`" message.
fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.strip_suffix('`'))
}
