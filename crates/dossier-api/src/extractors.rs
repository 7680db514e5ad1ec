//! # Request Extraction Helpers
//!
//! Body and path parsing errors are answered with the same
//! `ValidationError` envelope as engine validation failures.

use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Extract a JSON body, mapping deserialization errors to `ValidationError`.
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::validation(err.body_text()))
}

/// Parse an identifier taken from the path or a form field.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::validation(format!("invalid {what} '{raw}': {e}")))
}
