use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// Sanitize
///
/// Normalization applied to a request payload before validation runs
/// (trimming, case folding, dropping blank optionals).
pub trait Sanitize {
    fn sanitize(&mut self) {}
}

/// ValidJson
///
/// Drop-in replacement for `Json<T>` that sanitizes and validates the payload.
/// Malformed JSON becomes a 400 with the JSON envelope instead of axum's plain
/// text rejection, and failed validation becomes [`ApiError::Validation`].
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Sanitize,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

        payload.sanitize();
        payload.validate()?;

        Ok(Self(payload))
    }
}

/// Trims a required string in place.
pub fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Trims an optional string, collapsing blank values to `None`.
pub fn trim_optional(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

/// `apellido_paterno` -> `apellidoPaterno`, matching the JSON field names.
pub fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for ch in field.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
