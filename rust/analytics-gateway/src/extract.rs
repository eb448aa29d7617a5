//! Request extractors whose rejections render through [`ServiceError`].

use crate::error::ServiceError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body; malformed input or a missing JSON content type is a 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServiceError))]
pub struct ApiQuery<T>(pub T);
