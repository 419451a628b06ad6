use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::response::Failure;

/// A single rejected field of a request payload.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldError {
            field,
            message: message.into(),
        }
    }
}

fn summarize(fields: &[FieldError]) -> String {
    let details: Vec<String> = fields
        .iter()
        .map(|field| format!("{} {}", field.field, field.message))
        .collect();
    format!("Validation failed: {}", details.join("; "))
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("cart for session {0} changed concurrently")]
    Conflict(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{}", summarize(.0))]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Product is out of stock")]
    OutOfStock,

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::BadRequest(_) | ServiceError::OutOfStock => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ServiceError::Validation(fields) => Failure::new(self.to_string()).with_details(fields.clone()),
            ServiceError::Store(source) => {
                error!("request failed: {source}");
                Failure::new("Internal Server Error")
            }
            _ => Failure::new(self.to_string()),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
