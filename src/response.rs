//! JSON envelopes shared by every endpoint.
//!
//! Successful responses and failures are separate types, so a handler can
//! never emit `success: true` next to an `error`.

use serde::Serialize;

use crate::error::FieldError;

/// Placeholder meta for envelopes that carry nothing beside `data`/`message`.
#[derive(Serialize, Debug, Clone, Copy, Default)]
pub struct NoMeta {}

#[derive(Serialize, Debug, Clone)]
pub struct Success<T, M = NoMeta> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(flatten)]
    meta: Option<M>,
}

impl<T> Success<T> {
    pub fn data(data: T) -> Self {
        Success {
            success: true,
            data: Some(data),
            message: None,
            meta: None,
        }
    }
}

impl Success<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Success {
            success: true,
            data: None,
            message: Some(message.into()),
            meta: None,
        }
    }
}

impl<T, M> Success<T, M> {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_meta<N>(self, meta: N) -> Success<T, N> {
        Success {
            success: self.success,
            data: self.data,
            message: self.message,
            meta: Some(meta),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Failure {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Failure {
            success: false,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Pagination meta attached to product listings.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListingMeta {
    pub count: usize,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub sort_by: &'static str,
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct CountMeta {
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn data_envelope_omits_absent_fields() {
        let value = serde_json::to_value(Success::data(vec![1, 2])).unwrap();

        assert_eq!(value, json!({ "success": true, "data": [1, 2] }));
    }

    #[test]
    fn meta_is_flattened_into_envelope() {
        let value = serde_json::to_value(
            Success::data(vec!["a"]).with_meta(CountMeta { count: 1 }),
        )
        .unwrap();

        assert_eq!(value, json!({ "success": true, "data": ["a"], "count": 1 }));
    }

    #[test]
    fn message_envelope_has_no_data() {
        let value = serde_json::to_value(Success::message("Cart cleared successfully")).unwrap();

        assert_eq!(value, json!({ "success": true, "message": "Cart cleared successfully" }));
    }

    #[test]
    fn failure_envelope() {
        let value = serde_json::to_value(Failure::new("Cart not found")).unwrap();

        assert_eq!(value, json!({ "success": false, "error": "Cart not found" }));
    }
}
