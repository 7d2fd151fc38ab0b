use serde::Serialize;
pub(crate) mod broadcast_controller;
pub(crate) mod health_check_controller;

/// JSON envelope for the non-streaming endpoints.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    status_code: u16,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self { status_code, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_api_response_wraps_payload_under_data() {
        let response = ApiResponse::new(StatusCode::OK.into(), json!({"subscribers": 2}));

        // Compare as values, key order in the serialized string is not guaranteed
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"status_code": 200, "data": {"subscribers": 2}})
        );
    }
}
