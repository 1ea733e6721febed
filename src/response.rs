//! Uniform `{code, msg, data}` envelope returned to API clients.

use serde::{Deserialize, Serialize};

use crate::service::ServiceError;

/// Code of a successful response.
pub const CODE_SUCCESS: u16 = 200;

/// ApiResponse wraps every result handed to the HTTP layer.
///
/// ```json
/// { "code": 200, "msg": "success", "data": { ... } }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            msg: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }

    /// Maps a service failure onto an HTTP-like status code.
    pub fn from_error(err: &ServiceError) -> Self {
        Self::error(status_code(err), err.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

impl<T> From<Result<T, ServiceError>> for ApiResponse<T> {
    fn from(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::from_error(&err),
        }
    }
}

fn status_code(err: &ServiceError) -> u16 {
    match err {
        ServiceError::NotFound(_) => 404,
        ServiceError::InvalidRequest(_)
        | ServiceError::InvalidAddress(_)
        | ServiceError::MalformedCallback(_) => 400,
        ServiceError::InsufficientStock { .. } | ServiceError::InvalidOrderStatus(_) => 409,
        ServiceError::PermissionDenied => 403,
        ServiceError::InvalidSignature => 401,
        ServiceError::UnsupportedPaymentMethod(_) => 422,
        ServiceError::Gateway(_) => 502,
        ServiceError::Storage(_) => 500,
    }
}
