use rouille::Response;
use serde_json::json;
use thiserror::Error;

use crate::{
    http::range::{RangeError, ServeError},
    storage::error::StoreError,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("missing caller identity")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("range not satisfiable")]
    RangeNotSatisfiable { size: u64 },

    #[error("upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidDocumentId(e) => ApiError::BadRequest(e.to_string()),

            StoreError::Connection(_)
            | StoreError::Database(_)
            | StoreError::Serialization(_)
            | StoreError::Internal(_) => {
                log::error!("{err}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl From<RangeError> for ApiError {
    fn from(err: RangeError) -> Self {
        match err {
            RangeError::Malformed(_) => ApiError::BadRequest(err.to_string()),
            RangeError::Unsatisfiable { size } => ApiError::RangeNotSatisfiable { size },
        }
    }
}

impl From<ServeError> for ApiError {
    fn from(err: ServeError) -> Self {
        match err {
            ServeError::Range(e) => e.into(),
            ServeError::Fs(e) => {
                log::error!("failed to read media file: {e}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized => 401,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::RangeNotSatisfiable { .. } => 416,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let response =
            Response::json(&json!({ "error": self.to_string() })).with_status_code(self.status_code());

        match self {
            ApiError::RangeNotSatisfiable { size } => {
                response.with_additional_header("Content-Range", format!("bytes */{size}"))
            }
            _ => response,
        }
    }
}
