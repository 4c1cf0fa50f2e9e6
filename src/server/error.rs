use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::error::Error;

/// 请求未携带正确的 token
#[derive(Error, Debug)]
#[error("鉴权失败")]
pub struct Unauthorized;

/// 请求参数错误
#[derive(Error, Debug)]
#[error("{0}")]
pub struct BadRequest(pub String);

/// API错误类型
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.is::<Unauthorized>() {
            return StatusCode::UNAUTHORIZED;
        }
        if self.0.is::<BadRequest>() {
            return StatusCode::BAD_REQUEST;
        }
        match self.0.downcast_ref::<Error>() {
            Some(Error::IdentityConflict(_) | Error::ConcurrentBatchRejected) => {
                StatusCode::CONFLICT
            }
            Some(Error::FolderUnreadable { .. } | Error::InvalidColor(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            (status, format!("Something went wrong: {}", self.0)).into_response()
        } else {
            (status, self.0.to_string()).into_response()
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
