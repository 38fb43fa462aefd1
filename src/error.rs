use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DamaiError {
    #[error("表格读取失败: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("结果表格生成失败: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Analysis error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("Upload error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("{0}")]
    Validation(String),
}

pub type DamaiResult<T> = Result<T, DamaiError>;

impl IntoResponse for DamaiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            DamaiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            DamaiError::Workbook(ref e) => {
                tracing::warn!("Workbook parse failed: {:?}", e);
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            DamaiError::Multipart(ref e) => {
                tracing::warn!("Upload failed: {:?}", e);
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            DamaiError::Polars(ref e) => {
                tracing::error!("Analysis Error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            DamaiError::WorkbookWrite(ref e) => {
                tracing::error!("Workbook write failed: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
