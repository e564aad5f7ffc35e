//! Service flavor: how errors reach the client and which key sizes a page.

use crate::error::AppError;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Structured JSON errors; page size from `per_page`.
    #[default]
    Api,
    /// Errors abort with a bare status; page size from `limit`.
    Web,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl Flavor {
    pub fn render(self, err: &AppError) -> Response {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        } else {
            tracing::warn!(code = err.code(), error = %err, "request rejected");
        }
        match self {
            Flavor::Api => {
                let message = if status.is_server_error() {
                    "Server Error".to_string()
                } else {
                    err.to_string()
                };
                (
                    status,
                    Json(ErrorBody {
                        success: false,
                        message,
                    }),
                )
                    .into_response()
            }
            Flavor::Web => (status, status.canonical_reason().unwrap_or_default()).into_response(),
        }
    }
}

impl FromStr for Flavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Flavor::Api),
            "web" => Ok(Flavor::Web),
            other => Err(format!("unknown service flavor '{}' (expected api or web)", other)),
        }
    }
}

/// An error paired with the flavor that decides its rendering.
#[derive(Debug)]
pub struct Rejection {
    pub flavor: Flavor,
    pub error: AppError,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        self.flavor.render(&self.error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Flavor::Api.render(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};

    async fn body_of(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn api_not_found_is_structured() {
        let resp = Flavor::Api.render(&AppError::resource_not_found());
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&body_of(resp).await).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "message": "Resource not found"}));
    }

    #[tokio::test]
    async fn web_not_found_aborts_with_bare_status() {
        let resp = Flavor::Web.render(&AppError::resource_not_found());
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let content_type = resp.headers().get(header::CONTENT_TYPE).cloned();
        assert_eq!(body_of(resp).await, "Not Found");
        assert!(content_type.unwrap().to_str().unwrap().starts_with("text/plain"));
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let resp = Flavor::Api.render(&AppError::Db(sqlx::Error::PoolTimedOut));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_of(resp).await.contains("Server Error"));
    }

    #[test]
    fn parses_flavor_names() {
        assert_eq!("API".parse::<Flavor>().unwrap(), Flavor::Api);
        assert_eq!(" web ".parse::<Flavor>().unwrap(), Flavor::Web);
        assert!("cli".parse::<Flavor>().is_err());
    }
}
