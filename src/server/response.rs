use crate::shared::errors::{AppError, AppResult, ErrorSeverity};
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

/// ハンドラーの応答
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl ApiReply {
    /// 200 OK
    pub fn ok<T: Serialize>(data: &T) -> AppResult<Self> {
        Ok(Self {
            status: StatusCode::OK,
            body: Some(serde_json::to_value(data)?),
        })
    }

    /// 201 Created
    pub fn created<T: Serialize>(data: &T) -> AppResult<Self> {
        Ok(Self {
            status: StatusCode::CREATED,
            body: Some(serde_json::to_value(data)?),
        })
    }

    /// 204 No Content
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    /// エラー応答（{"error": メッセージ}）
    pub fn from_error(error: &AppError) -> Self {
        Self {
            status: error.status_code(),
            body: Some(json!({ "error": error.user_message() })),
        }
    }

    /// hyperのレスポンスに変換する
    pub fn into_response(self) -> Response<String> {
        let body = self.body.map(|value| value.to_string()).unwrap_or_default();

        let mut builder = Response::builder().status(self.status);
        if self.status != StatusCode::NO_CONTENT {
            builder = builder.header(header::CONTENT_TYPE, "application/json; charset=utf-8");
        }

        builder.body(body).unwrap_or_else(|e| {
            log::error!("レスポンスの構築に失敗しました: {e}");
            let mut fallback = Response::new(r#"{"error":"内部エラーが発生しました"}"#.to_string());
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

/// エラーをログに出力して応答に変換する
pub fn error_reply(error: &AppError, request_id: &str) -> ApiReply {
    match error.severity() {
        ErrorSeverity::Critical | ErrorSeverity::High => {
            log::error!("リクエスト処理エラー: request_id={request_id}, {}", error.details())
        }
        ErrorSeverity::Medium => {
            log::warn!("リクエスト処理エラー: request_id={request_id}, {}", error.details())
        }
        ErrorSeverity::Low => {
            log::info!("リクエストを拒否しました: request_id={request_id}, {}", error.details())
        }
    }
    ApiReply::from_error(error)
}
