use crate::features::auth::auth_helpers;
use crate::shared::errors::{AppError, AppResult};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{header, Method, Request};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// リクエストボディの上限（1MiB）
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// ハンドラーに渡すリクエスト
///
/// hyperのリクエストからボディを読み切った状態で保持するため、
/// ブロッキングスレッドへそのまま渡せる
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub token: Option<String>,
    pub body: Vec<u8>,
    pub request_id: String,
}

impl ApiRequest {
    /// リクエストを組み立てる
    ///
    /// # 引数
    /// * `method` - HTTPメソッド
    /// * `path_and_query` - パスとクエリ（例: "/api/expenses?client_id=1"）
    /// * `token` - Bearerトークン
    /// * `body` - リクエストボディ
    pub fn new(method: Method, path_and_query: &str, token: Option<&str>, body: Vec<u8>) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, query),
            None => (path_and_query, ""),
        };

        Self {
            method,
            path: path.to_string(),
            query: parse_query(query),
            token: token.map(str::to_string),
            body,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// hyperのリクエストからボディを読み込んで変換する
    pub async fn from_hyper(req: Request<Incoming>) -> AppResult<Self> {
        let method = req.method().clone();
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let token = auth_helpers::extract_bearer_token(
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok()),
        )
        .map(str::to_string);

        let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| {
                log::warn!("リクエストボディの読み込みに失敗: {e}");
                AppError::validation("リクエストボディが大きすぎるか、読み込めません")
            })?
            .to_bytes()
            .to_vec();

        Ok(Self::new(method, &path_and_query, token.as_deref(), body))
    }

    /// 認証トークン
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// クエリパラメータを取得する
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// 整数のクエリパラメータを取得する
    pub fn query_i64(&self, name: &str) -> AppResult<Option<i64>> {
        match self.query_param(name) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| AppError::validation(format!("{name}は整数で指定してください"))),
        }
    }

    /// ボディをJSONとして解析する
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        if self.body.is_empty() {
            return Err(AppError::validation("リクエストボディが空です"));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| AppError::validation(format!("リクエストボディが不正です: {e}")))
    }

    /// ボディがあればJSONとして解析し、なければNoneを返す
    pub fn json_opt<T: DeserializeOwned>(&self) -> AppResult<Option<T>> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        self.json().map(Some)
    }
}

/// クエリ文字列を解析する（同名のキーは後勝ち）
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_new_splits_path_and_query() {
        let req = ApiRequest::new(
            Method::GET,
            "/api/admin/expense-versions/?client_id=12&flag=a%20b",
            Some("token"),
            Vec::new(),
        );
        assert_eq!(req.path, "/api/admin/expense-versions/");
        assert_eq!(req.query_i64("client_id").unwrap(), Some(12));
        assert_eq!(req.query_param("flag"), Some("a b"));
        assert_eq!(req.token(), Some("token"));
        assert!(!req.request_id.is_empty());
    }

    #[test]
    fn test_query_i64_rejects_garbage() {
        let req = ApiRequest::new(Method::GET, "/x?client_id=abc", None, Vec::new());
        assert!(matches!(
            req.query_i64("client_id"),
            Err(AppError::Validation(_))
        ));
        assert_eq!(req.query_i64("missing").unwrap(), None);
    }

    #[test]
    fn test_json_body() {
        let req = ApiRequest::new(Method::POST, "/x", None, br#"{"name":"a"}"#.to_vec());
        let sample: Sample = req.json().unwrap();
        assert_eq!(sample.name, "a");

        let empty = ApiRequest::new(Method::POST, "/x", None, Vec::new());
        assert!(matches!(empty.json::<Sample>(), Err(AppError::Validation(_))));
        assert!(empty.json_opt::<Sample>().unwrap().is_none());

        let broken = ApiRequest::new(Method::POST, "/x", None, b"{".to_vec());
        assert!(matches!(broken.json::<Sample>(), Err(AppError::Validation(_))));
    }
}
