use crate::features::auth::models::Principal;
use crate::features::auth::repository;
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Bearerトークンによる認証と権限判定
///
/// トークンはハッシュでDBと照合し、管理者か顧客本人かを判定する
#[derive(Clone)]
pub struct AuthMiddleware {
    /// トークン照合に使う接続（AppStateと共有）
    db: Arc<Mutex<Connection>>,
}

impl AuthMiddleware {
    /// 共有接続から作成する
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// トークンを検証してリクエスト主体を返す
    ///
    /// # 引数
    /// * `token` - 認証トークン
    /// * `request_path` - リクエストパス
    ///
    /// # 戻り値
    /// 認証されたリクエスト主体
    pub fn authenticate_request(
        &self,
        token: Option<&str>,
        request_path: &str,
    ) -> AppResult<Principal> {
        log::debug!("APIリクエスト認証を開始: path={request_path}");

        let token = token.ok_or_else(|| {
            log::warn!("認証トークンが提供されていません: path={request_path}");
            AppError::unauthorized("認証トークンがありません")
        })?;

        if !auth_helpers::is_valid_token_format(token) {
            log::warn!("無効なトークン形式: path={request_path}");
            return Err(AppError::unauthorized("無効なトークン形式です"));
        }

        let principal = {
            let db = self
                .db
                .lock()
                .map_err(|e| AppError::concurrency(format!("データベースロック取得失敗: {e}")))?;
            repository::find_principal_by_token(&db, token)?
        };

        match principal {
            Some(principal) => {
                log::debug!(
                    "APIリクエスト認証成功: user_id={}, path={request_path}",
                    principal.user.id
                );
                Ok(principal)
            }
            None => {
                log::warn!("不正アクセス試行: path={request_path}");
                Err(AppError::unauthorized("トークンが無効または期限切れです"))
            }
        }
    }

    /// 管理者権限が必要なリクエストを認証する
    pub fn require_admin(&self, token: Option<&str>, request_path: &str) -> AppResult<Principal> {
        let principal = self.authenticate_request(token, request_path)?;

        if !principal.is_admin() {
            log::warn!(
                "管理者権限が必要なリクエストに非管理者がアクセス: user_id={}, path={request_path}",
                principal.user.id
            );
            return Err(AppError::forbidden("管理者権限が必要です"));
        }

        Ok(principal)
    }

    /// 顧客本人のリクエストを認証する
    ///
    /// # 戻り値
    /// (リクエスト主体, 顧客ID)
    pub fn require_client(
        &self,
        token: Option<&str>,
        request_path: &str,
    ) -> AppResult<(Principal, i64)> {
        let principal = self.authenticate_request(token, request_path)?;

        match principal.client_id {
            Some(client_id) => Ok((principal, client_id)),
            None => {
                log::warn!(
                    "顧客に紐づかないユーザーが顧客APIにアクセス: user_id={}, path={request_path}",
                    principal.user.id
                );
                Err(AppError::forbidden("顧客アカウントではありません"))
            }
        }
    }
}

/// ヘッダー解析などDBを使わない認証処理
pub mod auth_helpers {
    /// `Authorization: Bearer <token>` からトークン部分を取り出す
    ///
    /// # 引数
    /// * `authorization_header` - Authorizationヘッダーの値
    pub fn extract_bearer_token(authorization_header: Option<&str>) -> Option<&str> {
        authorization_header
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(|token| token.trim())
            .filter(|token| !token.is_empty())
    }

    /// トークンの形式を検証する
    pub fn is_valid_token_format(token: &str) -> bool {
        !token.is_empty() && token.len() > 10 && token.len() <= 512 && token.is_ascii()
    }

    /// トークンなしでアクセスできるパスか
    pub fn is_public_endpoint(path: &str) -> bool {
        const PUBLIC_PATHS: &[&str] = &["/health"];

        let path = path.trim_end_matches('/');
        PUBLIC_PATHS.contains(&path)
    }
}
