use crate::features::auth::models::IssueTokenDto;
use crate::features::auth::repository;
use crate::server::{ApiReply, ApiRequest};
use crate::shared::errors::AppResult;
use crate::AppState;
use serde_json::json;

/// 現在のユーザー情報を取得する
///
/// # 戻り値
/// ユーザー情報と顧客ID（顧客ユーザーの場合）
pub fn me(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let principal = state.auth.authenticate_request(req.token(), &req.path)?;
    ApiReply::ok(&json!({
        "user": principal.user,
        "client_id": principal.client_id,
        "is_admin": principal.is_admin(),
    }))
}

/// アクセストークンを発行する（管理者のみ）
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `req` - リクエスト（ボディ: {user_id, ttl_days?}）
///
/// # 戻り値
/// 発行されたトークン（平文はこの応答でのみ返す）
pub fn issue_token(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let admin = state.auth.require_admin(req.token(), &req.path)?;
    let dto: IssueTokenDto = req.json()?;
    let ttl_days = dto.ttl_days.unwrap_or(state.config.token_ttl_days);

    let db = state.lock_db()?;
    let issued = repository::issue_token(&db, dto.user_id, ttl_days)?;

    log::info!(
        "管理者がトークンを発行しました: admin_id={}, user_id={}",
        admin.user.id,
        dto.user_id
    );
    ApiReply::created(&issued)
}
