use crate::features::cash_receipts::models::{CreateCashReceiptDto, UpdateCashReceiptDto};
use crate::features::cash_receipts::repository;
use crate::features::clients::repository as client_repository;
use crate::features::versions::models::VersionKind;
use crate::features::versions::repository as version_repository;
use crate::server::{ApiReply, ApiRequest};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::parse_bool_flag;
use crate::AppState;

/// 入金一覧を取得する（管理者用、?client_id / ?since_last_version）
pub fn admin_list(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let client_id = req.query_i64("client_id")?;
    let since_last_version = parse_bool_flag(req.query_param("since_last_version"));

    let db = state.lock_db()?;
    let receipts = match (client_id, since_last_version) {
        (Some(client_id), true) => {
            client_repository::ensure_exists(&db, client_id)?;
            let after =
                version_repository::latest_completed_at(&db, VersionKind::Payments, client_id)?;
            repository::find_created_after(&db, client_id, after.as_deref())?
        }
        (None, true) => {
            return Err(AppError::validation(
                "since_last_version を指定する場合は client_id が必須です",
            ))
        }
        (client_id, false) => repository::find_all(&db, client_id)?,
    };
    ApiReply::ok(&receipts)
}

/// 入金を作成する
pub fn admin_create(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let dto: CreateCashReceiptDto = req.json()?;

    let db = state.lock_db()?;
    client_repository::ensure_exists(&db, dto.client_id)?;
    ApiReply::created(&repository::create(&db, dto)?)
}

/// 入金を更新する
pub fn admin_update(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let dto: UpdateCashReceiptDto = req.json()?;

    let db = state.lock_db()?;
    ApiReply::ok(&repository::update(&db, id, dto)?)
}

/// 入金を削除する
pub fn admin_delete(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let db = state.lock_db()?;
    repository::delete(&db, id)?;
    Ok(ApiReply::no_content())
}

/// 自分の入金一覧を取得する（顧客用）
pub fn client_list(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    let since_last_version = parse_bool_flag(req.query_param("since_last_version"));

    let db = state.lock_db()?;
    let after = if since_last_version {
        version_repository::latest_completed_at(&db, VersionKind::Payments, client_id)?
    } else {
        None
    };
    ApiReply::ok(&repository::find_created_after(&db, client_id, after.as_deref())?)
}
