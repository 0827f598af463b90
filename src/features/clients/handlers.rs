use crate::features::clients::models::{CreateClientDto, ReopenDiscussionDto, UpdateClientDto};
use crate::features::clients::repository;
use crate::features::projects::repository as project_repository;
use crate::server::{ApiReply, ApiRequest};
use crate::shared::errors::AppResult;
use crate::shared::utils::parse_bool_flag;
use crate::AppState;

/// 顧客一覧を取得する（?include_deleted=true で論理削除済みも含む）
pub fn list_clients(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let include_deleted = parse_bool_flag(req.query_param("include_deleted"));

    let db = state.lock_db()?;
    let clients = repository::find_all(&db, include_deleted)?;
    ApiReply::ok(&clients)
}

/// 顧客を作成する
///
/// ユーザー・顧客・プロジェクト・進捗をまとめて作成し、
/// 顧客用の初回アクセストークンを返す
pub fn create_client(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let admin = state.auth.require_admin(req.token(), &req.path)?;
    let dto: CreateClientDto = req.json()?;

    let mut db = state.lock_db()?;
    let created = repository::create(&mut db, dto, state.config.token_ttl_days)?;

    log::info!(
        "管理者が顧客を作成しました: admin_id={}, client_id={}",
        admin.user.id,
        created.client.id
    );
    ApiReply::created(&created)
}

/// 顧客を取得する
pub fn get_client(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let db = state.lock_db()?;
    ApiReply::ok(&repository::find_by_id(&db, id)?)
}

/// 顧客情報を更新する
pub fn update_client(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let dto: UpdateClientDto = req.json()?;

    let db = state.lock_db()?;
    ApiReply::ok(&repository::update(&db, id, dto)?)
}

/// 顧客を論理削除する
pub fn delete_client(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let db = state.lock_db()?;
    repository::soft_delete(&db, id)?;
    Ok(ApiReply::no_content())
}

/// 顧客のプロジェクトを完了にする（進捗100%）
pub fn complete_client(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let db = state.lock_db()?;
    repository::ensure_exists(&db, id)?;
    ApiReply::ok(&project_repository::complete_for_client(&db, id)?)
}

/// 経費または入金の協議を再開する
pub fn reopen_discussion(state: &AppState, req: &ApiRequest, id: i64) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let dto: ReopenDiscussionDto = req.json()?;

    let db = state.lock_db()?;
    ApiReply::ok(&repository::reopen_discussion(&db, id, dto.kind)?)
}
