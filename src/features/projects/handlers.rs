use crate::features::projects::models::UpdateProgressDto;
use crate::features::projects::repository;
use crate::server::{ApiReply, ApiRequest};
use crate::shared::errors::AppResult;
use crate::AppState;

/// 進捗一覧を取得する（管理者用、?client_id で絞り込み）
pub fn admin_list_progress(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let client_id = req.query_i64("client_id")?;

    let db = state.lock_db()?;
    ApiReply::ok(&repository::list_progress(&db, client_id)?)
}

/// プロジェクトの進捗率を更新する
pub fn admin_update_progress(
    state: &AppState,
    req: &ApiRequest,
    project_id: i64,
) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let dto: UpdateProgressDto = req.json()?;

    let db = state.lock_db()?;
    ApiReply::ok(&repository::update_progress(&db, project_id, dto.percentage)?)
}

/// 自分のプロジェクト一覧を取得する（顧客用）
pub fn client_projects(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    let db = state.lock_db()?;
    ApiReply::ok(&repository::find_by_client(&db, client_id)?)
}

/// 自分のプロジェクト進捗を取得する（顧客用）
pub fn client_progress(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    let db = state.lock_db()?;
    ApiReply::ok(&repository::list_progress(&db, Some(client_id))?)
}
