use crate::features::clients::repository as client_repository;
use crate::features::messages::models::{CreateMessageDto, MarkReadResult, Sender, UnreadCount};
use crate::features::messages::repository;
use crate::server::{ApiReply, ApiRequest};
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;

fn required_client_id(req: &ApiRequest) -> AppResult<i64> {
    req.query_i64("client_id")?
        .ok_or_else(|| AppError::validation("client_idは必須です"))
}

/// 顧客とのメッセージスレッドを取得する（管理者用）
pub fn admin_list(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let client_id = required_client_id(req)?;

    let db = state.lock_db()?;
    client_repository::ensure_exists(&db, client_id)?;
    ApiReply::ok(&repository::list_for_client(&db, client_id)?)
}

/// 顧客へメッセージを送る（管理者用）
pub fn admin_send(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let client_id = required_client_id(req)?;
    let dto: CreateMessageDto = req.json()?;

    let db = state.lock_db()?;
    client_repository::ensure_exists(&db, client_id)?;
    ApiReply::created(&repository::create(&db, client_id, Sender::Admin, dto)?)
}

/// 顧客から届いたメッセージを既読にする（管理者用）
pub fn admin_mark_read(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let client_id = required_client_id(req)?;

    let db = state.lock_db()?;
    client_repository::ensure_exists(&db, client_id)?;
    let updated = repository::mark_read(&db, client_id, Sender::Admin)?;
    ApiReply::ok(&MarkReadResult { updated })
}

/// 顧客から届いた未読メッセージ数（管理者用）
pub fn admin_unread_count(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    state.auth.require_admin(req.token(), &req.path)?;
    let client_id = required_client_id(req)?;

    let db = state.lock_db()?;
    client_repository::ensure_exists(&db, client_id)?;
    let unread = repository::unread_count(&db, client_id, Sender::Admin)?;
    ApiReply::ok(&UnreadCount { unread })
}

/// 自分のメッセージスレッドを取得する（顧客用）
pub fn client_list(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    let db = state.lock_db()?;
    ApiReply::ok(&repository::list_for_client(&db, client_id)?)
}

/// 管理者へメッセージを送る（顧客用）
pub fn client_send(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    let dto: CreateMessageDto = req.json()?;

    let db = state.lock_db()?;
    ApiReply::created(&repository::create(&db, client_id, Sender::Client, dto)?)
}

/// 管理者から届いたメッセージを既読にする（顧客用）
pub fn client_mark_read(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    let db = state.lock_db()?;
    let updated = repository::mark_read(&db, client_id, Sender::Client)?;
    ApiReply::ok(&MarkReadResult { updated })
}

/// 管理者から届いた未読メッセージ数（顧客用）
pub fn client_unread_count(state: &AppState, req: &ApiRequest) -> AppResult<ApiReply> {
    let (_, client_id) = state.auth.require_client(req.token(), &req.path)?;
    let db = state.lock_db()?;
    let unread = repository::unread_count(&db, client_id, Sender::Client)?;
    ApiReply::ok(&UnreadCount { unread })
}
