use crate::features::auth::repository as auth_repository;
use crate::features::clients::models::{Client, CreateClientDto, CreatedClient, UpdateClientDto};
use crate::features::projects::repository as project_repository;
use crate::features::versions::models::VersionKind;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{
    current_timestamp, format_amount, normalize_string, parse_stored_amount, validate_budget,
    validate_phone, validate_required_field, validate_text_length,
};
use rusqlite::{params, Connection};

const CLIENT_COLUMNS: &str = "c.id, c.user_id, u.username, c.phone, c.address, c.budget,
    c.is_active, c.is_deleted,
    c.expenses_discussion_completed, c.expenses_discussion_completed_at, c.expenses_version_count,
    c.payments_discussion_completed, c.payments_discussion_completed_at, c.payments_version_count,
    c.created_at";

/// 顧客を作成する（ユーザー・プロジェクト・進捗・初回トークンを含む）
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - 顧客作成用DTO
/// * `token_ttl_days` - 初回トークンの有効日数
///
/// # 戻り値
/// 作成された顧客、または失敗時はエラー（途中で失敗した場合は何も残らない）
pub fn create(
    conn: &mut Connection,
    dto: CreateClientDto,
    token_ttl_days: i64,
) -> AppResult<CreatedClient> {
    validate_create_dto(&dto)?;

    let username = normalize_string(&dto.username);
    let phone = dto.phone.as_deref().map(normalize_string).unwrap_or_default();
    let address = dto.address.as_deref().map(normalize_string).unwrap_or_default();
    let now = current_timestamp();

    let tx = conn.transaction()?;

    let user = auth_repository::create_user(&tx, &username, false)?;

    tx.execute(
        "INSERT INTO clients (user_id, phone, address, budget, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.id, phone, address, format_amount(&dto.budget), now],
    )?;
    let client_id = tx.last_insert_rowid();

    let project = project_repository::create(
        &tx,
        client_id,
        &normalize_string(&dto.project_title),
        &dto.budget,
    )?;
    let access_token = auth_repository::issue_token(&tx, user.id, token_ttl_days)?;
    let client = find_by_id(&tx, client_id)?;

    tx.commit()?;

    log::info!(
        "顧客を作成しました: client_id={client_id}, user_id={}, project_id={}",
        user.id,
        project.id
    );

    Ok(CreatedClient {
        client,
        project,
        access_token,
    })
}

/// IDで顧客を取得する（削除済みも含む）
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Client> {
    let sql = format!(
        "SELECT {CLIENT_COLUMNS} FROM clients c JOIN users u ON u.id = c.user_id WHERE c.id = ?1"
    );
    conn.query_row(&sql, params![id], map_client)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::not_found("顧客"),
            _ => AppError::from(e),
        })
}

/// 削除されていない顧客を取得する
pub fn find_active_by_id(conn: &Connection, id: i64) -> AppResult<Client> {
    let client = find_by_id(conn, id)?;
    if client.is_deleted {
        return Err(AppError::not_found("顧客"));
    }
    Ok(client)
}

/// 顧客が存在し削除されていないことを確認する
pub fn ensure_exists(conn: &Connection, id: i64) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?1 AND is_deleted = 0)",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::not_found("顧客"));
    }
    Ok(())
}

/// 顧客一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `include_deleted` - 論理削除済みの顧客も含めるか
pub fn find_all(conn: &Connection, include_deleted: bool) -> AppResult<Vec<Client>> {
    let filter = if include_deleted {
        ""
    } else {
        "WHERE c.is_deleted = 0"
    };
    let sql = format!(
        "SELECT {CLIENT_COLUMNS} FROM clients c JOIN users u ON u.id = c.user_id {filter} ORDER BY c.id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let clients = stmt.query_map([], map_client)?;
    clients.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// 顧客情報を更新する
pub fn update(conn: &Connection, id: i64, dto: UpdateClientDto) -> AppResult<Client> {
    let existing = find_active_by_id(conn, id)?;

    if let Some(phone) = &dto.phone {
        validate_phone_field(phone)?;
    }
    if let Some(address) = &dto.address {
        validate_text_length(address, 255, "住所")?;
    }
    if let Some(budget) = &dto.budget {
        validate_budget(budget)?;
    }

    let phone = dto
        .phone
        .as_deref()
        .map(normalize_string)
        .unwrap_or(existing.phone);
    let address = dto
        .address
        .as_deref()
        .map(normalize_string)
        .unwrap_or(existing.address);
    let budget = dto.budget.or(existing.budget).map(|b| format_amount(&b));
    let is_active = dto.is_active.unwrap_or(existing.is_active);

    conn.execute(
        "UPDATE clients SET phone = ?1, address = ?2, budget = ?3, is_active = ?4 WHERE id = ?5",
        params![phone, address, budget, is_active, id],
    )?;

    find_by_id(conn, id)
}

/// 顧客を論理削除する
///
/// 顧客のトークンは失効させる。経費・入金・バージョンは残す。
pub fn soft_delete(conn: &Connection, id: i64) -> AppResult<()> {
    let client = find_active_by_id(conn, id)?;

    conn.execute(
        "UPDATE clients SET is_deleted = 1, is_active = 0 WHERE id = ?1",
        params![id],
    )?;
    auth_repository::revoke_tokens_for_user(conn, client.user_id)?;

    log::info!("顧客を論理削除しました: client_id={id}");
    Ok(())
}

/// 協議の完了状態を解除する
///
/// バージョン番号のカウンタと既存のバージョンには触れない
pub fn reopen_discussion(conn: &Connection, id: i64, kind: VersionKind) -> AppResult<Client> {
    find_active_by_id(conn, id)?;

    let sql = format!(
        "UPDATE clients SET {} = 0 WHERE id = ?1",
        kind.completed_flag_column()
    );
    conn.execute(&sql, params![id])?;

    log::info!("協議を再開しました: client_id={id}, kind={}", kind.as_str());
    find_by_id(conn, id)
}

fn map_client(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
    let budget: Option<String> = row.get(5)?;
    let budget = match budget {
        Some(raw) => Some(parse_stored_amount(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })?),
        None => None,
    };

    Ok(Client {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        budget,
        is_active: row.get::<_, i64>(6)? != 0,
        is_deleted: row.get::<_, i64>(7)? != 0,
        expenses_discussion_completed: row.get::<_, i64>(8)? != 0,
        expenses_discussion_completed_at: row.get(9)?,
        expenses_version_count: row.get(10)?,
        payments_discussion_completed: row.get::<_, i64>(11)? != 0,
        payments_discussion_completed_at: row.get(12)?,
        payments_version_count: row.get(13)?,
        created_at: row.get(14)?,
    })
}

/// 顧客作成DTOのバリデーション
fn validate_create_dto(dto: &CreateClientDto) -> AppResult<()> {
    validate_required_field(&dto.project_title, "プロジェクト名")?;
    validate_text_length(&dto.project_title, 150, "プロジェクト名")?;
    validate_budget(&dto.budget)?;

    if let Some(phone) = &dto.phone {
        validate_phone_field(phone)?;
    }
    if let Some(address) = &dto.address {
        validate_text_length(address, 255, "住所")?;
    }

    Ok(())
}

/// 電話番号の長さと形式を検証する（作成・更新共通）
fn validate_phone_field(phone: &str) -> AppResult<()> {
    validate_text_length(phone, 20, "電話番号")?;
    validate_phone(phone.trim())
}
